//! Compute Engine API

pub mod operation;
pub mod snapshots;
pub mod types;

pub use operation::{
    compute_operation_wait, compute_operation_wait_with, OperationScope, OperationWait,
};
pub use types::{CustomerEncryptionKey, GlobalSetLabelsRequest, Operation, Snapshot};
