//! Resource state and the per-operation view resources work against.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Resource state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceState {
    pub values: Map<String, Value>,
}

impl ResourceState {
    pub fn new() -> Self {
        Self { values: Map::new() }
    }

    /// Object values become a state; anything else (including null) is none.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|obj| Self {
            values: obj.clone(),
        })
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(|v| v.as_str()).map(String::from)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(|v| v.as_bool())
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for ResourceState {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// Null, empty strings, empty collections, `false` and zero all read as unset.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
    }
}

/// What a resource's CRUD functions see: the prior state, the planned
/// values, the values the operation has written back, and the identifier.
#[derive(Debug, Clone)]
pub struct ResourceData {
    prior: Option<ResourceState>,
    planned: ResourceState,
    written: ResourceState,
    id: String,
    partial: bool,
    committed: BTreeSet<String>,
}

impl ResourceData {
    pub fn new(prior: Option<ResourceState>, planned: ResourceState) -> Self {
        let id = planned
            .get_string("id")
            .or_else(|| prior.as_ref().and_then(|p| p.get_string("id")))
            .unwrap_or_default();

        Self {
            prior,
            planned,
            written: ResourceState::new(),
            id,
            partial: false,
            committed: BTreeSet::new(),
        }
    }

    /// View over existing state, as used by read, delete and import.
    pub fn from_state(state: ResourceState) -> Self {
        Self::new(Some(state.clone()), state)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// An empty id marks the resource as gone.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Current value of `key`: written values first, then planned ones.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.written
            .get(key)
            .or_else(|| self.planned.get(key))
            .filter(|v| !v.is_null())
    }

    /// Like [`get`](Self::get) but treats zero values as unset.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !is_zero(v))
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str()).map(String::from)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// List or set value; absent reads as empty.
    pub fn get_list(&self, key: &str) -> Vec<Value> {
        self.get(key)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
    }

    /// String map value; non-string entries are skipped.
    pub fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        string_map(self.get(key))
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.written.set(key, value);
    }

    /// Whether the planned value of `key` differs from the prior state.
    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        !same_value(&old, &new)
    }

    /// Prior and planned values of `key`.
    pub fn get_change(&self, key: &str) -> (Value, Value) {
        let old = self
            .prior
            .as_ref()
            .and_then(|p| p.get(key))
            .cloned()
            .unwrap_or(Value::Null);
        let new = self.planned.get(key).cloned().unwrap_or(Value::Null);
        (old, new)
    }

    /// Enter or leave partial mode. While on, a failed operation only keeps
    /// the keys committed with [`set_partial`](Self::set_partial). Keys
    /// committed stay committed after partial mode is left.
    pub fn partial(&mut self, on: bool) {
        self.partial = on;
    }

    pub fn set_partial(&mut self, key: &str) {
        if self.partial {
            self.committed.insert(key.to_string());
        }
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Resolve the state to persist. `None` when the id was cleared.
    pub fn into_state(self, succeeded: bool) -> Option<ResourceState> {
        if self.id.is_empty() {
            return None;
        }

        let mut state = match (&self.prior, succeeded) {
            (Some(prior), false) => {
                let mut state = prior.clone();
                if !self.partial {
                    for (key, value) in &self.written.values {
                        state.set(key, value.clone());
                    }
                }
                for key in &self.committed {
                    if let Some(value) = self.written.get(key).or_else(|| self.planned.get(key)) {
                        state.set(key, value.clone());
                    }
                }
                state
            }
            _ => {
                let mut state = self.planned.clone();
                for (key, value) in &self.written.values {
                    state.set(key, value.clone());
                }
                state
            }
        };

        state.set("id", Value::String(self.id));
        Some(state)
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    (is_zero(a) && is_zero(b)) || a == b
}

/// Collect the string entries of a JSON object.
pub fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
