//! Plugin protocol stdio loop
//!
//! One JSON-RPC request per input line, one response per output line.

use crate::provider::{Provider, ProviderDefinition};
use std::io::{self, BufRead, Write};

/// Serve `provider` over stdin/stdout until input closes.
pub fn serve<P: ProviderDefinition>(provider: &Provider<P>) {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve_io(provider, stdin.lock(), stdout.lock());
}

/// Serve `provider` over arbitrary line streams.
pub fn serve_io<P, R, W>(provider: &Provider<P>, input: R, mut output: W)
where
    P: ProviderDefinition,
    R: BufRead,
    W: Write,
{
    tracing::info!(provider = provider.name(), "Serving plugin protocol");

    for line in input.lines() {
        match line {
            Ok(request) => {
                if request.trim().is_empty() {
                    continue;
                }
                let response = provider.handle_request(&request);
                if let Err(e) = writeln!(output, "{}", response) {
                    tracing::error!("Failed to write response: {}", e);
                    break;
                }
                if let Err(e) = output.flush() {
                    tracing::error!("Failed to flush stdout: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                break;
            }
        }
    }

    tracing::info!(provider = provider.name(), "Provider shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory_provider;
    use serde_json::Value;

    #[test]
    fn test_one_response_per_request_line() {
        let provider = memory_provider();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ConfigureProvider","params":{"config":{}}}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"StopProvider","params":{}}"#,
            "\n",
            "garbage\n",
        );
        let mut output = Vec::new();

        serve_io(&provider, input.as_bytes(), &mut output);

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["id"], 2);
        assert_eq!(lines[2]["error"]["code"], crate::protocol::PARSE_ERROR);
    }
}
