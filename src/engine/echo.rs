//! Loopback engine.
//!
//! Answers each newline-terminated line with the same line. Used by the
//! server binaries as a smoke-test engine and by the tests.

// ============================================================================
// Imports
// ============================================================================

use std::io::ErrorKind;

use tracing::trace;

use super::{EngineError, RpcEngine, RpcRequest, RpcResponse};

// ============================================================================
// EchoEngine
// ============================================================================

/// Echoes one line per call.
///
/// A call that hits end-of-stream before any byte writes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoEngine;

impl RpcEngine for EchoEngine {
    fn process(
        &self,
        request: &mut dyn RpcRequest,
        response: &mut dyn RpcResponse,
    ) -> Result<(), EngineError> {
        let input = request.input_stream();
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        // Byte-wise so nothing past the newline is taken from the next call.
        loop {
            match input.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        if line.is_empty() {
            return Ok(());
        }

        trace!(bytes = line.len(), "Echoing line");
        response.set_property("Content-Type", "text/plain");
        response.output_stream().write_all(&line)?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{self, Cursor, Read, Write};

    struct TestRequest(Cursor<Vec<u8>>);

    impl RpcRequest for TestRequest {
        fn input_stream(&mut self) -> &mut dyn Read {
            &mut self.0
        }

        fn close(&mut self) {}

        fn is_closed(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct TestResponse {
        body: Vec<u8>,
        properties: Vec<(String, String)>,
    }

    impl RpcResponse for TestResponse {
        fn output_stream(&mut self) -> &mut dyn Write {
            &mut self.body
        }

        fn set_property(&mut self, name: &str, value: &str) {
            self.properties.push((name.to_string(), value.to_string()));
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_echoes_one_line_per_call() {
        let mut request = TestRequest(Cursor::new(b"one\ntwo\n".to_vec()));
        let mut response = TestResponse::default();

        EchoEngine.process(&mut request, &mut response).expect("first");
        assert_eq!(response.body, b"one\n");

        EchoEngine.process(&mut request, &mut response).expect("second");
        assert_eq!(response.body, b"one\ntwo\n");
        assert_eq!(response.properties[0].0, "Content-Type");
    }

    #[test]
    fn test_unterminated_tail_is_echoed() {
        let mut request = TestRequest(Cursor::new(b"tail".to_vec()));
        let mut response = TestResponse::default();
        EchoEngine.process(&mut request, &mut response).expect("call");
        assert_eq!(response.body, b"tail");
    }

    #[test]
    fn test_empty_input_writes_nothing() {
        let mut request = TestRequest(Cursor::new(Vec::new()));
        let mut response = TestResponse::default();
        EchoEngine.process(&mut request, &mut response).expect("call");
        assert!(response.body.is_empty());
        assert!(response.properties.is_empty());
    }
}
