//! Transport layer for portal communication.
//!
//! One concrete transport (plain HTTP GET). The trait exists so the endpoint
//! resolver's fallback control flow never changes when a transport is added,
//! and so tests can script responses.

use crate::error::{PortalError, Result};
use std::time::Duration;

/// Raw wire-level response. Non-2xx statuses are protocol outcomes, not
/// transport errors; only connection-level failures surface as `Err`.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to issue a GET request with explicit headers.
pub trait Transport {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<WireResponse>;
}

/// HTTP transport backed by a ureq agent.
pub struct HttpTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            agent: ureq::Agent::new(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<WireResponse> {
        let mut req = self.agent.get(url).timeout(self.timeout);
        for (name, value) in headers {
            req = req.set(name, value);
        }

        match req.call() {
            Ok(r) => {
                let status = r.status();
                let body = r
                    .into_string()
                    .map_err(|e| PortalError::Network(format!("failed to read body: {}", e)))?;
                Ok(WireResponse { status, body })
            }
            Err(ureq::Error::Status(code, resp)) => Ok(WireResponse {
                status: code,
                body: resp.into_string().unwrap_or_default(),
            }),
            Err(e) => Err(PortalError::Network(e.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// One scripted transport outcome: a status/body pair or a network error.
    pub(crate) type Step = std::result::Result<(u16, String), String>;

    /// Transport that replays a fixed script of responses and records every
    /// requested URL. When the script runs out, the fallback (if any)
    /// repeats indefinitely.
    pub(crate) struct ScriptedTransport {
        steps: RefCell<VecDeque<Step>>,
        fallback: Option<(u16, String)>,
        pub requests: RefCell<Vec<String>>,
    }

    impl ScriptedTransport {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: RefCell::new(steps.into()),
                fallback: None,
                requests: RefCell::new(Vec::new()),
            }
        }

        /// Every request gets the same status and body.
        pub fn always(status: u16, body: &str) -> Self {
            Self {
                steps: RefCell::new(VecDeque::new()),
                fallback: Some((status, body.to_string())),
                requests: RefCell::new(Vec::new()),
            }
        }

        pub fn ok(status: u16, body: &str) -> Step {
            Ok((status, body.to_string()))
        }

        pub fn network_error(message: &str) -> Step {
            Err(message.to_string())
        }

        pub fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &str, _headers: &[(String, String)]) -> Result<WireResponse> {
            self.requests.borrow_mut().push(url.to_string());
            let step = self.steps.borrow_mut().pop_front();
            match step {
                Some(Ok((status, body))) => Ok(WireResponse { status, body }),
                Some(Err(message)) => Err(PortalError::Network(message)),
                None => match &self.fallback {
                    Some((status, body)) => Ok(WireResponse {
                        status: *status,
                        body: body.clone(),
                    }),
                    None => Err(PortalError::Network("script exhausted".to_string())),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;

    #[test]
    fn test_wire_response_success_range() {
        assert!(WireResponse {
            status: 200,
            body: String::new()
        }
        .is_success());
        assert!(WireResponse {
            status: 204,
            body: String::new()
        }
        .is_success());
        assert!(!WireResponse {
            status: 404,
            body: String::new()
        }
        .is_success());
        assert!(!WireResponse {
            status: 301,
            body: String::new()
        }
        .is_success());
    }

    #[test]
    fn test_scripted_transport_replays_and_records() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::ok(200, "{}"),
            ScriptedTransport::network_error("refused"),
        ]);

        let first = transport.get("http://a/", &[]).unwrap();
        assert_eq!(first.status, 200);

        let second = transport.get("http://b/", &[]).unwrap_err();
        assert!(matches!(second, PortalError::Network(_)));

        assert_eq!(transport.request_count(), 2);
        assert_eq!(transport.requests.borrow()[0], "http://a/");
    }
}
