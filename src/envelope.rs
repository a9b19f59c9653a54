//! Response envelope handling.
//!
//! Legacy portals wrap payloads in a `{js: ...}` envelope; newer ones return
//! the document bare. Unwrapping happens in exactly one place so the
//! convention is visible in the contract instead of inferred per call site.

use crate::error::{PortalError, Result};
use serde_json::Value;

/// Decode a response body as JSON.
pub fn decode_body(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| PortalError::InvalidResponse(e.to_string()))
}

/// Unwrap the legacy `{js: ...}` envelope, or pass the document through.
pub fn unwrap_envelope(doc: Value) -> Value {
    match doc {
        Value::Object(mut map) if map.contains_key("js") => {
            map.remove("js").unwrap_or(Value::Null)
        }
        other => other,
    }
}
