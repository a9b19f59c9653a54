//! Portal handshake: exchange a MAC address for a bearer token.
//!
//! One GET to `{base}handshake` with the emulated-device header set. No
//! internal retry; fallback across URL conventions belongs to the caller.

use crate::device;
use crate::diagnostics::Diagnostics;
use crate::envelope::{decode_body, unwrap_envelope};
use crate::error::{status_error, PortalError, Result};
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cell::RefCell;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct HandshakePayload {
    pub token: String,
    pub token_expire: Option<DateTime<Utc>>,
    pub profile: Value,
}

/// Perform the handshake against one normalized base URL.
///
/// The caller validates the MAC before calling. Every outcome, success or
/// failure, is recorded to diagnostics before being returned.
pub fn handshake(
    transport: &dyn Transport,
    diagnostics: &RefCell<Diagnostics>,
    base: &str,
    mac: &str,
    language: &str,
    timezone: &str,
) -> Result<HandshakePayload> {
    let url = format!("{}handshake", base);
    let headers = device::base_headers(mac, language, timezone);
    let started = Instant::now();

    let outcome = transport.get(&url, &headers);
    let duration_ms = started.elapsed().as_millis() as u64;

    let track = |status: Option<u16>, error: Option<&str>| {
        diagnostics
            .borrow_mut()
            .track_request("GET", &url, &headers, &[], status, error, duration_ms);
    };

    match outcome {
        Ok(resp) if resp.is_success() => {
            let status = resp.status;
            match parse_payload(&resp.body) {
                Ok(payload) => {
                    track(Some(status), None);
                    Ok(payload)
                }
                Err(err) => {
                    track(Some(status), Some(&err.to_string()));
                    Err(err)
                }
            }
        }
        Ok(resp) => {
            let status = resp.status;
            let err = status_error(status, resp.body);
            track(Some(status), Some(&err.to_string()));
            Err(err)
        }
        Err(err) => {
            track(None, Some(&err.to_string()));
            Err(err)
        }
    }
}

/// Decode a handshake body into a payload, enforcing the token contract.
fn parse_payload(body: &str) -> Result<HandshakePayload> {
    let payload = unwrap_envelope(decode_body(body)?);

    let token = payload
        .get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PortalError::MissingToken(structure_of(&payload)))?
        .to_string();

    let token_expire = payload.get("token_expire").and_then(parse_expiry);
    let profile = payload.get("profile").cloned().unwrap_or(Value::Null);

    Ok(HandshakePayload {
        token,
        token_expire,
        profile,
    })
}

/// Portals report expiry as epoch seconds, a numeric string, or RFC 3339.
fn parse_expiry(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Value::String(s) => {
            if let Ok(secs) = s.parse::<i64>() {
                return DateTime::from_timestamp(secs, 0);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

/// Compact description of an unexpected payload for the error message.
fn structure_of(payload: &Value) -> String {
    let mut s = payload.to_string();
    if s.len() > 200 {
        s.truncate(200);
        s.push_str("...");
    }
    s
}
