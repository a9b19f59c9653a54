//! Failure taxonomy for portal communication.
//!
//! Input validation errors are raised before any network call. Transport
//! failures, protocol failures (non-JSON or missing fields), and
//! authorization failures (HTTP 403) are surfaced as distinct variants so
//! the UI can tell an unauthorized MAC apart from a network problem.

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
    #[error("unauthorized MAC: portal rejected the device (HTTP 403)")]
    UnauthorizedMac,
    #[error("endpoint not found (HTTP 404)")]
    EndpointNotFound,
    #[error("portal server error (HTTP 500)")]
    ServerError,
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response format: {0}")]
    InvalidResponse(String),
    #[error("no token in response, structure was {0}")]
    MissingToken(String),
    #[error("network unreachable: {0}")]
    Network(String),
    #[error("no active session")]
    NoSession,
    #[error("all {attempts} URL patterns failed for endpoint '{endpoint}': {last}")]
    AllPatternsFailed {
        endpoint: String,
        attempts: usize,
        last: Box<PortalError>,
    },
}

pub type Result<T> = std::result::Result<T, PortalError>;

/// Map a non-2xx HTTP status to its error variant.
pub fn status_error(status: u16, body: String) -> PortalError {
    match status {
        403 => PortalError::UnauthorizedMac,
        404 => PortalError::EndpointNotFound,
        500 => PortalError::ServerError,
        _ => PortalError::Http { status, body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(403, String::new()),
            PortalError::UnauthorizedMac
        ));
        assert!(matches!(
            status_error(404, String::new()),
            PortalError::EndpointNotFound
        ));
        assert!(matches!(
            status_error(500, String::new()),
            PortalError::ServerError
        ));
        assert!(matches!(
            status_error(502, String::new()),
            PortalError::Http { status: 502, .. }
        ));
    }

    #[test]
    fn test_unauthorized_message_mentions_mac() {
        let msg = PortalError::UnauthorizedMac.to_string();
        assert!(msg.contains("MAC"));
        assert!(msg.contains("unauthorized"));
    }
}
