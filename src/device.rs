//! Emulated set-top-box identity.
//!
//! Stalker portals authenticate MAG firmware, not browsers. Every request
//! carries the legacy MAG user-agent, a model header, and a cookie embedding
//! the MAC, language, and timezone. The portal-side device identity is the
//! SHA-256 of the MAC.

use crate::normalize::percent_encode;
use once_cell::sync::Lazy;
use regex::Regex;

pub const USER_AGENT: &str = "Mozilla/5.0 (QtEmbedded; U; Linux; C) AppleWebKit/533.3 \
     (KHTML, like Gecko) MAG200 stbapp ver: 2 rev: 250 Safari/533.3";
pub const X_USER_AGENT: &str = "Model: MAG250; Link: WiFi";
pub const MODEL: &str = "MAG250";

static MAC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{2}:){5}[0-9a-fA-F]{2}$").unwrap());

/// Validate a colon-separated six-octet MAC address string.
pub fn is_valid_mac(mac: &str) -> bool {
    MAC_RE.is_match(mac)
}

/// Portal device identity: uppercase hex SHA-256 of the MAC.
pub fn device_id(mac: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(mac.as_bytes());
    format!("{:X}", hasher.finalize())
}

/// Cookie string identifying the emulated device to the portal.
pub fn device_cookie(mac: &str, language: &str, timezone: &str) -> String {
    format!(
        "mac={}; stb_lang={}; timezone={};",
        percent_encode(mac),
        language,
        percent_encode(timezone)
    )
}

/// Fixed emulated-device header set sent on every portal request.
///
/// Includes cache-disabling headers: some portals serve stale handshake
/// responses through intermediate proxies otherwise.
pub fn base_headers(mac: &str, language: &str, timezone: &str) -> Vec<(String, String)> {
    vec![
        ("User-Agent".to_string(), USER_AGENT.to_string()),
        ("X-User-Agent".to_string(), X_USER_AGENT.to_string()),
        ("Cookie".to_string(), device_cookie(mac, language, timezone)),
        ("Cache-Control".to_string(), "no-cache".to_string()),
        ("Pragma".to_string(), "no-cache".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_mac() {
        assert!(is_valid_mac("AA:7A:10:57:C1:00"));
        assert!(is_valid_mac("00:1a:79:ab:cd:ef"));
    }

    #[test]
    fn test_invalid_mac() {
        assert!(!is_valid_mac(""));
        assert!(!is_valid_mac("AA:7A:10:57:C1"));
        assert!(!is_valid_mac("AA:7A:10:57:C1:00:11"));
        assert!(!is_valid_mac("AA-7A-10-57-C1-00"));
        assert!(!is_valid_mac("GG:7A:10:57:C1:00"));
        assert!(!is_valid_mac("AA:7A:10:57:C1:0"));
    }

    #[test]
    fn test_device_id_is_uppercase_hex() {
        let id = device_id("AA:7A:10:57:C1:00");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        // Deterministic, and distinct per MAC
        assert_eq!(id, device_id("AA:7A:10:57:C1:00"));
        assert_ne!(id, device_id("AA:7A:10:57:C1:01"));
    }

    #[test]
    fn test_device_cookie_encodes_mac() {
        let cookie = device_cookie("AA:7A:10:57:C1:00", "en", "Europe/London");
        assert_eq!(
            cookie,
            "mac=AA%3A7A%3A10%3A57%3AC1%3A00; stb_lang=en; timezone=Europe%2FLondon;"
        );
    }

    #[test]
    fn test_base_headers_disable_caching() {
        let headers = base_headers("AA:7A:10:57:C1:00", "en", "Europe/London");
        let names: Vec<&str> = headers.iter().map(|(k, _)| k.as_str()).collect();
        assert!(names.contains(&"User-Agent"));
        assert!(names.contains(&"Cookie"));
        assert!(names.contains(&"Cache-Control"));
        assert!(names.contains(&"Pragma"));
    }
}
