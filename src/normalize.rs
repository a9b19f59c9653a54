//! Portal URL canonicalization.
//!
//! User-entered hosts arrive in every shape imaginable ("glotv.me",
//! "http://glotv.me/", a full API base). Normalization is pure and
//! idempotent: no scheme gains `http://`, the result always ends in `/`,
//! and the canonical API marker path is appended unless already present.

/// Canonical API base path suffix used by v1-convention portals.
pub const API_MARKER: &str = "stalker_portal/api/v1/";

/// Canonicalize a raw user-entered portal host into a base API URL.
pub fn normalize_portal_url(raw: &str) -> String {
    let mut url = raw.trim().to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("http://{}", url);
    }
    if !url.ends_with('/') {
        url.push('/');
    }
    if !url.contains("stalker_portal/api/v1") {
        url.push_str(API_MARKER);
    }
    url
}

/// Recover the portal root from a normalized base URL.
///
/// The endpoint resolver builds legacy PHP-style URL shapes relative to the
/// portal root, not the v1 API base.
pub fn portal_root(base: &str) -> String {
    match base.strip_suffix(API_MARKER) {
        Some(root) => root.to_string(),
        None => base.to_string(),
    }
}

/// Percent-encode a query or cookie component (RFC 3986 unreserved set).
pub(crate) fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
