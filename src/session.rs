//! Session record and its persistence.
//!
//! A session is created on a successful handshake, mutated only by re-login,
//! and destroyed on logout. The auth manager is the single writer; everything
//! else reads and must re-validate per request.

use crate::store::FileStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SESSION_KEY: &str = "portal_session";
pub const LAST_PORTAL_KEY: &str = "last_portal";
pub const LAST_MAC_KEY: &str = "last_mac";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    /// Normalized base API URL.
    pub portal_url: String,
    /// Colon-hex six-octet device identifier.
    pub mac_address: String,
    pub login_time: DateTime<Utc>,
    pub token_expiry: DateTime<Utc>,
    /// Opaque device identity blob sent by or derived for the portal.
    pub device_info: Value,
}

impl Session {
    /// A session authenticates iff token, portal URL, and MAC are all set.
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty() && !self.portal_url.is_empty() && !self.mac_address.is_empty()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.token_expiry
    }
}

/// Persistence for the session blob and the last-used portal/MAC.
pub struct SessionStore {
    store: FileStore,
}

impl SessionStore {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Option<Session> {
        self.store.get(SESSION_KEY)
    }

    pub fn save(&self, session: &Session) -> anyhow::Result<()> {
        self.store.put(SESSION_KEY, session)
    }

    pub fn clear(&self) {
        if let Err(err) = self.store.remove(SESSION_KEY) {
            eprintln!("Warning: failed to clear session: {}", err);
        }
    }

    /// Cache the last-used portal and MAC for the next login prompt.
    pub fn remember_login(&self, portal: &str, mac: &str) {
        let _ = self.store.put(LAST_PORTAL_KEY, &portal.to_string());
        let _ = self.store.put(LAST_MAC_KEY, &mac.to_string());
    }

    pub fn last_login(&self) -> (Option<String>, Option<String>) {
        (self.store.get(LAST_PORTAL_KEY), self.store.get(LAST_MAC_KEY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_session() -> Session {
        Session {
            token: "T".to_string(),
            portal_url: "http://glotv.me/stalker_portal/api/v1/".to_string(),
            mac_address: "AA:7A:10:57:C1:00".to_string(),
            login_time: Utc::now(),
            token_expiry: Utc::now() + chrono::Duration::hours(24),
            device_info: json!({"model": "MAG250"}),
        }
    }

    #[test]
    fn test_authenticated_requires_all_fields() {
        let session = sample_session();
        assert!(session.is_authenticated());

        let mut missing_token = session.clone();
        missing_token.token.clear();
        assert!(!missing_token.is_authenticated());

        let mut missing_portal = session.clone();
        missing_portal.portal_url.clear();
        assert!(!missing_portal.is_authenticated());

        let mut missing_mac = session;
        missing_mac.mac_address.clear();
        assert!(!missing_mac.is_authenticated());
    }

    #[test]
    fn test_expiry() {
        let mut session = sample_session();
        assert!(!session.is_expired());
        session.token_expiry = Utc::now() - chrono::Duration::seconds(1);
        assert!(session.is_expired());
    }

    #[test]
    fn test_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(FileStore::new(dir.path()).unwrap());

        assert!(store.load().is_none());
        let session = sample_session();
        store.save(&session).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.token, "T");
        assert_eq!(loaded.mac_address, "AA:7A:10:57:C1:00");

        store.clear();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_remember_last_login() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(FileStore::new(dir.path()).unwrap());

        assert_eq!(store.last_login(), (None, None));
        store.remember_login("glotv.me", "AA:7A:10:57:C1:00");
        let (portal, mac) = store.last_login();
        assert_eq!(portal.as_deref(), Some("glotv.me"));
        assert_eq!(mac.as_deref(), Some("AA:7A:10:57:C1:00"));
    }
}
