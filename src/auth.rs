//! Session lifecycle: login, refresh, logout, and the view-layer guard.
//!
//! The manager is constructed explicitly and passed by reference to whatever
//! needs authentication; it is the sole writer of the session record.

use crate::device;
use crate::diagnostics::Diagnostics;
use crate::error::{PortalError, Result};
use crate::handshake::handshake;
use crate::normalize::normalize_portal_url;
use crate::session::{Session, SessionStore};
use crate::transport::Transport;
use chrono::Utc;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

/// Fallback token lifetime when the portal omits `token_expire`. This is
/// local policy, not a documented portal contract.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Result of a login attempt. Login always resolves; the UI renders
/// `error` without needing to catch anything.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub success: bool,
    pub session: Option<Session>,
    pub error: Option<String>,
}

impl LoginOutcome {
    fn succeeded(session: Session) -> Self {
        Self {
            success: true,
            session: Some(session),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            session: None,
            error: Some(error),
        }
    }
}

pub struct AuthManager {
    transport: Rc<dyn Transport>,
    store: SessionStore,
    diagnostics: Rc<RefCell<Diagnostics>>,
    session: Option<Session>,
    language: String,
    timezone: String,
}

impl AuthManager {
    /// Restores any persisted session so a restart keeps the login.
    pub fn new(
        transport: Rc<dyn Transport>,
        store: SessionStore,
        diagnostics: Rc<RefCell<Diagnostics>>,
        language: &str,
        timezone: &str,
    ) -> Self {
        let session = store.load();
        Self {
            transport,
            store,
            diagnostics,
            session,
            language: language.to_string(),
            timezone: timezone.to_string(),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session
            .as_ref()
            .map(Session::is_authenticated)
            .unwrap_or(false)
    }

    pub fn is_token_expired(&self) -> bool {
        self.session
            .as_ref()
            .map(Session::is_expired)
            .unwrap_or(true)
    }

    /// Authenticated request headers, derived from the current session.
    pub fn auth_headers(&self) -> Result<Vec<(String, String)>> {
        let session = self
            .session
            .as_ref()
            .filter(|s| s.is_authenticated())
            .ok_or(PortalError::NoSession)?;

        let mut headers =
            device::base_headers(&session.mac_address, &self.language, &self.timezone);
        headers.push((
            "Authorization".to_string(),
            format!("Bearer {}", session.token),
        ));
        Ok(headers)
    }

    /// Validate the MAC, normalize the portal URL, handshake, and persist
    /// the resulting session.
    pub fn login(&mut self, portal: &str, mac: &str) -> LoginOutcome {
        if !device::is_valid_mac(mac) {
            return LoginOutcome::failed(PortalError::InvalidMac(mac.to_string()).to_string());
        }

        let base = normalize_portal_url(portal);
        let payload = match handshake(
            self.transport.as_ref(),
            &self.diagnostics,
            &base,
            mac,
            &self.language,
            &self.timezone,
        ) {
            Ok(payload) => payload,
            Err(err) => return LoginOutcome::failed(err.to_string()),
        };

        let now = Utc::now();
        let token_expiry = payload
            .token_expire
            .unwrap_or(now + chrono::Duration::hours(DEFAULT_TOKEN_TTL_HOURS));

        let session = Session {
            token: payload.token,
            portal_url: base,
            mac_address: mac.to_string(),
            login_time: now,
            token_expiry,
            device_info: json!({
                "device_id": device::device_id(mac),
                "model": device::MODEL,
            }),
        };

        // The in-memory session is authoritative; persistence is best effort.
        if let Err(err) = self.store.save(&session) {
            eprintln!("Warning: failed to persist session: {}", err);
        }
        self.store.remember_login(portal, mac);
        self.session = Some(session.clone());

        LoginOutcome::succeeded(session)
    }

    /// Replay the stored login when the token has expired. Returns whether a
    /// valid session is in place afterwards.
    pub fn refresh_token_if_needed(&mut self) -> bool {
        let Some(session) = self.session.clone() else {
            return false;
        };
        if !session.is_expired() {
            return true;
        }
        self.login(&session.portal_url, &session.mac_address).success
    }

    pub fn logout(&mut self) {
        self.session = None;
        self.store.clear();
    }

    /// View-layer guard: false (after logging out) when unauthenticated or
    /// expired.
    pub fn protect_page(&mut self) -> bool {
        if self.is_authenticated() && !self.is_token_expired() {
            true
        } else {
            self.logout();
            false
        }
    }

    pub fn last_login(&self) -> (Option<String>, Option<String>) {
        self.store.last_login()
    }
}
