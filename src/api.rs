//! Endpoint-pattern resolver and the typed portal API façade.
//!
//! A portal's concrete routing convention is unknown up front: the same
//! logical endpoint may live under the versioned API path, an unversioned
//! path, a bare path, or one of the PHP-era query-based shapes. The resolver
//! walks a fixed ordered list of URL shapes, strictly sequentially, and the
//! first shape that answers 2xx with parseable JSON wins. The winning shape
//! is remembered for the rest of the session.

use crate::auth::{AuthManager, LoginOutcome};
use crate::diagnostics::Diagnostics;
use crate::envelope::{decode_body, unwrap_envelope};
use crate::error::{status_error, PortalError, Result};
use crate::normalize::{percent_encode, portal_root};
use crate::session::Session;
use crate::transport::Transport;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

/// Ordered URL shapes tried for a logical endpoint. `{endpoint}` is the
/// logical name; the PHP shapes route entirely through query parameters.
pub const ENDPOINT_PATTERNS: &[&str] = &[
    "stalker_portal/api/v1/{endpoint}",
    "stalker_portal/api/{endpoint}",
    "{endpoint}",
    "stalker_portal/server/load.php",
    "server/load.php",
    "portal.php",
];

fn build_url(root: &str, pattern: &str, endpoint: &str, params: &[(String, String)]) -> String {
    let path = pattern.replace("{endpoint}", endpoint);
    let mut url = format!("{}{}", root, path);
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query);
    }
    url
}

pub struct PortalApi {
    auth: AuthManager,
    transport: Rc<dyn Transport>,
    diagnostics: Rc<RefCell<Diagnostics>>,
    /// Index of the last pattern that worked; tried first next time.
    preferred_pattern: Cell<Option<usize>>,
    verbose: bool,
}

impl PortalApi {
    pub fn new(
        auth: AuthManager,
        transport: Rc<dyn Transport>,
        diagnostics: Rc<RefCell<Diagnostics>>,
        verbose: bool,
    ) -> Self {
        Self {
            auth,
            transport,
            diagnostics,
            preferred_pattern: Cell::new(None),
            verbose,
        }
    }

    /// Resolve and fetch a logical endpoint.
    ///
    /// The session is re-validated on every call; it may have been cleared
    /// between an authentication check and this request.
    pub fn request(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let headers = self.auth.auth_headers()?;
        let root = {
            let session = self.auth.session().ok_or(PortalError::NoSession)?;
            portal_root(&session.portal_url)
        };
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut order: Vec<usize> = (0..ENDPOINT_PATTERNS.len()).collect();
        if let Some(preferred) = self.preferred_pattern.get() {
            if let Some(pos) = order.iter().position(|&i| i == preferred) {
                order.remove(pos);
                order.insert(0, preferred);
            }
        }

        let mut last = PortalError::Network("no URL patterns configured".to_string());
        let attempts = order.len();

        for idx in order {
            let url = build_url(&root, ENDPOINT_PATTERNS[idx], endpoint, &params);
            if self.verbose {
                eprintln!("[portalctl] trying {}", url);
            }
            let started = Instant::now();
            let outcome = self.transport.get(&url, &headers);
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(resp) if resp.is_success() => match decode_body(&resp.body) {
                    Ok(doc) => {
                        self.track(&url, &headers, &params, Some(resp.status), None, duration_ms);
                        self.preferred_pattern.set(Some(idx));
                        return Ok(unwrap_envelope(doc));
                    }
                    Err(err) => {
                        self.track(
                            &url,
                            &headers,
                            &params,
                            Some(resp.status),
                            Some(&err.to_string()),
                            duration_ms,
                        );
                        last = err;
                    }
                },
                Ok(resp) => {
                    let status = resp.status;
                    let err = status_error(status, resp.body);
                    self.track(
                        &url,
                        &headers,
                        &params,
                        Some(status),
                        Some(&err.to_string()),
                        duration_ms,
                    );
                    last = err;
                }
                Err(err) => {
                    self.track(&url, &headers, &params, None, Some(&err.to_string()), duration_ms);
                    last = err;
                }
            }
        }

        Err(PortalError::AllPatternsFailed {
            endpoint: endpoint.to_string(),
            attempts,
            last: Box::new(last),
        })
    }

    fn track(
        &self,
        url: &str,
        headers: &[(String, String)],
        params: &[(String, String)],
        status: Option<u16>,
        error: Option<&str>,
        duration_ms: u64,
    ) {
        self.diagnostics
            .borrow_mut()
            .track_request("GET", url, headers, params, status, error, duration_ms);
    }

    // ---- content façade -------------------------------------------------

    pub fn get_channels(&self, page: u32) -> Result<Value> {
        let p = page.to_string();
        self.request(
            "itv",
            &[
                ("type", "itv"),
                ("action", "get_ordered_list"),
                ("p", &p),
                ("JsHttpRequest", "1-xml"),
            ],
        )
    }

    pub fn get_movies(&self, page: u32) -> Result<Value> {
        let p = page.to_string();
        self.request(
            "vod",
            &[
                ("type", "vod"),
                ("action", "get_ordered_list"),
                ("p", &p),
                ("JsHttpRequest", "1-xml"),
            ],
        )
    }

    pub fn get_series(&self, page: u32) -> Result<Value> {
        let p = page.to_string();
        self.request(
            "series",
            &[
                ("type", "series"),
                ("action", "get_ordered_list"),
                ("p", &p),
                ("JsHttpRequest", "1-xml"),
            ],
        )
    }

    /// Resolve a playable URL for a channel. `cmd` is the portal-supplied
    /// command string from the channel listing.
    pub fn get_channel_link(&self, cmd: &str) -> Result<Value> {
        self.request(
            "itv",
            &[
                ("type", "itv"),
                ("action", "create_link"),
                ("cmd", cmd),
                ("JsHttpRequest", "1-xml"),
            ],
        )
    }

    pub fn get_movie_link(&self, movie_id: &str) -> Result<Value> {
        let cmd = format!("/media/{}.mpg", movie_id);
        self.request(
            "vod",
            &[
                ("type", "vod"),
                ("action", "create_link"),
                ("cmd", &cmd),
                ("JsHttpRequest", "1-xml"),
            ],
        )
    }

    pub fn get_series_link(&self, series_id: &str, episode: u32) -> Result<Value> {
        let cmd = format!("/media/{}.mpg", series_id);
        let episode = episode.to_string();
        self.request(
            "vod",
            &[
                ("type", "vod"),
                ("action", "create_link"),
                ("cmd", &cmd),
                ("series", &episode),
                ("JsHttpRequest", "1-xml"),
            ],
        )
    }

    pub fn get_profile(&self) -> Result<Value> {
        self.request(
            "profile",
            &[
                ("type", "stb"),
                ("action", "get_profile"),
                ("JsHttpRequest", "1-xml"),
            ],
        )
    }

    pub fn get_epg(&self, ch_id: &str, period_hours: u32) -> Result<Value> {
        let period = period_hours.to_string();
        self.request(
            "epg",
            &[
                ("type", "itv"),
                ("action", "get_epg_info"),
                ("ch_id", ch_id),
                ("period", &period),
                ("JsHttpRequest", "1-xml"),
            ],
        )
    }

    /// Can the portal be reached with the current session?
    pub fn test_connection(&self) -> bool {
        self.get_profile().is_ok()
    }

    // ---- session lifecycle (delegated to the auth manager) --------------

    /// Log in and verify the session by fetching the profile. Verification
    /// failure is reported but does not invalidate the login.
    pub fn login(&mut self, portal: &str, mac: &str) -> LoginOutcome {
        let outcome = self.auth.login(portal, mac);
        if outcome.success {
            self.preferred_pattern.set(None);
            if let Err(err) = self.get_profile() {
                eprintln!("Warning: profile verification failed: {}", err);
            }
        }
        outcome
    }

    pub fn logout(&mut self) {
        self.auth.logout();
        self.preferred_pattern.set(None);
    }

    pub fn protect_page(&mut self) -> bool {
        let ok = self.auth.protect_page();
        if !ok {
            self.preferred_pattern.set(None);
        }
        ok
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub fn session(&self) -> Option<&Session> {
        self.auth.session()
    }

    pub fn refresh_token_if_needed(&mut self) -> bool {
        self.auth.refresh_token_if_needed()
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }
}
