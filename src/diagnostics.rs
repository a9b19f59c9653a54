//! Request diagnostics for operator troubleshooting.
//!
//! Every portal request attempt lands here: an in-memory bounded ring buffer
//! for the interactive `/diag` view, plus an optional JSONL event file
//! (one serde_json object per line, flushed per event). Recording never
//! fails the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

pub const DEFAULT_BUFFER_SIZE: usize = 200;

/// One request attempt. Only header names are retained: the Authorization
/// value carries the bearer token and must stay out of the log.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub header_names: Vec<String>,
    pub params: Vec<(String, String)>,
    pub status: Option<u16>,
    pub ok: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

pub struct Diagnostics {
    session_id: String,
    capacity: usize,
    records: VecDeque<RequestRecord>,
    file: Option<File>,
}

impl Diagnostics {
    pub fn new(capacity: usize, session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            capacity: capacity.max(1),
            records: VecDeque::new(),
            file: None,
        }
    }

    /// Attach a JSONL event file. Failure to open degrades to buffer-only.
    pub fn with_log_file(mut self, path: &Path) -> Self {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => self.file = Some(file),
            Err(err) => {
                eprintln!(
                    "Warning: diagnostics log {} unavailable: {}",
                    path.display(),
                    err
                );
            }
        }
        self
    }

    /// Record a request attempt. Oldest records are evicted past capacity;
    /// file write errors are reported once to stderr and otherwise ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn track_request(
        &mut self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        params: &[(String, String)],
        status: Option<u16>,
        error: Option<&str>,
        duration_ms: u64,
    ) {
        let record = RequestRecord {
            timestamp: Utc::now(),
            method: method.to_string(),
            url: url.to_string(),
            header_names: headers.iter().map(|(k, _)| k.clone()).collect(),
            params: params.to_vec(),
            status,
            ok: error.is_none(),
            error: error.map(String::from),
            duration_ms,
        };

        self.write_event(&record);

        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    fn write_event(&mut self, record: &RequestRecord) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let data = match serde_json::to_value(record) {
            Ok(data) => data,
            Err(_) => return,
        };
        let event = Event {
            ts: record.timestamp,
            session_id: &self.session_id,
            event_type: "api_request",
            data,
        };
        if let Ok(line) = serde_json::to_string(&event) {
            if writeln!(file, "{}", line).and_then(|_| file.flush()).is_err() {
                eprintln!("Warning: diagnostics log write failed, disabling file sink");
                self.file = None;
            }
        }
    }

    /// Most recent records, newest last.
    pub fn recent(&self, n: usize) -> Vec<&RequestRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).collect()
    }

    pub fn failure_count(&self) -> usize {
        self.records.iter().filter(|r| !r.ok).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_n(diag: &mut Diagnostics, n: usize, ok: bool) {
        for i in 0..n {
            diag.track_request(
                "GET",
                &format!("http://portal/{}", i),
                &[],
                &[],
                if ok { Some(200) } else { Some(404) },
                if ok { None } else { Some("endpoint not found") },
                5,
            );
        }
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut diag = Diagnostics::new(3, "s");
        track_n(&mut diag, 5, true);
        assert_eq!(diag.len(), 3);
        // Oldest two evicted; the survivors are requests 2, 3, 4.
        assert_eq!(diag.recent(3)[0].url, "http://portal/2");
        assert_eq!(diag.recent(3)[2].url, "http://portal/4");
    }

    #[test]
    fn test_failure_count() {
        let mut diag = Diagnostics::new(10, "s");
        track_n(&mut diag, 2, true);
        track_n(&mut diag, 3, false);
        assert_eq!(diag.failure_count(), 3);
    }

    #[test]
    fn test_recent_caps_at_available() {
        let mut diag = Diagnostics::new(10, "s");
        track_n(&mut diag, 2, true);
        assert_eq!(diag.recent(5).len(), 2);
    }

    #[test]
    fn test_jsonl_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diag.jsonl");
        let mut diag = Diagnostics::new(10, "session-1").with_log_file(&path);
        track_n(&mut diag, 2, false);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(event["type"], "api_request");
        assert_eq!(event["session_id"], "session-1");
        assert_eq!(event["ok"], false);
    }

    #[test]
    fn test_header_values_not_retained() {
        let mut diag = Diagnostics::new(10, "s");
        diag.track_request(
            "GET",
            "http://portal/handshake",
            &[("Authorization".to_string(), "Bearer secret".to_string())],
            &[],
            Some(200),
            None,
            1,
        );
        let record = diag.recent(1)[0];
        assert_eq!(record.header_names, vec!["Authorization"]);
        assert!(!serde_json::to_string(record).unwrap().contains("secret"));
    }
}
