//! Immutable per-request and per-response event records.
//!
//! The filter captures each HTTP round-trip into these value objects so modules can
//! analyze traffic without touching the live request. Header names are stored
//! lower-cased; `header()` lower-cases its probe, so lookups behave case-insensitively
//! regardless of what the client sent. Copy-constructors (`with_response_data`,
//! `with_body`) produce updated records without mutating the original.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

/// Immutable capture of one inbound HTTP request.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// Opaque 8-char token correlating logs, verdicts, and the wire response.
    pub request_id: String,
    pub method: String,
    pub path: String,
    /// Raw (still URL-encoded) query string, empty when absent.
    pub query: String,
    /// Header map with lower-cased names, single value per name.
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub source_ip: String,
    pub user_agent: String,
    /// Resolved identity, when authentication (or Basic credential parsing) succeeded.
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    /// Stable browser fingerprint, when enough headers were present to derive one.
    pub fingerprint: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Zero until the response is known.
    pub response_status: u16,
    /// Zero until the response is known.
    pub response_time_ms: u64,
}

impl RequestEvent {
    /// Case-insensitive header lookup.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::events::RequestEvent;
    /// # fn example(event: &RequestEvent) {
    /// // headers are stored lower-cased; probes may use any casing
    /// assert_eq!(event.header("X-Forwarded-For"), event.header("x-forwarded-for"));
    /// # }
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Copy of this event carrying the observed response status and elapsed time.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::events::RequestEvent;
    /// # fn example(event: &RequestEvent) {
    /// let completed = event.with_response_data(401, 37);
    /// assert_eq!(completed.response_status, 401);
    /// assert_eq!(completed.response_time_ms, 37);
    /// // the original stays untouched
    /// assert_eq!(event.response_status, 0);
    /// # }
    /// ```
    pub fn with_response_data(&self, status: u16, response_time_ms: u64) -> Self {
        Self {
            response_status: status,
            response_time_ms,
            ..self.clone()
        }
    }
}

/// Immutable capture of one outbound HTTP response.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub request_id: String,
    pub path: String,
    pub status: u16,
    pub content_type: String,
    /// Full body text; may be oversized, modules guard their own limits.
    pub body: String,
    pub response_time_ms: u64,
}

impl ResponseEvent {
    /// Copy of this event with a replacement body.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::events::ResponseEvent;
    /// # fn example(response: &ResponseEvent) {
    /// let scrubbed = response.with_body(r#"{"error":"redacted"}"#);
    /// assert_eq!(scrubbed.body, r#"{"error":"redacted"}"#);
    /// assert_eq!(scrubbed.status, response.status);
    /// # }
    /// ```
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..self.clone()
        }
    }
}

/// Stable hash of `user-agent | accept-language | accept`.
///
/// Shared between the filter (which stamps `RequestEvent::fingerprint`) and
/// Credential-Guard (which keys its `cg:fp:` blocks on it).
///
/// # Examples
///
/// ```rust
/// use sentinai::events::browser_fingerprint;
///
/// let a = browser_fingerprint("Mozilla/5.0", "en-US", "application/json");
/// let b = browser_fingerprint("Mozilla/5.0", "en-US", "application/json");
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 40); // sha-1 hex
/// ```
pub fn browser_fingerprint(user_agent: &str, accept_language: &str, accept: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(user_agent.as_bytes());
    hasher.update(b"|");
    hasher.update(accept_language.as_bytes());
    hasher.update(b"|");
    hasher.update(accept.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Bare-bones event for module and engine tests.
    pub fn event(method: &str, path: &str) -> RequestEvent {
        RequestEvent {
            request_id: "deadbeef".to_string(),
            method: method.to_string(),
            path: path.to_string(),
            query: String::new(),
            headers: HashMap::new(),
            body: None,
            source_ip: "203.0.113.9".to_string(),
            user_agent: "test-agent".to_string(),
            user_id: None,
            session_id: None,
            fingerprint: None,
            timestamp: Utc::now(),
            response_status: 0,
            response_time_ms: 0,
        }
    }

    pub fn response(path: &str, status: u16, content_type: &str, body: &str) -> ResponseEvent {
        ResponseEvent {
            request_id: "deadbeef".to_string(),
            path: path.to_string(),
            status,
            content_type: content_type.to_string(),
            body: body.to_string(),
            response_time_ms: 5,
        }
    }
}
