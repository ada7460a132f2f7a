//! Injection pattern screening plus per-path overload protection.
//!
//! Three layers run in order on every request: a dangerous-pattern scan over the
//! decoded query string and body, a wildcard-abuse check over individual query values,
//! and a per-path circuit breaker with an in-flight concurrency cap. Circuit state is
//! process-local on purpose: it measures this instance's own stress, and sharing it
//! through the decision store would let one slow instance trip the whole fleet.

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{
    context::ModuleContext,
    events::{RequestEvent, ResponseEvent},
    module::SecurityModule,
    verdict::ThreatVerdict,
};

const ID: &str = "query-shield";

const PATTERN_BLOCK_SECONDS: u64 = 600;
const WILDCARD_BLOCK_SECONDS: u64 = 300;
/// An open circuit auto-resets to closed after this long.
const CIRCUIT_RESET: Duration = Duration::from_secs(30);

static DANGEROUS_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("sql tautology", r#"(?i)['"]\s*(OR|AND)\s+['"]?\d"#),
        ("sleep call", r"(?i)\bSLEEP\s*\("),
        ("union select", r"(?i)\bUNION\s+SELECT\b"),
        ("mongo where", r"(?i)\$where\b"),
        ("drop table", r"(?i)\bDROP\s+TABLE\b"),
        ("script tag", r"(?i)<script[^>]*>"),
        ("javascript uri", r"(?i)javascript\s*:"),
        ("eval call", r"(?i)\beval\s*\("),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("static pattern")))
    .collect()
});

static WILDCARD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"^%+$", r"^_+$", r"(?i)\bLIKE\s+'%"]
        .into_iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
});

#[derive(Default)]
struct PathState {
    in_flight: AtomicI64,
    failures: AtomicU32,
    open: AtomicBool,
    opened_at: parking_lot::Mutex<Option<Instant>>,
}

/// Screens queries for injection shapes and sheds load per path.
///
/// # Examples
///
/// ```rust
/// use sentinai::config::SentinConfig;
/// use sentinai::modules::QueryShield;
///
/// let config: SentinConfig = serde_json::from_str(
///     r#"{"modules":{"query-shield":{"config":{
///         "max-concurrency": 25,
///         "circuit-breaker-threshold": 3,
///         "slow-response-ms": 1500
///     }}}}"#,
/// ).unwrap();
/// let module = QueryShield::new();
/// ```
#[derive(Default)]
pub struct QueryShield {
    circuits: DashMap<String, Arc<PathState>>,
}

impl QueryShield {
    pub fn new() -> Self {
        Self::default()
    }

    fn path_state(&self, path: &str) -> Arc<PathState> {
        self.circuits
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(PathState::default()))
            .clone()
    }
}

fn decoded(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn find_dangerous(haystack: &str) -> Option<&'static str> {
    DANGEROUS_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(haystack))
        .map(|(name, _)| *name)
}

fn find_wildcard_abuse(query: &str) -> Option<String> {
    for pair in decoded(query).split('&') {
        let value = match pair.split_once('=') {
            Some((_, v)) => v,
            None => continue,
        };
        if WILDCARD_PATTERNS.iter().any(|re| re.is_match(value)) {
            return Some(value.to_string());
        }
    }
    None
}

#[async_trait]
impl SecurityModule for QueryShield {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "Query Shield"
    }

    fn order(&self) -> i32 {
        200
    }

    async fn analyze_request(
        &self,
        event: &RequestEvent,
        ctx: &ModuleContext,
    ) -> anyhow::Result<ThreatVerdict> {
        // Layer 1: dangerous patterns over decoded query + body.
        let mut haystack = decoded(&event.query);
        if let Some(body) = &event.body {
            haystack.push(' ');
            haystack.push_str(body);
        }
        if let Some(pattern) = find_dangerous(&haystack) {
            return Ok(ThreatVerdict::block(
                ID,
                format!("Dangerous query pattern detected: {pattern}"),
                event.source_ip.clone(),
                PATTERN_BLOCK_SECONDS,
            ));
        }

        // Layer 2: wildcard abuse in individual query values.
        if let Some(value) = find_wildcard_abuse(&event.query) {
            return Ok(ThreatVerdict::block(
                ID,
                format!("Wildcard abuse in query value: {value}"),
                event.source_ip.clone(),
                WILDCARD_BLOCK_SECONDS,
            ));
        }

        // Layer 3: circuit breaker + in-flight cap.
        let state = self.path_state(&event.path);
        if state.open.load(Ordering::Acquire) {
            let reset = state
                .opened_at
                .lock()
                .is_some_and(|at| at.elapsed() > CIRCUIT_RESET);
            if reset {
                state.open.store(false, Ordering::Release);
                state.failures.store(0, Ordering::Release);
                debug!(path = %event.path, "circuit auto-reset to closed");
            } else {
                return Ok(ThreatVerdict::throttle(
                    ID,
                    format!("Circuit open for {}", event.path),
                    event.source_ip.clone(),
                ));
            }
        }

        let max_concurrency =
            ctx.config.module_u64(ID, "max-concurrency", 50) as i64;
        let in_flight = state.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        if in_flight > max_concurrency {
            state.in_flight.fetch_sub(1, Ordering::AcqRel);
            return Ok(ThreatVerdict::throttle(
                ID,
                format!("Concurrency limit reached for {}", event.path),
                event.source_ip.clone(),
            ));
        }

        Ok(ThreatVerdict::safe(ID))
    }

    async fn analyze_response(
        &self,
        response: ResponseEvent,
        ctx: &ModuleContext,
    ) -> anyhow::Result<ResponseEvent> {
        let Some(state) = self.circuits.get(&response.path).map(|s| s.clone()) else {
            return Ok(response);
        };

        let _ = state
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (v > 0).then_some(v - 1)
            });

        let slow_ms = ctx.config.module_u64(ID, "slow-response-ms", 3000);
        let threshold = ctx.config.module_u64(ID, "circuit-breaker-threshold", 5) as u32;

        if response.response_time_ms > slow_ms {
            let failures = state.failures.fetch_add(1, Ordering::AcqRel) + 1;
            if failures >= threshold && !state.open.swap(true, Ordering::AcqRel) {
                *state.opened_at.lock() = Some(Instant::now());
                warn!(path = %response.path, failures, "circuit opened after consecutive slow responses");
            }
        } else {
            let prev = state
                .failures
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                    Some(v.saturating_sub(1))
                })
                .unwrap_or(0);
            if prev <= 1 {
                state.open.store(false, Ordering::Release);
            }
        }

        Ok(response)
    }
}
