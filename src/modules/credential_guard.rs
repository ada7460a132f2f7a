//! Credential-stuffing defense over login endpoints.
//!
//! The module watches authentication traffic from three angles: a synchronous gate that
//! turns away browsers whose fingerprint earned a block, response-path counters that
//! record login failures per path and globally, and a batch analyzer that converts
//! failure clusters into blocks. A global failure spike deliberately never blocks —
//! a site-wide outage produces the same signal as a distributed attack, and denying on
//! it would lock everyone out.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    context::ModuleContext,
    events::{RequestEvent, ResponseEvent, browser_fingerprint},
    module::SecurityModule,
    verdict::{ThreatLevel, ThreatVerdict},
};

const ID: &str = "credential-guard";

const LOGIN_MARKERS: [&str; 5] = ["/login", "/auth", "/signin", "/token", "/authenticate"];
const FAILURE_STATUSES: [u16; 3] = [400, 401, 403];

/// Sliding window for failure counters.
const FAILURE_WINDOW: Duration = Duration::from_secs(300);
/// Duration of blocks issued by this module.
const BLOCK_SECONDS: u64 = 1800;

const GLOBAL_FAILURES_KEY: &str = "cg:global:failures";

fn is_login_path(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    LOGIN_MARKERS.iter().any(|m| path.contains(m))
}

fn is_login_attempt(event: &RequestEvent) -> bool {
    event.method.eq_ignore_ascii_case("POST") && is_login_path(&event.path)
}

fn is_failed_login(event: &RequestEvent) -> bool {
    is_login_attempt(event) && FAILURE_STATUSES.contains(&event.response_status)
}

fn fingerprint_of(event: &RequestEvent) -> String {
    event.fingerprint.clone().unwrap_or_else(|| {
        browser_fingerprint(
            &event.user_agent,
            event.header("accept-language").unwrap_or(""),
            event.header("accept").unwrap_or(""),
        )
    })
}

/// Detects credential stuffing through failure counters and fingerprint blocks.
///
/// # Examples
///
/// ```rust
/// use sentinai::config::SentinConfig;
/// use sentinai::modules::CredentialGuard;
///
/// // thresholds are tuned through the module's configuration section
/// let config: SentinConfig = serde_json::from_str(
///     r#"{"modules":{"credential-guard":{"config":{
///         "per-username-failures": 5,
///         "per-fingerprint-failures": 10,
///         "global-failure-spike": 1000
///     }}}}"#,
/// ).unwrap();
/// let module = CredentialGuard::new();
/// ```
#[derive(Default)]
pub struct CredentialGuard;

impl CredentialGuard {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SecurityModule for CredentialGuard {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "Credential Guard"
    }

    fn order(&self) -> i32 {
        100
    }

    async fn analyze_request(
        &self,
        event: &RequestEvent,
        ctx: &ModuleContext,
    ) -> anyhow::Result<ThreatVerdict> {
        if !is_login_attempt(event) {
            return Ok(ThreatVerdict::safe(ID));
        }

        let fp_key = format!("cg:fp:{}", fingerprint_of(event));
        let blocked = match ctx.store.is_blocked(&fp_key).await {
            Ok(blocked) => blocked,
            Err(err) => {
                warn!(error = %err, "fingerprint lookup failed, treating as not blocked");
                false
            }
        };
        if blocked {
            return Ok(ThreatVerdict::block(
                ID,
                "Browser fingerprint blocked for repeated login failures",
                event.source_ip.clone(),
                BLOCK_SECONDS,
            ));
        }

        Ok(ThreatVerdict::safe(ID))
    }

    async fn analyze_response(
        &self,
        response: ResponseEvent,
        ctx: &ModuleContext,
    ) -> anyhow::Result<ResponseEvent> {
        if is_login_path(&response.path) && FAILURE_STATUSES.contains(&response.status) {
            let path_key = format!("cg:path:{}", response.path);
            ctx.store.increment_counter(&path_key, FAILURE_WINDOW).await?;
            ctx.store
                .increment_counter(GLOBAL_FAILURES_KEY, FAILURE_WINDOW)
                .await?;
        }
        Ok(response)
    }

    async fn analyze_batch(
        &self,
        events: &[RequestEvent],
        ctx: &ModuleContext,
    ) -> anyhow::Result<Vec<ThreatVerdict>> {
        let failures: Vec<&RequestEvent> = events.iter().filter(|e| is_failed_login(e)).collect();
        if failures.is_empty() {
            return Ok(Vec::new());
        }

        let global_spike = ctx.config.module_u64(ID, "global-failure-spike", 500);
        let global = ctx.store.get_counter(GLOBAL_FAILURES_KEY).await.unwrap_or(0);
        if global > global_spike {
            // Site-wide failure spikes look identical to outages; observe, never block.
            return Ok(vec![ThreatVerdict::log(
                ID,
                ThreatLevel::Medium,
                format!("Global login failure spike: {global} failures in window"),
                Some("global".to_string()),
            )]);
        }

        let per_username = ctx.config.module_u64(ID, "per-username-failures", 10);
        let per_fingerprint = ctx.config.module_u64(ID, "per-fingerprint-failures", 20);

        let mut by_target: HashMap<&str, u64> = HashMap::new();
        let mut by_fingerprint: HashMap<String, u64> = HashMap::new();
        for event in &failures {
            let target = event
                .user_id
                .as_deref()
                .unwrap_or(event.source_ip.as_str());
            *by_target.entry(target).or_default() += 1;
            *by_fingerprint.entry(fingerprint_of(event)).or_default() += 1;
        }

        let mut verdicts = Vec::new();
        for (target, count) in by_target {
            if count >= per_username {
                verdicts.push(ThreatVerdict::block(
                    ID,
                    format!("{count} failed login attempts for {target}"),
                    target,
                    BLOCK_SECONDS,
                ));
            }
        }

        for (fingerprint, count) in by_fingerprint {
            if count >= per_fingerprint {
                let key = format!("cg:fp:{fingerprint}");
                // Module-scoped key: written here, read by the synchronous gate.
                if let Err(err) = ctx
                    .store
                    .block(
                        &key,
                        &format!("{count} login failures from one fingerprint"),
                        Some(Duration::from_secs(BLOCK_SECONDS)),
                    )
                    .await
                {
                    warn!(error = %err, "failed to write fingerprint block");
                    continue;
                }
                info!(fingerprint = %fingerprint, count, "blocked browser fingerprint");
                verdicts.push(ThreatVerdict::log(
                    ID,
                    ThreatLevel::High,
                    format!("{count} login failures from fingerprint {fingerprint}"),
                    Some(fingerprint),
                ));
            }
        }

        Ok(verdicts)
    }
}
