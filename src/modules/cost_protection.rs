//! Spend guard for AI-backed endpoints.
//!
//! Opt-in only: the module stays dormant unless its configuration section exists.
//! The daily spend estimate is a process-local tally (each instance protects its own
//! budget slice); the per-user request counter lives in the decision store so a single
//! user cannot multiply their allowance across the fleet.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::warn;

use crate::{
    context::ModuleContext,
    events::RequestEvent,
    module::SecurityModule,
    verdict::ThreatVerdict,
};

const ID: &str = "cost-protection";

const AI_PATH_MARKERS: [&str; 6] =
    ["/chat", "/summarize", "/generate", "/ai/", "/completion", "/predict"];

const PER_USER_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

fn is_ai_path(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    AI_PATH_MARKERS.iter().any(|m| path.contains(m))
}

struct DailyTally {
    day: NaiveDate,
    count: u64,
}

/// Throttles AI-endpoint traffic once estimated spend or per-user quotas run out.
///
/// # Examples
///
/// ```rust
/// use sentinai::config::SentinConfig;
/// use sentinai::modules::CostProtection;
///
/// // opt-in: the module only runs when its section is present
/// let config: SentinConfig = serde_json::from_str(
///     r#"{"modules":{"cost-protection":{"config":{
///         "daily-limit": 25.0,
///         "per-user-limit": 50,
///         "cost-per-request": 0.01,
///         "alert-threshold": 0.9
///     }}}}"#,
/// ).unwrap();
/// let module = CostProtection::new();
/// ```
pub struct CostProtection {
    daily: Mutex<DailyTally>,
}

impl Default for CostProtection {
    fn default() -> Self {
        Self::new()
    }
}

impl CostProtection {
    pub fn new() -> Self {
        Self {
            daily: Mutex::new(DailyTally {
                day: Utc::now().date_naive(),
                count: 0,
            }),
        }
    }
}

#[async_trait]
impl SecurityModule for CostProtection {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "Cost Protection"
    }

    fn order(&self) -> i32 {
        900
    }

    /// Explicit opt-in: absent configuration section means disabled.
    fn is_enabled(&self, ctx: &ModuleContext) -> bool {
        ctx.config.module_configured(ID) && ctx.config.module_enabled(ID)
    }

    async fn analyze_request(
        &self,
        event: &RequestEvent,
        ctx: &ModuleContext,
    ) -> anyhow::Result<ThreatVerdict> {
        if !is_ai_path(&event.path) {
            return Ok(ThreatVerdict::safe(ID));
        }

        let cost_per_request = ctx.config.module_f64(ID, "cost-per-request", 0.003);
        let daily_limit = ctx.config.module_f64(ID, "daily-limit", 50.0);
        let alert_threshold = ctx.config.module_f64(ID, "alert-threshold", 0.8);

        let estimated_spend = {
            let mut tally = self.daily.lock();
            let today = Utc::now().date_naive();
            if tally.day != today {
                tally.day = today;
                tally.count = 0;
            }
            tally.count as f64 * cost_per_request
        };

        if estimated_spend >= daily_limit {
            return Ok(ThreatVerdict::throttle(
                ID,
                format!("Daily AI spend limit reached (${estimated_spend:.2})"),
                event.source_ip.clone(),
            ));
        }
        if estimated_spend >= alert_threshold * daily_limit {
            warn!(
                spend = estimated_spend,
                limit = daily_limit,
                "approaching daily AI spend limit",
            );
        }

        if let Some(user) = event.user_id.as_deref() {
            let count = ctx
                .store
                .increment_counter(&format!("cp:user:{user}"), PER_USER_WINDOW)
                .await?;
            let per_user_limit = ctx.config.module_u64(ID, "per-user-limit", 100);
            if count > per_user_limit {
                return Ok(ThreatVerdict::throttle(
                    ID,
                    format!("{count} AI requests in 24h exceeds per-user limit"),
                    format!("user:{user}"),
                ));
            }
        }

        self.daily.lock().count += 1;
        Ok(ThreatVerdict::safe(ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ai::AiAnalyzer,
        config::SentinConfig,
        events::test_support::event,
        store::MemoryStore,
        verdict::ThreatAction,
    };
    use std::sync::Arc;

    fn ctx(json: &str) -> ModuleContext {
        ModuleContext::new(
            Arc::new(MemoryStore::new()),
            AiAnalyzer::disabled(),
            Arc::new(serde_json::from_str::<SentinConfig>(json).unwrap()),
        )
    }

    #[test]
    fn ai_paths_are_matched_case_insensitively() {
        assert!(is_ai_path("/api/Chat"));
        assert!(is_ai_path("/v1/ai/translate"));
        assert!(is_ai_path("/completions"));
        assert!(!is_ai_path("/api/users"));
    }

    #[test]
    fn module_requires_explicit_configuration() {
        let absent = ctx(r#"{}"#);
        assert!(!CostProtection::new().is_enabled(&absent));

        let present = ctx(r#"{"modules":{"cost-protection":{}}}"#);
        assert!(CostProtection::new().is_enabled(&present));

        let disabled = ctx(r#"{"modules":{"cost-protection":{"enabled":false}}}"#);
        assert!(!CostProtection::new().is_enabled(&disabled));
    }

    #[tokio::test]
    async fn non_ai_paths_cost_nothing() {
        let ctx = ctx(r#"{"modules":{"cost-protection":{}}}"#);
        let module = CostProtection::new();
        let verdict = module
            .analyze_request(&event("GET", "/api/users"), &ctx)
            .await
            .unwrap();
        assert!(!verdict.is_threat());
        assert_eq!(module.daily.lock().count, 0);
    }

    #[tokio::test]
    async fn daily_limit_throttles_by_source_ip() {
        // 3 requests at $1 each against a $2 limit
        let ctx = ctx(
            r#"{"modules":{"cost-protection":{"config":{"cost-per-request":1.0,"daily-limit":2.0}}}}"#,
        );
        let module = CostProtection::new();
        let ev = event("POST", "/api/chat");

        assert!(!module.analyze_request(&ev, &ctx).await.unwrap().is_threat());
        assert!(!module.analyze_request(&ev, &ctx).await.unwrap().is_threat());
        let third = module.analyze_request(&ev, &ctx).await.unwrap();
        assert_eq!(third.action, ThreatAction::Throttle);
        assert_eq!(third.target.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn per_user_limit_throttles_with_user_target() {
        let ctx = ctx(
            r#"{"modules":{"cost-protection":{"config":{"per-user-limit":3}}}}"#,
        );
        let module = CostProtection::new();
        let mut ev = event("POST", "/api/generate");
        ev.user_id = Some("alice".to_string());

        for _ in 0..3 {
            assert!(!module.analyze_request(&ev, &ctx).await.unwrap().is_threat());
        }
        let fourth = module.analyze_request(&ev, &ctx).await.unwrap();
        assert_eq!(fourth.action, ThreatAction::Throttle);
        assert_eq!(fourth.target.as_deref(), Some("user:alice"));
    }

    #[tokio::test]
    async fn day_rollover_resets_the_local_tally() {
        let ctx = ctx(
            r#"{"modules":{"cost-protection":{"config":{"cost-per-request":1.0,"daily-limit":2.0}}}}"#,
        );
        let module = CostProtection::new();
        let ev = event("POST", "/api/chat");

        module.analyze_request(&ev, &ctx).await.unwrap();
        module.analyze_request(&ev, &ctx).await.unwrap();

        // pretend those requests happened yesterday
        {
            let mut tally = module.daily.lock();
            tally.day = tally.day.pred_opt().unwrap();
        }
        let verdict = module.analyze_request(&ev, &ctx).await.unwrap();
        assert!(!verdict.is_threat());
        assert_eq!(module.daily.lock().count, 1);
    }
}
