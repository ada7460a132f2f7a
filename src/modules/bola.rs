//! Broken Object Level Authorization (IDOR) detection.
//!
//! Watches authenticated access to `/api/<resource>/<id>` shaped paths and flags users
//! who sweep across many distinct ids or walk ids sequentially. Distinct-id counting is
//! strict: the per-id counter's first increment within the tracking window is the only
//! event that advances the user's total, so hammering one id never looks like
//! enumeration. Sequential state lives in the KV map because a broken run must reset
//! the count, which windowed counters cannot express.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::warn;

use crate::{
    context::ModuleContext,
    events::RequestEvent,
    module::SecurityModule,
    verdict::{ThreatLevel, ThreatVerdict},
};

const ID: &str = "bola-detection";

/// Tracking window for id-access state.
const TRACK_WINDOW: Duration = Duration::from_secs(600);
const BLOCK_SECONDS: u64 = 1800;
const REPEAT_BLOCK_SECONDS: u64 = 3600;
/// Distinct-id count that flags a user inside one analysis batch.
const BATCH_DISTINCT_LIMIT: usize = 10;

static NUMERIC_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/api/(\w+)/(\d+)$").expect("static pattern"));
static UUID_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^/api/(\w+)/([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})$",
    )
    .expect("static pattern")
});

fn extract_resource_id(path: &str) -> Option<&str> {
    NUMERIC_PATH
        .captures(path)
        .or_else(|| UUID_PATH.captures(path))
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
}

/// Flags users enumerating object identifiers they should not own.
///
/// # Examples
///
/// ```rust
/// use sentinai::config::SentinConfig;
/// use sentinai::modules::BolaDetection;
///
/// let config: SentinConfig = serde_json::from_str(
///     r#"{"modules":{"bola-detection":{"config":{
///         "unique-id-threshold": 25,
///         "sequential-threshold": 8
///     }}}}"#,
/// ).unwrap();
/// let module = BolaDetection::new();
/// ```
#[derive(Default)]
pub struct BolaDetection;

impl BolaDetection {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SecurityModule for BolaDetection {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "BOLA Detection"
    }

    fn order(&self) -> i32 {
        300
    }

    async fn analyze_request(
        &self,
        event: &RequestEvent,
        ctx: &ModuleContext,
    ) -> anyhow::Result<ThreatVerdict> {
        let Some(user) = event.user_id.as_deref() else {
            return Ok(ThreatVerdict::safe(ID));
        };
        let Some(resource_id) = extract_resource_id(&event.path) else {
            return Ok(ThreatVerdict::safe(ID));
        };

        let user_key = format!("bola:user:{user}");
        let already = match ctx.store.is_blocked(&user_key).await {
            Ok(blocked) => blocked,
            Err(err) => {
                warn!(error = %err, "bola block lookup failed, treating as not blocked");
                false
            }
        };
        if already {
            return Ok(ThreatVerdict::block(
                ID,
                "User previously flagged for ID enumeration",
                user,
                REPEAT_BLOCK_SECONDS,
            ));
        }

        // Distinct-id tally: only a first visit within the window advances the total.
        let id_key = format!("bola:user:{user}:ids:{resource_id}");
        let total_key = format!("bola:user:{user}:ids:total");
        let first_visit = ctx.store.increment_counter(&id_key, TRACK_WINDOW).await? == 1;
        let total = if first_visit {
            ctx.store.increment_counter(&total_key, TRACK_WINDOW).await?
        } else {
            ctx.store.get_counter(&total_key).await?
        };

        let unique_limit = ctx.config.module_u64(ID, "unique-id-threshold", 15);
        if total > unique_limit {
            ctx.store
                .block(
                    &user_key,
                    "excessive unique resource ids",
                    Some(Duration::from_secs(BLOCK_SECONDS)),
                )
                .await?;
            return Ok(ThreatVerdict::block(
                ID,
                format!("Accessed {total} distinct resource ids within tracking window"),
                user,
                BLOCK_SECONDS,
            ));
        }

        if let Ok(id_num) = resource_id.parse::<i64>() {
            let last_key = format!("bola:seq:{user}:last");
            let count_key = format!("bola:seq:{user}:count");

            let last = ctx
                .store
                .get(&last_key)
                .await?
                .and_then(|v| v.parse::<i64>().ok());
            let run = match last {
                Some(last) if (id_num - last).abs() == 1 => {
                    let run = ctx
                        .store
                        .get(&count_key)
                        .await?
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(0)
                        + 1;
                    ctx.store
                        .put(&count_key, &run.to_string(), Some(TRACK_WINDOW))
                        .await?;
                    run
                }
                _ => {
                    ctx.store.put(&count_key, "0", Some(TRACK_WINDOW)).await?;
                    0
                }
            };
            ctx.store
                .put(&last_key, &id_num.to_string(), Some(TRACK_WINDOW))
                .await?;

            let seq_limit = ctx.config.module_u64(ID, "sequential-threshold", 5);
            if run >= seq_limit {
                ctx.store
                    .block(
                        &user_key,
                        "sequential id enumeration",
                        Some(Duration::from_secs(BLOCK_SECONDS)),
                    )
                    .await?;
                return Ok(ThreatVerdict::block(
                    ID,
                    format!("Sequential ID enumeration detected ({run} consecutive ids)"),
                    user,
                    BLOCK_SECONDS,
                ));
            }
        }

        Ok(ThreatVerdict::safe(ID))
    }

    async fn analyze_batch(
        &self,
        events: &[RequestEvent],
        _ctx: &ModuleContext,
    ) -> anyhow::Result<Vec<ThreatVerdict>> {
        let mut per_user: HashMap<&str, HashSet<&str>> = HashMap::new();
        for event in events {
            let (Some(user), Some(id)) =
                (event.user_id.as_deref(), extract_resource_id(&event.path))
            else {
                continue;
            };
            per_user.entry(user).or_default().insert(id);
        }

        Ok(per_user
            .into_iter()
            .filter(|(_, ids)| ids.len() > BATCH_DISTINCT_LIMIT)
            .map(|(user, ids)| {
                ThreatVerdict::log(
                    ID,
                    ThreatLevel::Medium,
                    format!("Accessed {} distinct resource ids in one batch", ids.len()),
                    Some(user.to_string()),
                )
            })
            .collect())
    }
}
