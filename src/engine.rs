//! Fan-out of events through the module pipeline, plus the async batch domain.
//!
//! The engine owns the two execution domains. The synchronous path — blocklist
//! pre-checks, exclusion gate, ordered module fan-out — runs on the request-serving
//! task and must stay fast: store lookups are the only blocking work modules may do
//! there. The asynchronous domain is a bounded channel drained by a small fixed pool of
//! workers that run each module's batch analyzer (which may sit on AI calls for
//! seconds). Overflow is dropped with a warning; losing a batch of telemetry is always
//! preferable to backpressuring live requests.
//!
//! A failing module never fails a request: every module call sits inside a failure
//! boundary that logs the error and moves on.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    context::ModuleContext,
    events::{RequestEvent, ResponseEvent},
    module::ModuleRegistry,
    verdict::{ThreatAction, ThreatVerdict},
};

const ENGINE_ID: &str = "engine";

/// Buffered events per drained batch.
const BATCH_SIZE: usize = 20;
/// Pending batches the async domain will hold before dropping.
const BATCH_QUEUE: usize = 100;
/// Workers draining the batch queue.
const BATCH_WORKERS: usize = 2;

/// Drives events through the registry and schedules batch analysis.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sentinai::ai::AiAnalyzer;
/// use sentinai::config::SentinConfig;
/// use sentinai::context::ModuleContext;
/// use sentinai::engine::SecurityEngine;
/// use sentinai::module::{ModuleRegistry, SecurityModule};
/// use sentinai::modules::QueryShield;
/// use sentinai::store::MemoryStore;
///
/// # async fn example() {
/// let ctx = ModuleContext::new(
///     Arc::new(MemoryStore::new()),
///     AiAnalyzer::disabled(),
///     Arc::new(SentinConfig::default()),
/// );
/// let registry = ModuleRegistry::new(vec![
///     Arc::new(QueryShield::new()) as Arc<dyn SecurityModule>,
/// ]);
/// let engine = SecurityEngine::new(registry, ctx);
/// # }
/// ```
pub struct SecurityEngine {
    ctx: ModuleContext,
    registry: Arc<ModuleRegistry>,
    buffer: Mutex<Vec<RequestEvent>>,
    batch_tx: mpsc::Sender<Vec<RequestEvent>>,
}

impl SecurityEngine {
    /// Builds the engine and spawns the batch worker pool on the current runtime.
    pub fn new(registry: ModuleRegistry, ctx: ModuleContext) -> Arc<Self> {
        let registry = Arc::new(registry);
        let (batch_tx, batch_rx) = mpsc::channel::<Vec<RequestEvent>>(BATCH_QUEUE);

        let batch_rx = Arc::new(tokio::sync::Mutex::new(batch_rx));
        for _ in 0..BATCH_WORKERS {
            let rx = batch_rx.clone();
            let registry = registry.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                loop {
                    let batch = { rx.lock().await.recv().await };
                    match batch {
                        Some(batch) => run_batch(&registry, &ctx, batch).await,
                        None => break,
                    }
                }
            });
        }

        Arc::new(Self {
            ctx,
            registry,
            buffer: Mutex::new(Vec::new()),
            batch_tx,
        })
    }

    /// Synchronous per-request analysis; returns the first enforced verdict, or Safe.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::{engine::SecurityEngine, events::RequestEvent};
    /// # async fn example(engine: &SecurityEngine, event: &RequestEvent) {
    /// let verdict = engine.process_request(event).await;
    /// if verdict.should_block() {
    ///     println!("denying {}: {}", event.request_id, verdict.reason);
    /// }
    /// # }
    /// ```
    pub async fn process_request(&self, event: &RequestEvent) -> ThreatVerdict {
        let config = &self.ctx.config;
        if !config.enabled {
            return ThreatVerdict::safe(ENGINE_ID);
        }
        if config.is_path_excluded(&event.path) {
            return ThreatVerdict::safe(ENGINE_ID);
        }

        if self.blocked(&event.source_ip).await {
            if config.is_active() {
                info!(
                    source_ip = %event.source_ip,
                    request_id = %event.request_id,
                    "threat enforced: IP is blacklisted",
                );
            } else {
                warn!(
                    source_ip = %event.source_ip,
                    request_id = %event.request_id,
                    "monitor mode: would have blocked blacklisted IP",
                );
            }
            return ThreatVerdict::block(
                ENGINE_ID,
                "IP is blacklisted",
                event.source_ip.clone(),
                0,
            );
        }
        if let Some(user) = event.user_id.as_deref() {
            // modules emit bare targets while operators write `user:` keys; honor both
            if self.blocked(&format!("user:{user}")).await || self.blocked(user).await {
                if config.is_active() {
                    info!(
                        user,
                        request_id = %event.request_id,
                        "threat enforced: user is blocked",
                    );
                } else {
                    warn!(
                        user,
                        request_id = %event.request_id,
                        "monitor mode: would have blocked user",
                    );
                }
                return ThreatVerdict::block(ENGINE_ID, "User is blocked", user, 0);
            }
        }

        for module in self.registry.enabled(&self.ctx) {
            let verdict = match module.analyze_request(event, &self.ctx).await {
                Ok(verdict) => verdict,
                Err(err) => {
                    error!(module = module.id(), error = %err, "module failed, continuing");
                    continue;
                }
            };
            if !verdict.is_threat() {
                continue;
            }

            if !config.is_active() {
                warn!(
                    module = module.id(),
                    reason = %verdict.reason,
                    target = verdict.target.as_deref().unwrap_or("-"),
                    request_id = %event.request_id,
                    "monitor mode: would have acted on threat",
                );
                continue;
            }

            match verdict.action {
                ThreatAction::Block | ThreatAction::Throttle | ThreatAction::Challenge => {
                    if verdict.should_block() {
                        if let Some(target) = &verdict.target {
                            self.write_block(target, &verdict).await;
                        }
                    }
                    info!(
                        module = module.id(),
                        action = ?verdict.action,
                        reason = %verdict.reason,
                        request_id = %event.request_id,
                        "threat enforced",
                    );
                    return verdict;
                }
                ThreatAction::Log | ThreatAction::Allow => {
                    info!(
                        module = module.id(),
                        reason = %verdict.reason,
                        request_id = %event.request_id,
                        "threat logged",
                    );
                }
            }
        }

        self.buffer_event(event.clone());
        ThreatVerdict::safe(ENGINE_ID)
    }

    /// Threads the response through every enabled module in priority order.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::{engine::SecurityEngine, events::ResponseEvent};
    /// # async fn example(engine: &SecurityEngine, response: ResponseEvent) {
    /// let original = response.body.clone();
    /// let processed = engine.process_response(response).await;
    /// if processed.body != original {
    ///     // a module redacted or replaced the body
    /// }
    /// # }
    /// ```
    pub async fn process_response(&self, response: ResponseEvent) -> ResponseEvent {
        if !self.ctx.config.enabled {
            return response;
        }
        let mut current = response;
        for module in self.registry.enabled(&self.ctx) {
            match module.analyze_response(current.clone(), &self.ctx).await {
                Ok(next) => current = next,
                Err(err) => {
                    error!(module = module.id(), error = %err, "response analysis failed, continuing");
                }
            }
        }
        current
    }

    /// Queues an event (carrying response metadata) for batch analysis.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::{engine::SecurityEngine, events::RequestEvent};
    /// # fn example(engine: &SecurityEngine, event: &RequestEvent) {
    /// engine.submit_for_async_analysis(event.with_response_data(200, 42));
    /// # }
    /// ```
    pub fn submit_for_async_analysis(&self, event: RequestEvent) {
        self.buffer_event(event);
    }

    /// Drains whatever is buffered right now into the async domain.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::engine::SecurityEngine;
    /// # fn example(engine: &SecurityEngine) {
    /// // e.g. on shutdown, push any partial batch to the workers
    /// engine.flush_event_buffer();
    /// # }
    /// ```
    pub fn flush_event_buffer(&self) {
        let batch = std::mem::take(&mut *self.buffer.lock());
        if !batch.is_empty() {
            self.dispatch(batch);
        }
    }

    async fn blocked(&self, key: &str) -> bool {
        match self.ctx.store.is_blocked(key).await {
            Ok(blocked) => blocked,
            Err(err) => {
                warn!(key, error = %err, "blocklist lookup failed, treating as not blocked");
                false
            }
        }
    }

    async fn write_block(&self, target: &str, verdict: &ThreatVerdict) {
        let duration = (verdict.block_seconds > 0)
            .then(|| Duration::from_secs(verdict.block_seconds));
        if let Err(err) = self.ctx.store.block(target, &verdict.reason, duration).await {
            warn!(target, error = %err, "failed to persist block");
        }
    }

    fn buffer_event(&self, event: RequestEvent) {
        let drained = {
            let mut buffer = self.buffer.lock();
            buffer.push(event);
            if buffer.len() >= BATCH_SIZE {
                Some(std::mem::take(&mut *buffer))
            } else {
                None
            }
        };
        if let Some(batch) = drained {
            self.dispatch(batch);
        }
    }

    fn dispatch(&self, batch: Vec<RequestEvent>) {
        let size = batch.len();
        if self.batch_tx.try_send(batch).is_err() {
            warn!(size, "batch queue full, dropping batch");
        } else {
            debug!(size, "batch submitted for async analysis");
        }
    }
}

async fn run_batch(registry: &ModuleRegistry, ctx: &ModuleContext, batch: Vec<RequestEvent>) {
    for module in registry.enabled(ctx) {
        let verdicts = match module.analyze_batch(&batch, ctx).await {
            Ok(verdicts) => verdicts,
            Err(err) => {
                error!(module = module.id(), error = %err, "batch analysis failed, continuing");
                continue;
            }
        };
        for verdict in verdicts {
            if verdict.should_block() {
                warn!(
                    module = module.id(),
                    reason = %verdict.reason,
                    target = verdict.target.as_deref().unwrap_or("-"),
                    "batch analysis block verdict",
                );
                if ctx.config.is_active() {
                    if let Some(target) = &verdict.target {
                        let duration = (verdict.block_seconds > 0)
                            .then(|| Duration::from_secs(verdict.block_seconds));
                        if let Err(err) =
                            ctx.store.block(target, &verdict.reason, duration).await
                        {
                            warn!(target, error = %err, "failed to persist batch block");
                        }
                    }
                }
            } else if verdict.is_threat() {
                info!(
                    module = module.id(),
                    reason = %verdict.reason,
                    "batch analysis threat logged",
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ai::AiAnalyzer,
        config::SentinConfig,
        events::test_support::event,
        module::SecurityModule,
        modules::CredentialGuard,
        store::{DecisionStore, MemoryStore},
        verdict::ThreatLevel,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        id: &'static str,
        order: i32,
        calls: Arc<AtomicUsize>,
        verdict: fn(&RequestEvent) -> anyhow::Result<ThreatVerdict>,
    }

    impl Scripted {
        fn new(
            id: &'static str,
            order: i32,
            verdict: fn(&RequestEvent) -> anyhow::Result<ThreatVerdict>,
        ) -> (Arc<dyn SecurityModule>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    id,
                    order,
                    calls: calls.clone(),
                    verdict,
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl SecurityModule for Scripted {
        fn id(&self) -> &'static str {
            self.id
        }
        fn name(&self) -> &'static str {
            self.id
        }
        fn order(&self) -> i32 {
            self.order
        }
        async fn analyze_request(
            &self,
            event: &RequestEvent,
            _ctx: &ModuleContext,
        ) -> anyhow::Result<ThreatVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.verdict)(event)
        }
    }

    fn ctx_from(json: &str, store: Arc<MemoryStore>) -> ModuleContext {
        ModuleContext::new(
            store,
            AiAnalyzer::disabled(),
            Arc::new(serde_json::from_str::<SentinConfig>(json).unwrap()),
        )
    }

    fn engine_with(
        json: &str,
        modules: Vec<Arc<dyn SecurityModule>>,
    ) -> (Arc<SecurityEngine>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ctx = ctx_from(json, store.clone());
        (SecurityEngine::new(ModuleRegistry::new(modules), ctx), store)
    }

    fn safe_verdict(_: &RequestEvent) -> anyhow::Result<ThreatVerdict> {
        Ok(ThreatVerdict::safe("scripted"))
    }

    fn block_verdict(ev: &RequestEvent) -> anyhow::Result<ThreatVerdict> {
        Ok(ThreatVerdict::block("scripted", "bad traffic", ev.source_ip.clone(), 60))
    }

    #[tokio::test]
    async fn disabled_engine_skips_everything() {
        let (module, calls) = Scripted::new("m", 100, block_verdict);
        let (engine, _) = engine_with(r#"{"enabled":false,"mode":"ACTIVE"}"#, vec![module]);

        let verdict = engine.process_request(&event("GET", "/api/x")).await;
        assert!(!verdict.is_threat());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn excluded_path_returns_safe_without_invoking_modules() {
        let (module, calls) = Scripted::new("m", 100, block_verdict);
        let (engine, _) = engine_with(
            r#"{"mode":"ACTIVE","exclude-paths":["/health","/static/**"]}"#,
            vec![module],
        );

        assert!(!engine.process_request(&event("GET", "/health")).await.is_threat());
        assert!(!engine.process_request(&event("GET", "/static/app.js")).await.is_threat());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blacklisted_ip_is_rejected_before_modules() {
        let (module, calls) = Scripted::new("m", 100, safe_verdict);
        let (engine, store) = engine_with(r#"{"mode":"ACTIVE"}"#, vec![module]);
        store.block("203.0.113.9", "earlier abuse", None).await.unwrap();

        let verdict = engine.process_request(&event("GET", "/api/x")).await;
        assert!(verdict.should_block());
        assert_eq!(verdict.module, "engine");
        assert!(verdict.reason.contains("blacklisted"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn monitor_mode_blacklist_precheck_still_reports_the_threat() {
        // in monitor mode the filter discards the verdict, but the pre-check must
        // still walk the would-have-blocked log path instead of returning silently
        let (module, calls) = Scripted::new("m", 100, safe_verdict);
        let (engine, store) = engine_with(r#"{}"#, vec![module]);
        store.block("203.0.113.9", "earlier abuse", None).await.unwrap();

        let verdict = engine.process_request(&event("GET", "/api/x")).await;
        assert!(verdict.should_block());
        assert_eq!(verdict.module, "engine");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut ev = event("GET", "/api/x");
        ev.source_ip = "198.51.100.1".to_string();
        ev.user_id = Some("mallory".to_string());
        store.block("user:mallory", "ops action", None).await.unwrap();
        let verdict = engine.process_request(&ev).await;
        assert!(verdict.should_block());
        assert!(verdict.reason.contains("User is blocked"));
    }

    #[tokio::test]
    async fn user_block_is_honored_under_both_key_shapes() {
        let (engine, store) = engine_with(r#"{"mode":"ACTIVE"}"#, vec![]);

        let mut ev = event("GET", "/api/x");
        ev.user_id = Some("mallory".to_string());

        store.block("user:mallory", "ops action", None).await.unwrap();
        assert!(engine.process_request(&ev).await.should_block());
        store.unblock("user:mallory").await.unwrap();

        store.block("mallory", "module verdict", None).await.unwrap();
        assert!(engine.process_request(&ev).await.should_block());
    }

    #[tokio::test]
    async fn active_mode_blocks_and_persists_before_returning() {
        let (module, _) = Scripted::new("m", 100, block_verdict);
        let (engine, store) = engine_with(r#"{"mode":"ACTIVE"}"#, vec![module]);

        let verdict = engine.process_request(&event("GET", "/api/x")).await;
        assert!(verdict.should_block());
        assert!(store.is_blocked("203.0.113.9").await.unwrap());
    }

    #[tokio::test]
    async fn monitor_mode_runs_every_module_and_enforces_nothing() {
        let (first, first_calls) = Scripted::new("first", 100, block_verdict);
        let (second, second_calls) = Scripted::new("second", 200, safe_verdict);
        let (engine, store) = engine_with(r#"{}"#, vec![first, second]);

        let verdict = engine.process_request(&event("GET", "/api/x")).await;
        assert!(!verdict.is_threat());
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert!(!store.is_blocked("203.0.113.9").await.unwrap());
    }

    #[tokio::test]
    async fn failing_module_is_isolated() {
        fn explode(_: &RequestEvent) -> anyhow::Result<ThreatVerdict> {
            anyhow::bail!("boom")
        }
        let (broken, _) = Scripted::new("broken", 100, explode);
        let (healthy, healthy_calls) = Scripted::new("healthy", 200, safe_verdict);
        let (engine, _) = engine_with(r#"{"mode":"ACTIVE"}"#, vec![broken, healthy]);

        let verdict = engine.process_request(&event("GET", "/api/x")).await;
        assert!(!verdict.is_threat());
        assert_eq!(healthy_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn log_action_threats_do_not_short_circuit() {
        fn log_threat(_: &RequestEvent) -> anyhow::Result<ThreatVerdict> {
            Ok(ThreatVerdict::log("noisy", ThreatLevel::Medium, "odd but tolerable", None))
        }
        let (noisy, _) = Scripted::new("noisy", 100, log_threat);
        let (after, after_calls) = Scripted::new("after", 200, safe_verdict);
        let (engine, _) = engine_with(r#"{"mode":"ACTIVE"}"#, vec![noisy, after]);

        let verdict = engine.process_request(&event("GET", "/api/x")).await;
        assert!(!verdict.is_threat());
        assert_eq!(after_calls.load(Ordering::SeqCst), 1);
    }

    struct BatchRecorder {
        sizes: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl SecurityModule for BatchRecorder {
        fn id(&self) -> &'static str {
            "batch-recorder"
        }
        fn name(&self) -> &'static str {
            "Batch Recorder"
        }
        async fn analyze_request(
            &self,
            _event: &RequestEvent,
            _ctx: &ModuleContext,
        ) -> anyhow::Result<ThreatVerdict> {
            Ok(ThreatVerdict::safe("batch-recorder"))
        }
        async fn analyze_batch(
            &self,
            events: &[RequestEvent],
            _ctx: &ModuleContext,
        ) -> anyhow::Result<Vec<ThreatVerdict>> {
            self.sizes.lock().push(events.len());
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn buffer_drains_at_batch_threshold() {
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let recorder: Arc<dyn SecurityModule> = Arc::new(BatchRecorder { sizes: sizes.clone() });
        let (engine, _) = engine_with(r#"{}"#, vec![recorder]);

        for i in 0..20 {
            engine.submit_for_async_analysis(event("GET", &format!("/api/r/{i}")));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sizes.lock().as_slice(), &[20]);
    }

    #[tokio::test]
    async fn flush_drains_a_partial_buffer() {
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let recorder: Arc<dyn SecurityModule> = Arc::new(BatchRecorder { sizes: sizes.clone() });
        let (engine, _) = engine_with(r#"{}"#, vec![recorder]);

        for _ in 0..3 {
            engine.submit_for_async_analysis(event("GET", "/api/r"));
        }
        engine.flush_event_buffer();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sizes.lock().as_slice(), &[3]);

        // flushing an empty buffer submits nothing
        engine.flush_event_buffer();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sizes.lock().len(), 1);
    }

    #[tokio::test]
    async fn credential_stuffing_batch_blocks_through_the_store() {
        let store = Arc::new(MemoryStore::new());
        let ctx = ctx_from(r#"{"mode":"ACTIVE"}"#, store.clone());
        let engine = SecurityEngine::new(
            ModuleRegistry::new(vec![Arc::new(CredentialGuard::new()) as Arc<dyn SecurityModule>]),
            ctx,
        );

        for _ in 0..12 {
            let mut ev = event("POST", "/login");
            ev.user_id = Some("admin".to_string());
            engine.submit_for_async_analysis(ev.with_response_data(401, 20));
        }
        engine.flush_event_buffer();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(store.is_blocked("admin").await.unwrap());
    }
}
