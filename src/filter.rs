//! Filter adapter: wraps one request/response round-trip around the engine.
//!
//! The filter is the only piece of the crate the host sees. Per round-trip it buffers
//! the request body so modules and the downstream handler can both read it, resolves
//! identity and source address, builds the [`RequestEvent`], enforces the engine's
//! verdict (403/429 with a structured JSON body), threads JSON response bodies through
//! the response pipeline, and submits the completed event for asynchronous batch
//! analysis. Every analysis step sits inside a failure boundary: a fault in this crate
//! degrades to pass-through, never to a failed user request.
//!
//! [`FilterBuilder`] is the composition root: it selects the store backend, wires the
//! AI analyzer, and registers the bundled modules plus any host-supplied ones.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use bytes::Bytes;
use http::{StatusCode, header};
use http_body_util::BodyExt;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    ai::{AiAnalyzer, ChatCompletion},
    body::SentinBody,
    config::SentinConfig,
    context::ModuleContext,
    engine::SecurityEngine,
    events::{RequestEvent, ResponseEvent, browser_fingerprint},
    middleware::{IntoMiddleware, Next},
    module::{ModuleRegistry, SecurityModule},
    modules::{BolaDetection, CostProtection, CredentialGuard, DataLeakPrevention, QueryShield},
    store::{DecisionStore, MemoryStore},
    types::{Principal, Request, Response},
    verdict::{ThreatAction, ThreatVerdict},
};

/// Composition root for the security filter.
///
/// # Examples
///
/// ```rust,no_run
/// use sentinai::{config::SentinConfig, filter::SecurityFilter};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config: SentinConfig = serde_json::from_str(
///     r#"{"mode":"ACTIVE","exclude-paths":["/health"]}"#,
/// )?;
/// let filter = SecurityFilter::builder(config).build().await?;
/// # Ok(())
/// # }
/// ```
pub struct FilterBuilder {
    config: SentinConfig,
    store: Option<Arc<dyn DecisionStore>>,
    chat: Option<Arc<dyn ChatCompletion>>,
    extra_modules: Vec<Arc<dyn SecurityModule>>,
}

impl FilterBuilder {
    pub fn new(config: SentinConfig) -> Self {
        Self {
            config,
            store: None,
            chat: None,
            extra_modules: Vec::new(),
        }
    }

    /// Overrides the store backend chosen from configuration.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use sentinai::{config::SentinConfig, filter::SecurityFilter, store::MemoryStore};
    /// # async fn example() -> anyhow::Result<()> {
    /// let shared = Arc::new(MemoryStore::new());
    /// let filter = SecurityFilter::builder(SentinConfig::default())
    ///     .store(shared.clone())
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn store(mut self, store: Arc<dyn DecisionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the chat completion client used by the AI analyzer.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use sentinai::ai::ChatCompletion;
    /// # use sentinai::{config::SentinConfig, filter::SecurityFilter};
    /// # async fn example(in_house_llm: Arc<dyn ChatCompletion>) -> anyhow::Result<()> {
    /// let filter = SecurityFilter::builder(SentinConfig::default())
    ///     .chat_client(in_house_llm)
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn chat_client(mut self, chat: Arc<dyn ChatCompletion>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Registers an additional detection module alongside the bundled set.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use sentinai::module::SecurityModule;
    /// # use sentinai::{config::SentinConfig, filter::SecurityFilter};
    /// # async fn example(custom: Arc<dyn SecurityModule>) -> anyhow::Result<()> {
    /// let filter = SecurityFilter::builder(SentinConfig::default())
    ///     .module(custom)
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn module(mut self, module: Arc<dyn SecurityModule>) -> Self {
        self.extra_modules.push(module);
        self
    }

    /// Assembles store, analyzer, registry, and engine into a mountable filter.
    pub async fn build(self) -> anyhow::Result<SecurityFilter> {
        let config = Arc::new(self.config);

        let store: Arc<dyn DecisionStore> = match self.store {
            Some(store) => store,
            None => match config.store.r#type.as_str() {
                "in-memory" => Arc::new(MemoryStore::new()),
                #[cfg(feature = "distributed")]
                "distributed" => {
                    let url = config.store.distributed_url.as_deref().ok_or_else(|| {
                        anyhow::anyhow!("store.distributed-url is required for the distributed store")
                    })?;
                    Arc::new(crate::store::RedisStore::connect(url).await?)
                }
                #[cfg(not(feature = "distributed"))]
                "distributed" => anyhow::bail!(
                    "store.type = distributed requires the `distributed` cargo feature"
                ),
                other => anyhow::bail!("unknown store type `{other}`"),
            },
        };

        let ai = match self.chat {
            Some(chat) => AiAnalyzer::with_client(chat),
            None => AiAnalyzer::from_config(&config.ai),
        };

        let ctx = ModuleContext::new(store, ai, config.clone());

        let mut modules: Vec<Arc<dyn SecurityModule>> = vec![
            Arc::new(CredentialGuard::new()),
            Arc::new(QueryShield::new()),
            Arc::new(BolaDetection::new()),
            Arc::new(DataLeakPrevention::new()),
            Arc::new(CostProtection::new()),
        ];
        modules.extend(self.extra_modules);

        let engine = SecurityEngine::new(ModuleRegistry::new(modules), ctx);
        Ok(SecurityFilter { engine, config })
    }
}

/// The mountable middleware wrapping the whole detection pipeline.
///
/// # Examples
///
/// ```rust,no_run
/// use sentinai::{config::SentinConfig, filter::SecurityFilter, middleware::IntoMiddleware};
///
/// # async fn example() -> anyhow::Result<()> {
/// let filter = SecurityFilter::builder(SentinConfig::default()).build().await?;
/// let middleware = filter.into_middleware();
/// // hand `middleware` to the host's chain; every request now flows
/// // through the detection pipeline
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SecurityFilter {
    engine: Arc<SecurityEngine>,
    config: Arc<SentinConfig>,
}

impl SecurityFilter {
    pub fn builder(config: SentinConfig) -> FilterBuilder {
        FilterBuilder::new(config)
    }

    /// The engine, for hosts that drive parts of the pipeline directly.
    pub fn engine(&self) -> &Arc<SecurityEngine> {
        &self.engine
    }

    /// Processes one round-trip: analyze, enforce, invoke downstream, rewrite, submit.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::{filter::SecurityFilter, middleware::Next, types::{Request, Response}};
    /// # async fn example(filter: SecurityFilter, req: Request, next: Next) -> Response {
    /// // hosts that manage their own chain can call the filter directly
    /// filter.handle(req, next).await
    /// # }
    /// ```
    pub async fn handle(&self, req: Request, next: Next) -> Response {
        if !self.config.enabled {
            return next.run(req).await;
        }

        let started = Instant::now();
        let (parts, body) = req.into_parts();
        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                error!(error = %err, "failed to buffer request body, continuing with empty body");
                Bytes::new()
            }
        };

        let request_id = short_request_id();
        let event = build_event(&parts, &body_bytes, &request_id);

        let verdict = self.engine.process_request(&event).await;
        if event_denied(&verdict, &self.config) {
            return denial_response(&verdict, &request_id);
        }

        let req = Request::from_parts(parts, SentinBody::from(body_bytes));
        let mut response = next.run(req).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let status = response.status().as_u16();

        response = self
            .rewrite_response(response, &event, elapsed_ms)
            .await;

        self.engine
            .submit_for_async_analysis(event.with_response_data(status, elapsed_ms));

        response
    }

    /// Runs JSON response bodies through the response pipeline, replacing the body
    /// when a module rewrote it. Non-JSON and empty bodies pass through untouched.
    async fn rewrite_response(
        &self,
        response: Response,
        event: &RequestEvent,
        elapsed_ms: u64,
    ) -> Response {
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let (mut parts, body) = response.into_parts();
        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                error!(error = %err, "failed to buffer response body");
                return Response::from_parts(parts, SentinBody::empty());
            }
        };

        if body_bytes.is_empty() || !content_type.to_ascii_lowercase().contains("json") {
            return Response::from_parts(parts, SentinBody::from(body_bytes));
        }

        let original = String::from_utf8_lossy(&body_bytes).into_owned();
        let response_event = ResponseEvent {
            request_id: event.request_id.clone(),
            path: event.path.clone(),
            status: parts.status.as_u16(),
            content_type,
            body: original.clone(),
            response_time_ms: elapsed_ms,
        };

        let processed = self.engine.process_response(response_event).await;
        if processed.body == original {
            return Response::from_parts(parts, SentinBody::from(body_bytes));
        }

        debug!(request_id = %event.request_id, "response body rewritten by pipeline");
        parts.headers.remove(header::CONTENT_LENGTH);
        Response::from_parts(parts, SentinBody::from(processed.body))
    }
}

impl IntoMiddleware for SecurityFilter {
    fn into_middleware(
        self,
    ) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>>
    + Clone
    + Send
    + Sync
    + 'static {
        move |req: Request, next: Next| {
            let filter = self.clone();
            Box::pin(async move { filter.handle(req, next).await })
        }
    }
}

fn short_request_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn event_denied(verdict: &ThreatVerdict, config: &SentinConfig) -> bool {
    verdict.is_threat()
        && config.is_active()
        && matches!(
            verdict.action,
            ThreatAction::Block | ThreatAction::Throttle | ThreatAction::Challenge
        )
}

fn denial_response(verdict: &ThreatVerdict, request_id: &str) -> Response {
    let status = match verdict.action {
        ThreatAction::Throttle => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::FORBIDDEN,
    };
    let body = serde_json::json!({
        "error": "Request blocked by SentinAI",
        "reason": verdict.reason,
        "requestId": request_id,
    });
    http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(SentinBody::from(body.to_string()))
        .unwrap_or_else(|_| {
            let mut resp = Response::new(SentinBody::empty());
            *resp.status_mut() = status;
            resp
        })
}

/// Decoded username from a Basic `Authorization` value; the password is discarded.
fn basic_username(authorization: &str) -> Option<String> {
    let b64 = authorization.strip_prefix("Basic ")?;
    let raw = base64::engine::general_purpose::STANDARD.decode(b64).ok()?;
    let creds = String::from_utf8(raw).ok()?;
    creds.split_once(':').map(|(user, _)| user.to_owned())
}

/// Source address preference: `X-Forwarded-For` (first hop), `X-Real-IP`, remote.
fn resolve_source_ip(parts: &http::request::Parts) -> String {
    if let Some(forwarded) = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next().map(str::trim) {
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = parts.headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    parts
        .extensions
        .get::<SocketAddr>()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn build_event(parts: &http::request::Parts, body: &Bytes, request_id: &str) -> RequestEvent {
    let mut headers = HashMap::new();
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }

    let user_id = parts
        .extensions
        .get::<Principal>()
        .map(|p| p.0.clone())
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| basic_username(v))
        });

    let user_agent = headers.get("user-agent").cloned().unwrap_or_default();
    let fingerprint = (!user_agent.is_empty()).then(|| {
        browser_fingerprint(
            &user_agent,
            headers.get("accept-language").map(String::as_str).unwrap_or(""),
            headers.get("accept").map(String::as_str).unwrap_or(""),
        )
    });

    RequestEvent {
        request_id: request_id.to_string(),
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().unwrap_or("").to_string(),
        body: (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned()),
        source_ip: resolve_source_ip(parts),
        session_id: headers.get("x-session-id").cloned(),
        headers,
        user_agent,
        user_id,
        fingerprint,
        timestamp: chrono::Utc::now(),
        response_status: 0,
        response_time_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::ThreatVerdict;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn downstream_json(body: &'static str, hit: Arc<AtomicBool>) -> Next {
        Next {
            middlewares: Arc::new(Vec::new()),
            endpoint: Arc::new(move |_req: Request| {
                let hit = hit.clone();
                Box::pin(async move {
                    hit.store(true, Ordering::SeqCst);
                    http::Response::builder()
                        .status(StatusCode::OK)
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(SentinBody::from(body))
                        .unwrap()
                })
            }),
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    async fn filter(json: &str) -> SecurityFilter {
        SecurityFilter::builder(serde_json::from_str(json).unwrap())
            .build()
            .await
            .unwrap()
    }

    struct Capture {
        seen: Arc<Mutex<Vec<RequestEvent>>>,
    }

    #[async_trait]
    impl SecurityModule for Capture {
        fn id(&self) -> &'static str {
            "capture"
        }
        fn name(&self) -> &'static str {
            "Capture"
        }
        fn order(&self) -> i32 {
            1
        }
        async fn analyze_request(
            &self,
            event: &RequestEvent,
            _ctx: &ModuleContext,
        ) -> anyhow::Result<ThreatVerdict> {
            self.seen.lock().push(event.clone());
            Ok(ThreatVerdict::safe("capture"))
        }
    }

    #[test]
    fn basic_username_keeps_user_drops_password() {
        // alice:s3cret
        assert_eq!(
            basic_username("Basic YWxpY2U6czNjcmV0").as_deref(),
            Some("alice"),
        );
        assert_eq!(basic_username("Bearer abc"), None);
        assert_eq!(basic_username("Basic not-base64!"), None);
    }

    #[test]
    fn request_ids_are_eight_chars() {
        let id = short_request_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn dangerous_query_is_denied_with_structured_body() {
        let filter = filter(r#"{"mode":"ACTIVE"}"#).await;
        let hit = Arc::new(AtomicBool::new(false));

        let req = http::Request::builder()
            .method("GET")
            .uri("/api/search?q=%27%20OR%20%271%27%3D%271")
            .body(SentinBody::empty())
            .unwrap();
        let response = filter
            .handle(req, downstream_json("{}", hit.clone()))
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!hit.load(Ordering::SeqCst), "downstream must not run");

        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "Request blocked by SentinAI");
        assert!(body["reason"].as_str().unwrap().contains("Dangerous query pattern"));
        assert_eq!(body["requestId"].as_str().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn monitor_mode_never_denies() {
        let filter = filter(r#"{}"#).await;
        let hit = Arc::new(AtomicBool::new(false));

        let req = http::Request::builder()
            .method("GET")
            .uri("/api/search?q=%27%20OR%20%271%27%3D%271")
            .body(SentinBody::empty())
            .unwrap();
        let response = filter.handle(req, downstream_json("{}", hit.clone())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(hit.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn blacklisted_ip_is_denied_only_in_active_mode() {
        use crate::store::{DecisionStore, MemoryStore};

        for (config, denied) in [(r#"{"mode":"ACTIVE"}"#, true), (r#"{}"#, false)] {
            let store = Arc::new(MemoryStore::new());
            store.block("203.0.113.50", "earlier abuse", None).await.unwrap();
            let filter = SecurityFilter::builder(serde_json::from_str(config).unwrap())
                .store(store)
                .build()
                .await
                .unwrap();

            let hit = Arc::new(AtomicBool::new(false));
            let req = http::Request::builder()
                .uri("/api/users")
                .header("X-Forwarded-For", "203.0.113.50")
                .body(SentinBody::empty())
                .unwrap();
            let response = filter.handle(req, downstream_json("{}", hit.clone())).await;

            if denied {
                assert_eq!(response.status(), StatusCode::FORBIDDEN);
                assert!(!hit.load(Ordering::SeqCst));
            } else {
                assert_eq!(response.status(), StatusCode::OK);
                assert!(hit.load(Ordering::SeqCst), "monitor mode must not deny");
            }
        }
    }

    #[tokio::test]
    async fn disabled_filter_passes_straight_through() {
        let filter = filter(r#"{"enabled":false,"mode":"ACTIVE"}"#).await;
        let hit = Arc::new(AtomicBool::new(false));
        let req = http::Request::builder()
            .uri("/api/search?q=%27%20OR%20%271%27%3D%271")
            .body(SentinBody::empty())
            .unwrap();
        let response = filter.handle(req, downstream_json("{}", hit.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(hit.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn identity_and_source_ip_resolution() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let filter = SecurityFilter::builder(serde_json::from_str(r#"{}"#).unwrap())
            .module(Arc::new(Capture { seen: seen.clone() }))
            .build()
            .await
            .unwrap();

        let req = http::Request::builder()
            .uri("/api/orders/5")
            .header("Authorization", "Basic YWxpY2U6czNjcmV0")
            .header("X-Forwarded-For", "198.51.100.7, 10.0.0.1")
            .header("User-Agent", "browser/1.0")
            .body(SentinBody::empty())
            .unwrap();
        filter
            .handle(req, downstream_json("{}", Arc::new(AtomicBool::new(false))))
            .await;

        let events = seen.lock();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.user_id.as_deref(), Some("alice"));
        assert_eq!(event.source_ip, "198.51.100.7");
        assert!(event.fingerprint.is_some());
    }

    #[tokio::test]
    async fn principal_extension_beats_credential_parsing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let filter = SecurityFilter::builder(serde_json::from_str(r#"{}"#).unwrap())
            .module(Arc::new(Capture { seen: seen.clone() }))
            .build()
            .await
            .unwrap();

        let mut req = http::Request::builder()
            .uri("/api/orders/5")
            .header("Authorization", "Basic YWxpY2U6czNjcmV0")
            .body(SentinBody::empty())
            .unwrap();
        req.extensions_mut().insert(Principal("bob".to_string()));
        filter
            .handle(req, downstream_json("{}", Arc::new(AtomicBool::new(false))))
            .await;

        assert_eq!(seen.lock()[0].user_id.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn downstream_still_reads_the_buffered_body() {
        let filter = filter(r#"{"mode":"ACTIVE"}"#).await;
        let echoed = Arc::new(Mutex::new(String::new()));
        let echoed_in = echoed.clone();

        let next = Next {
            middlewares: Arc::new(Vec::new()),
            endpoint: Arc::new(move |req: Request| {
                let echoed = echoed_in.clone();
                Box::pin(async move {
                    let bytes = req.into_body().collect().await.unwrap().to_bytes();
                    *echoed.lock() = String::from_utf8_lossy(&bytes).into_owned();
                    Response::new(SentinBody::empty())
                })
            }),
        };

        let req = http::Request::builder()
            .method("POST")
            .uri("/api/items")
            .body(SentinBody::from(r#"{"name":"widget"}"#))
            .unwrap();
        filter.handle(req, next).await;
        assert_eq!(&*echoed.lock(), r#"{"name":"widget"}"#);
    }

    #[tokio::test]
    async fn json_response_is_redacted_end_to_end() {
        let filter = filter(
            r#"{"mode":"ACTIVE","modules":{"data-leak-prevention":{"config":{"mode":"REDACT"}}}}"#,
        )
        .await;

        let req = http::Request::builder()
            .uri("/api/users/5")
            .body(SentinBody::empty())
            .unwrap();
        let response = filter
            .handle(
                req,
                downstream_json(
                    r#"{"name":"Jo","ssn":"123-45-6789"}"#,
                    Arc::new(AtomicBool::new(false)),
                ),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert_eq!(body, r#"{"name":"Jo","ssn":"[REDACTED BY SENTINAI]"}"#);
    }

    #[tokio::test]
    async fn non_json_response_is_untouched() {
        let filter = filter(
            r#"{"mode":"ACTIVE","modules":{"data-leak-prevention":{"config":{"mode":"REDACT"}}}}"#,
        )
        .await;

        let next = Next {
            middlewares: Arc::new(Vec::new()),
            endpoint: Arc::new(|_req: Request| {
                Box::pin(async {
                    http::Response::builder()
                        .header(header::CONTENT_TYPE, "text/plain")
                        .body(SentinBody::from("ssn: 123-45-6789"))
                        .unwrap()
                })
            }),
        };
        let req = http::Request::builder()
            .uri("/api/export")
            .body(SentinBody::empty())
            .unwrap();
        let response = filter.handle(req, next).await;
        assert_eq!(body_text(response).await, "ssn: 123-45-6789");
    }

    #[tokio::test]
    async fn sequential_enumeration_denied_on_the_wire() {
        let filter = filter(r#"{"mode":"ACTIVE"}"#).await;

        for id in 100..105 {
            let req = http::Request::builder()
                .uri(format!("/api/orders/{id}"))
                .header("Authorization", "Basic YWxpY2U6czNjcmV0")
                .body(SentinBody::empty())
                .unwrap();
            let response = filter
                .handle(req, downstream_json("{}", Arc::new(AtomicBool::new(false))))
                .await;
            assert_eq!(response.status(), StatusCode::OK, "id {id} should pass");
        }

        let req = http::Request::builder()
            .uri("/api/orders/105")
            .header("Authorization", "Basic YWxpY2U6czNjcmV0")
            .body(SentinBody::empty())
            .unwrap();
        let response = filter
            .handle(req, downstream_json("{}", Arc::new(AtomicBool::new(false))))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["reason"].as_str().unwrap().contains("Sequential ID enumeration"));
    }
}
