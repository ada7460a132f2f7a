//! Batch and single-shot traffic analysis over an external chat completion endpoint.
//!
//! The analyzer is deliberately opaque to the rest of the pipeline: modules hand it
//! events and a context string, it hands back verdicts. The LLM dependency is a narrow
//! capability — [`ChatCompletion`] with a single `complete(prompt)` method — wired at
//! composition time, so the bundled OpenAI-shape client can be swapped for anything
//! that turns a prompt into text.
//!
//! The analyzer never errors into its caller: transport failures, timeouts, and
//! unparseable replies all collapse to an empty verdict list (or a Safe verdict for the
//! single-shot form) with a warn log. It must only ever be invoked from the async batch
//! domain; request-path module code must not call it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    config::AiConfig,
    events::RequestEvent,
    verdict::{ThreatAction, ThreatLevel, ThreatVerdict},
};

const MODULE_ID: &str = "ai-analyzer";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const BLOCK_SECONDS: u64 = 1800;

/// Narrow capability over an external chat completion endpoint.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use sentinai::ai::ChatCompletion;
///
/// struct EchoChat;
///
/// #[async_trait]
/// impl ChatCompletion for EchoChat {
///     async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
///         Ok(format!("SAFE|echo of {} chars|", prompt.len()))
///     }
/// }
/// ```
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Chat client speaking the OpenAI-style `/v1/chat/completions` shape.
pub struct OpenAiChat {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiChat {
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";
    const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Builds a client from configuration; `None` without an API key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::ai::OpenAiChat;
    /// use sentinai::config::AiConfig;
    ///
    /// let cfg = AiConfig {
    ///     api_key: Some("sk-...".to_string()),
    ///     model: Some("gpt-4o-mini".to_string()),
    ///     ..AiConfig::default()
    /// };
    /// assert!(OpenAiChat::from_config(&cfg).is_some());
    /// assert!(OpenAiChat::from_config(&AiConfig::default()).is_none());
    /// ```
    pub fn from_config(cfg: &AiConfig) -> Option<Self> {
        let api_key = cfg.api_key.clone()?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .ok()?;
        Some(Self {
            http,
            api_key,
            model: cfg
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl ChatCompletion for OpenAiChat {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.0,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("chat completion returned no choices"))
    }
}

/// Prompt-building and verdict-parsing front over a [`ChatCompletion`] client.
///
/// # Examples
///
/// ```rust,no_run
/// use sentinai::ai::AiAnalyzer;
/// use sentinai::config::AiConfig;
///
/// # async fn example(events: &[sentinai::events::RequestEvent]) {
/// let analyzer = AiAnalyzer::from_config(&AiConfig {
///     api_key: Some("sk-...".to_string()),
///     ..AiConfig::default()
/// });
/// for verdict in analyzer.analyze(events, "nightly batch review").await {
///     println!("{}: {}", verdict.module, verdict.reason);
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct AiAnalyzer {
    chat: Option<Arc<dyn ChatCompletion>>,
}

impl AiAnalyzer {
    /// Builds the analyzer from the `ai` configuration section; without an API key the
    /// analyzer reports unavailable and every call short-circuits.
    pub fn from_config(cfg: &AiConfig) -> Self {
        Self {
            chat: OpenAiChat::from_config(cfg).map(|c| Arc::new(c) as Arc<dyn ChatCompletion>),
        }
    }

    /// Analyzer over a caller-supplied chat client.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use sentinai::ai::{AiAnalyzer, ChatCompletion};
    /// # fn example(custom_client: Arc<dyn ChatCompletion>) {
    /// let analyzer = AiAnalyzer::with_client(custom_client);
    /// assert!(analyzer.is_available());
    /// # }
    /// ```
    pub fn with_client(chat: Arc<dyn ChatCompletion>) -> Self {
        Self { chat: Some(chat) }
    }

    /// Analyzer with no backend; `is_available` is false and calls return empty/Safe.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::ai::AiAnalyzer;
    ///
    /// let analyzer = AiAnalyzer::disabled();
    /// assert!(!analyzer.is_available());
    /// ```
    pub fn disabled() -> Self {
        Self { chat: None }
    }

    pub fn is_available(&self) -> bool {
        self.chat.is_some()
    }

    /// Classifies a batch of events, returning one verdict per flagged event.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::{ai::AiAnalyzer, events::RequestEvent};
    /// # async fn example(analyzer: &AiAnalyzer, batch: &[RequestEvent]) {
    /// let verdicts = analyzer.analyze(batch, "login failures spiked").await;
    /// let blocks = verdicts.iter().filter(|v| v.should_block()).count();
    /// println!("{blocks} block recommendations");
    /// # }
    /// ```
    pub async fn analyze(&self, events: &[RequestEvent], context: &str) -> Vec<ThreatVerdict> {
        let Some(chat) = &self.chat else {
            return Vec::new();
        };
        if events.is_empty() {
            return Vec::new();
        }
        let prompt = build_batch_prompt(events, context);
        match chat.complete(&prompt).await {
            Ok(reply) => parse_verdicts(&reply),
            Err(err) => {
                warn!(error = %err, "ai batch analysis failed");
                Vec::new()
            }
        }
    }

    /// Asks a single free-form question about one event.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::{ai::AiAnalyzer, events::RequestEvent};
    /// # async fn example(analyzer: &AiAnalyzer, event: &RequestEvent) {
    /// let verdict = analyzer
    ///     .analyze_single(event, "Does this look like automated scraping?")
    ///     .await;
    /// if verdict.is_threat() {
    ///     println!("flagged: {}", verdict.reason);
    /// }
    /// # }
    /// ```
    pub async fn analyze_single(&self, event: &RequestEvent, question: &str) -> ThreatVerdict {
        let Some(chat) = &self.chat else {
            return ThreatVerdict::safe(MODULE_ID);
        };
        let prompt = format!(
            "{}\n\nRequest:\n{}\n\nReply with a single line VERDICT|REASON|TARGET where \
             VERDICT is SAFE, SUSPICIOUS, or BLOCK.",
            question,
            describe_event(event, 1),
        );
        match chat.complete(&prompt).await {
            Ok(reply) => parse_verdicts(&reply)
                .into_iter()
                .next()
                .unwrap_or_else(|| ThreatVerdict::safe(MODULE_ID)),
            Err(err) => {
                warn!(error = %err, "ai single-shot analysis failed");
                ThreatVerdict::safe(MODULE_ID)
            }
        }
    }
}

fn describe_event(event: &RequestEvent, index: usize) -> String {
    format!(
        "{index}. {method} {path} ip={ip} user={user} agent={agent} status={status} time={ms}ms",
        method = event.method,
        path = event.path,
        ip = event.source_ip,
        user = event.user_id.as_deref().unwrap_or("anonymous"),
        agent = event.user_agent,
        status = event.response_status,
        ms = event.response_time_ms,
    )
}

fn build_batch_prompt(events: &[RequestEvent], context: &str) -> String {
    let mut prompt = String::from(
        "You are an API security analyst reviewing recent traffic for abuse patterns.\n",
    );
    if !context.is_empty() {
        prompt.push_str("Context: ");
        prompt.push_str(context);
        prompt.push('\n');
    }
    prompt.push_str("\nRequests:\n");
    for (i, event) in events.iter().enumerate() {
        prompt.push_str(&describe_event(event, i + 1));
        prompt.push('\n');
    }
    prompt.push_str(
        "\nFor each suspicious request reply with one line of the form \
         VERDICT|REASON|TARGET where VERDICT is SAFE, SUSPICIOUS, or BLOCK and TARGET \
         is the ip or user to act against. Output nothing else.",
    );
    prompt
}

/// Extracts structured verdicts from a reply, tolerating chatter around them.
fn parse_verdicts(reply: &str) -> Vec<ThreatVerdict> {
    let mut verdicts = Vec::new();
    for line in reply.lines() {
        let line = line.trim();
        if !line.contains('|') {
            continue;
        }
        let mut parts = line.splitn(3, '|');
        let verdict = parts.next().unwrap_or("").trim().to_ascii_uppercase();
        let reason = parts.next().unwrap_or("").trim().to_string();
        let target = parts
            .next()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        match verdict.as_str() {
            "BLOCK" => verdicts.push(ThreatVerdict {
                level: ThreatLevel::Critical,
                reason,
                module: MODULE_ID.to_string(),
                action: ThreatAction::Block,
                target,
                block_seconds: BLOCK_SECONDS,
                timestamp: chrono::Utc::now(),
            }),
            "SUSPICIOUS" => verdicts.push(ThreatVerdict::log(
                MODULE_ID,
                ThreatLevel::Medium,
                reason,
                target,
            )),
            "SAFE" => {}
            _ => {}
        }
    }
    verdicts
}
