#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-process API security middleware for hyper-based applications.
//!
//! SentinAI sits inside the request path, after authentication, and runs every
//! round-trip through a priority-ordered pipeline of detection modules. Verdicts are
//! enforced (block, throttle), applied (response redaction), or merely logged,
//! depending on the global mode. A shared decision store carries blocklists, windowed
//! counters, and keyed values with TTL, so a block decided on one instance denies on
//! the whole fleet.
//!
//! # High-level features
//! - Priority-ordered module registry with per-module enablement
//! - Five bundled detectors: credential stuffing, query injection and overload,
//!   object-id enumeration (BOLA/IDOR), response data-leak prevention, AI cost guard
//! - Monitor mode (log-only) and Active mode (enforce) with identical analysis
//! - Shared decision store: in-memory, or Redis-backed with the `distributed` feature
//! - Asynchronous batch analysis on a bounded worker pool, optionally consulting a
//!   chat-completion endpoint through a narrow, swappable client trait
//! - Body-caching filter adapter: modules and the downstream handler both read bodies
//!
//! # Compatibility
//! - Runtime: `tokio`
//! - HTTP: `http`/`hyper` 1.x types
//!
//! # Quickstart
//!
//! ```rust,no_run
//! use sentinai::{config::SentinConfig, filter::SecurityFilter, middleware::IntoMiddleware};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config: SentinConfig = serde_json::from_str(
//!     r#"{"mode":"ACTIVE","exclude-paths":["/health"]}"#,
//! )?;
//! let filter = SecurityFilter::builder(config).build().await?;
//! let middleware = filter.into_middleware();
//! // mount `middleware` into the host's chain
//! # Ok(())
//! # }
//! ```
//!
//! # Key concepts
//! - [`filter::SecurityFilter`] wraps one round-trip: capture, verdict, enforcement,
//!   response rewriting, async submission.
//! - [`engine::SecurityEngine`] drives events through the registry and schedules
//!   batch analysis.
//! - [`module::SecurityModule`] is the detector interface; bundled implementations
//!   live in [`modules`].
//! - [`store::DecisionStore`] is the shared substrate for blocks, counters, and KV.
//!
//! # Feature flags
//! - `distributed` — Redis-backed decision store shared across a fleet
//! - `telemetry` — formatted `tracing-subscriber` bootstrap

/// Batch and single-shot analysis over an external chat completion endpoint.
pub mod ai;

/// HTTP body wrapper supporting buffering and re-injection.
pub mod body;

/// Configuration tree and typed option accessors.
pub mod config;

/// Shared context handed to every module call.
pub mod context;

/// Event fan-out, verdict enforcement, and the async batch domain.
pub mod engine;

/// Immutable request/response event records.
pub mod events;

/// The mountable filter adapter and its builder.
pub mod filter;

/// Middleware chain plumbing (`Next`, `IntoMiddleware`).
pub mod middleware;

/// Detection module interface and priority-ordered registry.
pub mod module;

/// Bundled detection modules.
pub mod modules;

/// Decision store trait and backends.
pub mod store;

/// Optional tracing bootstrap.
#[cfg(feature = "telemetry")]
#[cfg_attr(docsrs, doc(cfg(feature = "telemetry")))]
pub mod telemetry;

/// Core type aliases and the hosting seam.
pub mod types;

/// Threat verdict values.
pub mod verdict;

pub use config::{Mode, SentinConfig};
pub use filter::{FilterBuilder, SecurityFilter};
pub use types::{Principal, Request, Response};
pub use verdict::{ThreatAction, ThreatLevel, ThreatVerdict};
