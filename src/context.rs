//! Aggregate handle giving detection modules access to shared collaborators.

use std::sync::Arc;

use crate::{ai::AiAnalyzer, config::SentinConfig, store::DecisionStore};

/// Shared, read-only context handed to every module call.
///
/// Constructed once at composition time and carried by the engine; it holds no
/// per-request state, so one instance serves all modules and all requests.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use sentinai::ai::AiAnalyzer;
/// use sentinai::config::SentinConfig;
/// use sentinai::context::ModuleContext;
/// use sentinai::store::MemoryStore;
///
/// let ctx = ModuleContext::new(
///     Arc::new(MemoryStore::new()),
///     AiAnalyzer::disabled(),
///     Arc::new(SentinConfig::default()),
/// );
/// assert!(ctx.config.module_enabled("query-shield"));
/// ```
#[derive(Clone)]
pub struct ModuleContext {
    pub store: Arc<dyn DecisionStore>,
    pub ai: AiAnalyzer,
    pub config: Arc<SentinConfig>,
}

impl ModuleContext {
    pub fn new(store: Arc<dyn DecisionStore>, ai: AiAnalyzer, config: Arc<SentinConfig>) -> Self {
        Self { store, ai, config }
    }
}
