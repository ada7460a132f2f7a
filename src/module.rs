//! Detection module interface and the priority-ordered registry.
//!
//! A module is one detector: it classifies single requests synchronously, may rewrite
//! responses, and may run deeper analysis over drained batches in the async domain.
//! The trait carries default no-op implementations for the response and batch hooks, so
//! a request-only detector implements exactly one method. Modules must never perform
//! network I/O from `analyze_request`/`analyze_response`; the decision store is the
//! only blocking collaborator allowed there, and the AI analyzer is reserved for
//! `analyze_batch`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    context::ModuleContext,
    events::{RequestEvent, ResponseEvent},
    verdict::ThreatVerdict,
};

/// Default priority for modules that do not care about ordering.
pub const DEFAULT_ORDER: i32 = 500;

/// A pluggable detector in the analysis pipeline.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use sentinai::context::ModuleContext;
/// use sentinai::events::RequestEvent;
/// use sentinai::module::SecurityModule;
/// use sentinai::verdict::ThreatVerdict;
///
/// struct PutBan;
///
/// #[async_trait]
/// impl SecurityModule for PutBan {
///     fn id(&self) -> &'static str {
///         "put-ban"
///     }
///
///     fn name(&self) -> &'static str {
///         "PUT Ban"
///     }
///
///     async fn analyze_request(
///         &self,
///         event: &RequestEvent,
///         _ctx: &ModuleContext,
///     ) -> anyhow::Result<ThreatVerdict> {
///         if event.method == "PUT" {
///             return Ok(ThreatVerdict::block(
///                 "put-ban",
///                 "PUT is not allowed here",
///                 event.source_ip.clone(),
///                 600,
///             ));
///         }
///         Ok(ThreatVerdict::safe("put-ban"))
///     }
/// }
/// ```
#[async_trait]
pub trait SecurityModule: Send + Sync {
    /// Unique, stable identifier; also the key of the module's configuration section.
    fn id(&self) -> &'static str;

    /// Human-readable display name.
    fn name(&self) -> &'static str;

    /// Priority order; lower runs first.
    fn order(&self) -> i32 {
        DEFAULT_ORDER
    }

    /// Synchronous per-request analysis. Runs on the request-serving thread, so store
    /// lookups are the only acceptable blocking work.
    async fn analyze_request(
        &self,
        event: &RequestEvent,
        ctx: &ModuleContext,
    ) -> anyhow::Result<ThreatVerdict>;

    /// Response-path hook; may return a rewritten response. Default: pass-through.
    async fn analyze_response(
        &self,
        response: ResponseEvent,
        ctx: &ModuleContext,
    ) -> anyhow::Result<ResponseEvent> {
        let _ = ctx;
        Ok(response)
    }

    /// Asynchronous batch analysis over drained events; may consult the AI analyzer.
    /// Default: no verdicts.
    async fn analyze_batch(
        &self,
        events: &[RequestEvent],
        ctx: &ModuleContext,
    ) -> anyhow::Result<Vec<ThreatVerdict>> {
        let _ = (events, ctx);
        Ok(Vec::new())
    }

    /// Enablement gate, re-evaluated on every pipeline pass. Defaults to the
    /// configuration flag, which is true when no entry exists.
    fn is_enabled(&self, ctx: &ModuleContext) -> bool {
        ctx.config.module_enabled(self.id())
    }
}

/// Ordered collection of modules with enablement filtering.
///
/// Sorting happens once, stably, at construction; `enabled` re-evaluates each module's
/// gate on every call so configuration-driven enablement behaves dynamically.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use sentinai::module::{ModuleRegistry, SecurityModule};
/// use sentinai::modules::{CredentialGuard, QueryShield};
///
/// let registry = ModuleRegistry::new(vec![
///     Arc::new(QueryShield::new()) as Arc<dyn SecurityModule>,
///     Arc::new(CredentialGuard::new()),
/// ]);
///
/// // iteration order follows priority, not registration
/// let ids: Vec<_> = registry.all().iter().map(|m| m.id()).collect();
/// assert_eq!(ids, vec!["credential-guard", "query-shield"]);
/// ```
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn SecurityModule>>,
}

impl ModuleRegistry {
    pub fn new(mut modules: Vec<Arc<dyn SecurityModule>>) -> Self {
        modules.sort_by_key(|m| m.order());
        Self { modules }
    }

    /// All modules in ascending priority order.
    pub fn all(&self) -> &[Arc<dyn SecurityModule>] {
        &self.modules
    }

    /// The currently enabled subset, in priority order.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::{context::ModuleContext, module::ModuleRegistry};
    /// # fn example(registry: &ModuleRegistry, ctx: &ModuleContext) {
    /// for module in registry.enabled(ctx) {
    ///     println!("{} will run", module.name());
    /// }
    /// # }
    /// ```
    pub fn enabled(&self, ctx: &ModuleContext) -> Vec<Arc<dyn SecurityModule>> {
        self.modules
            .iter()
            .filter(|m| m.is_enabled(ctx))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ai::AiAnalyzer, config::SentinConfig, store::MemoryStore};

    struct Named {
        id: &'static str,
        order: i32,
    }

    #[async_trait]
    impl SecurityModule for Named {
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
            _event: &RequestEvent,
            _ctx: &ModuleContext,
        ) -> anyhow::Result<ThreatVerdict> {
            Ok(ThreatVerdict::safe(self.id))
        }
    }

    fn ctx(config: SentinConfig) -> ModuleContext {
        ModuleContext::new(
            Arc::new(MemoryStore::new()),
            AiAnalyzer::disabled(),
            Arc::new(config),
        )
    }

    #[test]
    fn registry_sorts_stably_by_order() {
        let registry = ModuleRegistry::new(vec![
            Arc::new(Named { id: "c", order: 900 }) as Arc<dyn SecurityModule>,
            Arc::new(Named { id: "a1", order: 100 }),
            Arc::new(Named { id: "b1", order: 500 }),
            Arc::new(Named { id: "b2", order: 500 }),
            Arc::new(Named { id: "a2", order: 100 }),
        ]);
        let ids: Vec<_> = registry.all().iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b1", "b2", "c"]);
    }

    #[test]
    fn enabled_subset_reflects_configuration() {
        let registry = ModuleRegistry::new(vec![
            Arc::new(Named { id: "keep", order: 1 }) as Arc<dyn SecurityModule>,
            Arc::new(Named { id: "drop", order: 2 }),
        ]);
        let config: SentinConfig =
            serde_json::from_str(r#"{"modules":{"drop":{"enabled":false}}}"#).unwrap();
        let ctx = ctx(config);
        let ids: Vec<_> = registry.enabled(&ctx).iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec!["keep"]);

        // no entry means enabled
        let ctx = self::ctx(SentinConfig::default());
        assert_eq!(registry.enabled(&ctx).len(), 2);
    }
}
