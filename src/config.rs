//! Configuration tree consumed by the engine, filter, and detection modules.
//!
//! The crate never loads configuration itself; the host deserializes whatever source it
//! prefers (JSON, YAML, env layering) into [`SentinConfig`] and hands it over. Field
//! names use kebab-case to match the documented surface (`exclude-paths`,
//! `ai.api-key`, `modules.<id>.config.<option>`). Module options stay dynamic
//! (`serde_json::Value`) and are interpreted by each module through the typed accessors
//! here, so adding a module option never touches this file.
//!
//! # Examples
//!
//! ```rust
//! use sentinai::config::{Mode, SentinConfig};
//!
//! let cfg: SentinConfig = serde_json::from_str(
//!     r#"{
//!         "mode": "active",
//!         "exclude-paths": ["/health", "/static/**"],
//!         "modules": { "query-shield": { "config": { "max-concurrency": 10 } } }
//!     }"#,
//! ).unwrap();
//!
//! assert_eq!(cfg.mode, Mode::Active);
//! assert!(cfg.is_path_excluded("/static/css/site.css"));
//! assert_eq!(cfg.module_u64("query-shield", "max-concurrency", 50), 10);
//! ```

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Global enforcement mode.
///
/// In `Monitor` mode threats are logged but never denied; in `Active` mode block and
/// throttle verdicts are enforced. Parsing accepts any casing (`MONITOR`, `active`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Monitor,
    Active,
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_lowercase().as_str() {
            "monitor" => Ok(Mode::Monitor),
            "active" => Ok(Mode::Active),
            other => Err(serde::de::Error::custom(format!(
                "unknown mode `{other}`, expected MONITOR or ACTIVE"
            ))),
        }
    }
}

/// Chat-completion endpoint settings for the AI analyzer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AiConfig {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Decision store backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StoreConfig {
    /// `in-memory` (default) or `distributed`.
    pub r#type: String,
    pub distributed_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            r#type: "in-memory".to_string(),
            distributed_url: None,
        }
    }
}

/// Per-module enablement and free-form options.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ModuleConfig {
    pub enabled: bool,
    pub config: HashMap<String, Value>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            config: HashMap::new(),
        }
    }
}

/// Root configuration object.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SentinConfig {
    pub enabled: bool,
    pub mode: Mode,
    /// Ordered glob-suffix patterns; `prefix/**` matches any path under the prefix,
    /// anything else matches exactly.
    pub exclude_paths: Vec<String>,
    pub ai: AiConfig,
    pub store: StoreConfig,
    pub modules: HashMap<String, ModuleConfig>,
}

impl Default for SentinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: Mode::Monitor,
            exclude_paths: Vec::new(),
            ai: AiConfig::default(),
            store: StoreConfig::default(),
            modules: HashMap::new(),
        }
    }
}

impl SentinConfig {
    /// True when enforcement (rather than logging) applies.
    pub fn is_active(&self) -> bool {
        self.mode == Mode::Active
    }

    /// Checks `path` against the exclusion patterns in order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::config::SentinConfig;
    ///
    /// let cfg: SentinConfig =
    ///     serde_json::from_str(r#"{"exclude-paths":["/health","/static/**"]}"#).unwrap();
    /// assert!(cfg.is_path_excluded("/health"));
    /// assert!(cfg.is_path_excluded("/static/js/app.js"));
    /// assert!(!cfg.is_path_excluded("/health/live"));
    /// ```
    pub fn is_path_excluded(&self, path: &str) -> bool {
        self.exclude_paths.iter().any(|pattern| {
            match pattern.strip_suffix("/**") {
                Some(prefix) => path.starts_with(prefix),
                None => path == pattern,
            }
        })
    }

    /// Whether a module is enabled; absent entries default to enabled.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::config::SentinConfig;
    ///
    /// let cfg: SentinConfig =
    ///     serde_json::from_str(r#"{"modules":{"query-shield":{"enabled":false}}}"#).unwrap();
    /// assert!(!cfg.module_enabled("query-shield"));
    /// assert!(cfg.module_enabled("bola-detection")); // no entry means enabled
    /// ```
    pub fn module_enabled(&self, id: &str) -> bool {
        self.modules.get(id).map(|m| m.enabled).unwrap_or(true)
    }

    /// Whether a module has an explicit configuration section at all.
    pub fn module_configured(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Raw option value for a module, if set.
    pub fn module_option(&self, id: &str, key: &str) -> Option<&Value> {
        self.modules.get(id).and_then(|m| m.config.get(key))
    }

    /// Integer option with a default.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::config::SentinConfig;
    ///
    /// let cfg: SentinConfig = serde_json::from_str(
    ///     r#"{"modules":{"bola-detection":{"config":{"unique-id-threshold":3}}}}"#,
    /// ).unwrap();
    /// assert_eq!(cfg.module_u64("bola-detection", "unique-id-threshold", 15), 3);
    /// assert_eq!(cfg.module_u64("bola-detection", "sequential-threshold", 5), 5);
    /// ```
    pub fn module_u64(&self, id: &str, key: &str, default: u64) -> u64 {
        self.module_option(id, key)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    /// Float option with a default.
    pub fn module_f64(&self, id: &str, key: &str, default: f64) -> f64 {
        self.module_option(id, key)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    /// String option with a default.
    pub fn module_str<'a>(&'a self, id: &str, key: &str, default: &'a str) -> &'a str {
        self.module_option(id, key)
            .and_then(Value::as_str)
            .unwrap_or(default)
    }
}
