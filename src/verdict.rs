//! Threat verdicts emitted by detection modules and the engine.
//!
//! A verdict classifies one event: how severe it looks, what the module recommends
//! doing about it, and which identifier (ip, user, fingerprint, or synthetic key) the
//! recommendation targets. Verdicts are short-lived values; the engine acts on them or
//! logs them and moves on.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity of a detected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ThreatLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

/// Action a module recommends for the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThreatAction {
    Allow,
    Log,
    Challenge,
    Throttle,
    Block,
}

/// A module's classification of a single event.
///
/// # Examples
///
/// ```rust
/// use sentinai::verdict::{ThreatAction, ThreatVerdict};
///
/// let verdict = ThreatVerdict::block("query-shield", "SQL tautology", "203.0.113.9", 600);
/// assert!(verdict.is_threat());
/// assert!(verdict.should_block());
/// assert_eq!(verdict.action, ThreatAction::Block);
/// assert_eq!(verdict.target.as_deref(), Some("203.0.113.9"));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ThreatVerdict {
    pub level: ThreatLevel,
    pub reason: String,
    /// Id of the module that produced the verdict (`"engine"` for engine-level ones).
    pub module: String,
    pub action: ThreatAction,
    /// Identifier the action applies to: ip, user id, fingerprint, or synthetic key.
    pub target: Option<String>,
    /// Block duration in seconds; 0 means permanent when the action is `Block`.
    pub block_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

impl ThreatVerdict {
    /// A clean verdict from the named module.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::verdict::{ThreatAction, ThreatLevel, ThreatVerdict};
    ///
    /// let verdict = ThreatVerdict::safe("bola-detection");
    /// assert_eq!(verdict.level, ThreatLevel::Safe);
    /// assert_eq!(verdict.action, ThreatAction::Allow);
    /// assert!(!verdict.is_threat());
    /// ```
    pub fn safe(module: &str) -> Self {
        Self {
            level: ThreatLevel::Safe,
            reason: String::new(),
            module: module.to_string(),
            action: ThreatAction::Allow,
            target: None,
            block_seconds: 0,
            timestamp: Utc::now(),
        }
    }

    /// A blocking verdict against `target` for `block_seconds` (0 = permanent).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::verdict::ThreatVerdict;
    ///
    /// // temporary block
    /// let timed = ThreatVerdict::block("credential-guard", "12 failed logins", "admin", 1800);
    /// assert_eq!(timed.block_seconds, 1800);
    ///
    /// // zero seconds means permanent
    /// let permanent = ThreatVerdict::block("engine", "IP is blacklisted", "203.0.113.9", 0);
    /// assert_eq!(permanent.block_seconds, 0);
    /// ```
    pub fn block(
        module: &str,
        reason: impl Into<String>,
        target: impl Into<String>,
        block_seconds: u64,
    ) -> Self {
        Self {
            level: ThreatLevel::Critical,
            reason: reason.into(),
            module: module.to_string(),
            action: ThreatAction::Block,
            target: Some(target.into()),
            block_seconds,
            timestamp: Utc::now(),
        }
    }

    /// A throttling verdict against `target`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::verdict::{ThreatAction, ThreatVerdict};
    ///
    /// let verdict = ThreatVerdict::throttle("cost-protection", "daily limit reached", "user:alice");
    /// assert_eq!(verdict.action, ThreatAction::Throttle);
    /// assert!(verdict.is_threat());
    /// assert!(!verdict.should_block());
    /// ```
    pub fn throttle(module: &str, reason: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            level: ThreatLevel::High,
            reason: reason.into(),
            module: module.to_string(),
            action: ThreatAction::Throttle,
            target: Some(target.into()),
            block_seconds: 0,
            timestamp: Utc::now(),
        }
    }

    /// A log-only verdict at the given level.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::verdict::{ThreatAction, ThreatLevel, ThreatVerdict};
    ///
    /// let verdict = ThreatVerdict::log(
    ///     "bola-detection",
    ///     ThreatLevel::Medium,
    ///     "wide resource sweep in batch",
    ///     Some("alice".to_string()),
    /// );
    /// assert_eq!(verdict.action, ThreatAction::Log);
    /// assert!(verdict.is_threat());
    /// ```
    pub fn log(
        module: &str,
        level: ThreatLevel,
        reason: impl Into<String>,
        target: Option<String>,
    ) -> Self {
        Self {
            level,
            reason: reason.into(),
            module: module.to_string(),
            action: ThreatAction::Log,
            target,
            block_seconds: 0,
            timestamp: Utc::now(),
        }
    }

    /// Severity gate: anything above `Low` counts as a threat.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::verdict::{ThreatLevel, ThreatVerdict};
    ///
    /// assert!(!ThreatVerdict::log("m", ThreatLevel::Low, "noise", None).is_threat());
    /// assert!(ThreatVerdict::log("m", ThreatLevel::Medium, "odd", None).is_threat());
    /// ```
    pub fn is_threat(&self) -> bool {
        self.level > ThreatLevel::Low
    }

    /// Whether the recommended action is an outright block.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentinai::verdict::ThreatVerdict;
    ///
    /// assert!(ThreatVerdict::block("m", "bad", "1.2.3.4", 60).should_block());
    /// assert!(!ThreatVerdict::throttle("m", "busy", "1.2.3.4").should_block());
    /// ```
    pub fn should_block(&self) -> bool {
        self.action == ThreatAction::Block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threat_gate_excludes_safe_and_low() {
        assert!(!ThreatVerdict::safe("m").is_threat());
        assert!(!ThreatVerdict::log("m", ThreatLevel::Low, "odd", None).is_threat());
        assert!(ThreatVerdict::log("m", ThreatLevel::Medium, "odd", None).is_threat());
        assert!(ThreatVerdict::block("m", "bad", "1.2.3.4", 60).is_threat());
    }

    #[test]
    fn should_block_tracks_action_not_level() {
        let v = ThreatVerdict::block("m", "bad", "1.2.3.4", 0);
        assert!(v.should_block());
        let t = ThreatVerdict::throttle("m", "busy", "1.2.3.4");
        assert!(!t.should_block());
        assert!(t.is_threat());
    }
}
