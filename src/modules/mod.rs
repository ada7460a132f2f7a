//! Bundled detection modules.
//!
//! Each module is an independent detector registered into the
//! [`ModuleRegistry`](crate::module::ModuleRegistry); they coordinate only through the
//! decision store's shared key layout. Priority order is fixed per module: cheap
//! request-path gates first (Credential-Guard, Query-Shield, BOLA), response scanners
//! and opt-in guards last (Data-Leak-Prevention, Cost-Protection).

mod bola;
mod cost_protection;
mod credential_guard;
mod data_leak;
mod query_shield;

pub use bola::BolaDetection;
pub use cost_protection::CostProtection;
pub use credential_guard::CredentialGuard;
pub use data_leak::{BLOCKED_BODY, DataLeakPrevention, REDACTION_MARKER};
pub use query_shield::QueryShield;
