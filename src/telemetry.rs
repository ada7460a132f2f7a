//! Optional tracing bootstrap for hosts without their own subscriber.
//!
//! The crate logs exclusively through `tracing` macros and stays subscriber-agnostic;
//! embedding applications normally install their own subscriber. This module, gated
//! behind the `telemetry` feature, offers a formatted default for quick starts.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Initializes the global tracing subscriber with formatted output at INFO level.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_level(true)
                .with_filter(LevelFilter::INFO),
        )
        .init();
}
