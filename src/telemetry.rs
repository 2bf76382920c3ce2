//! Telemetry: observer hooks called on generation state transitions.
//!
//! The coordinator and executor never touch process-wide counters; they report
//! to an injected [`GenerationObserver`]. [`MetricsRegistry`] is the in-memory
//! implementation used by the CLI.

pub mod metrics;

pub use metrics::{MetricsRegistry, MetricsSnapshot, TimerSummary};

use crate::store::GenerationStatus;
use crate::types::Section;
use std::time::Duration;

/// Fire-and-forget notifications. Every method has an empty default so
/// observers only implement what they care about.
pub trait GenerationObserver: Send + Sync {
    /// A completed record was served without an external call.
    fn cache_hit(&self, _section: Section) {}

    /// This request claimed the key and will call the provider.
    fn cache_miss(&self, _section: Section) {}

    /// Another request holds the claim.
    fn in_progress(&self, _section: Section) {}

    /// A stored failure was surfaced without retrying.
    fn previously_failed(&self, _section: Section, _error_code: Option<&str>) {}

    fn llm_latency(&self, _section: Section, _model: &str, _elapsed: Duration) {}

    fn generation_completed(&self, _section: Section) {}

    fn generation_failed(&self, _section: Section, _model: &str, _error_code: &str) {}

    /// Latency of one record write, labelled by the status written.
    fn store_write(&self, _status: GenerationStatus, _elapsed: Duration) {}
}

/// Observer that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl GenerationObserver for NoopObserver {}
