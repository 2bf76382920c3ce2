//! In-memory counters and latency timers.

use crate::generation::error_code;
use crate::store::GenerationStatus;
use crate::telemetry::GenerationObserver;
use crate::types::Section;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

const ALLOWED_LABELS: [&str; 3] = ["section", "status", "model"];

type Labels = Vec<(String, String)>;
type MetricKey = (String, Labels);

#[derive(Debug, Clone, Copy)]
struct TimerStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

#[derive(Default)]
struct Inner {
    counters: BTreeMap<MetricKey, u64>,
    timers: BTreeMap<MetricKey, TimerStats>,
}

/// Summary of one timer series, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Point-in-time copy of all series, keyed as `name{label=value,...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub timers_ms: BTreeMap<String, TimerSummary>,
}

/// Labelled counters and timers. Labels outside `section`, `status`, `model`
/// are dropped to keep cardinality bounded.
#[derive(Default)]
pub struct MetricsRegistry {
    inner: Mutex<Inner>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, name: &str, labels: &[(&str, &str)]) {
        let key = (name.to_string(), normalize_labels(labels));
        *self.inner.lock().counters.entry(key).or_insert(0) += 1;
    }

    pub fn observe_ms(&self, name: &str, ms: f64, labels: &[(&str, &str)]) {
        let key = (name.to_string(), normalize_labels(labels));
        let mut inner = self.inner.lock();
        inner
            .timers
            .entry(key)
            .and_modify(|stats| {
                stats.count += 1;
                stats.sum += ms;
                stats.min = stats.min.min(ms);
                stats.max = stats.max.max(ms);
            })
            .or_insert(TimerStats {
                count: 1,
                sum: ms,
                min: ms,
                max: ms,
            });
    }

    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = (name.to_string(), normalize_labels(labels));
        self.inner.lock().counters.get(&key).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let counters = inner
            .counters
            .iter()
            .map(|((name, labels), value)| (render_key(name, labels), *value))
            .collect();
        let timers_ms = inner
            .timers
            .iter()
            .map(|((name, labels), stats)| {
                let avg = if stats.count == 0 {
                    0.0
                } else {
                    stats.sum / stats.count as f64
                };
                (
                    render_key(name, labels),
                    TimerSummary {
                        count: stats.count,
                        sum: stats.sum,
                        min: stats.min,
                        max: stats.max,
                        avg,
                    },
                )
            })
            .collect();
        MetricsSnapshot {
            counters,
            timers_ms,
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.counters.clear();
        inner.timers.clear();
    }
}

impl GenerationObserver for MetricsRegistry {
    fn cache_hit(&self, section: Section) {
        let section = section.as_str();
        self.increment("cache.hit", &[("section", section), ("status", "hit")]);
        self.increment(
            "generation.status.complete",
            &[("section", section), ("status", "complete")],
        );
    }

    fn cache_miss(&self, section: Section) {
        self.increment(
            "cache.miss",
            &[("section", section.as_str()), ("status", "miss")],
        );
    }

    fn in_progress(&self, section: Section) {
        self.increment(
            "generation.status.pending",
            &[("section", section.as_str()), ("status", "pending")],
        );
    }

    fn previously_failed(&self, section: Section, _error_code: Option<&str>) {
        self.increment(
            "generation.status.failed",
            &[("section", section.as_str()), ("status", "failed")],
        );
    }

    fn llm_latency(&self, section: Section, model: &str, elapsed: Duration) {
        self.observe_ms(
            "openai.latency_ms",
            elapsed.as_secs_f64() * 1000.0,
            &[("section", section.as_str()), ("model", model)],
        );
    }

    fn generation_completed(&self, section: Section) {
        self.increment(
            "generation.status.complete",
            &[("section", section.as_str()), ("status", "complete")],
        );
    }

    fn generation_failed(&self, section: Section, model: &str, error_code: &str) {
        let section = section.as_str();
        match error_code {
            error_code::SCHEMA_VALIDATION => self.increment(
                "schema.validation_failed",
                &[("section", section), ("status", "failed")],
            ),
            error_code::TIMEOUT | error_code::OPENAI_ERROR => self.increment(
                "openai.error",
                &[("section", section), ("status", "failed"), ("model", model)],
            ),
            _ => self.increment(
                "generation.error",
                &[("section", section), ("status", "failed")],
            ),
        }
    }

    fn store_write(&self, status: GenerationStatus, elapsed: Duration) {
        self.observe_ms(
            "db.upsert_ms",
            elapsed.as_secs_f64() * 1000.0,
            &[("status", status.as_str())],
        );
    }
}

fn normalize_labels(labels: &[(&str, &str)]) -> Labels {
    let mut normalized: Labels = labels
        .iter()
        .filter(|(key, _)| ALLOWED_LABELS.contains(key))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    normalized.sort();
    normalized
}

fn render_key(name: &str, labels: &Labels) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let joined: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{name}{{{}}}", joined.join(","))
}
