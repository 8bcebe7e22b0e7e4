/*!
 * # Metrics Module
 *
 * In-process counters, gauges and histograms for the materials service.
 *
 * Metrics are exposed in the following formats:
 * - Prometheus text format at `/metrics`
 * - JSON format at `/metrics/json`
 */

use axum::{http::StatusCode, response::IntoResponse, Json};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::json;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Gauge holding an `f64`, stored as its bit pattern
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    bits: Arc<AtomicU64>,
}

impl Gauge {
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Histogram {
    sum_bits: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    pub fn observe(&self, value: f64) {
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Counter>,
    gauges: DashMap<String, Gauge>,
    histograms: DashMap<String, Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> Counter {
        self.counters.entry(name.to_string()).or_default().clone()
    }

    pub fn gauge(&self, name: &str) -> Gauge {
        self.gauges.entry(name.to_string()).or_default().clone()
    }

    pub fn histogram(&self, name: &str) -> Histogram {
        self.histograms.entry(name.to_string()).or_default().clone()
    }

    /// Renders every metric in the Prometheus text exposition format, sorted by name
    pub fn export_metrics(&self) -> String {
        let mut output = String::new();

        let mut counters: Vec<(String, u64)> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect();
        counters.sort();
        for (name, value) in counters {
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value);
        }

        let mut gauges: Vec<(String, f64)> = self
            .gauges
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect();
        gauges.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in gauges {
            let _ = writeln!(output, "# TYPE {} gauge", name);
            let _ = writeln!(output, "{} {}", name, value);
        }

        let mut histograms: Vec<(String, Histogram)> = self
            .histograms
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        histograms.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, histogram) in histograms {
            let _ = writeln!(output, "# TYPE {} summary", name);
            let _ = writeln!(output, "{}_count {}", name, histogram.get_count());
            let _ = writeln!(output, "{}_sum {}", name, histogram.get_sum());
        }

        output
    }

    pub fn export_metrics_json(&self) -> serde_json::Value {
        let mut counters = serde_json::Map::new();
        for entry in self.counters.iter() {
            counters.insert(entry.key().clone(), json!(entry.value().get()));
        }

        let mut gauges = serde_json::Map::new();
        for entry in self.gauges.iter() {
            gauges.insert(entry.key().clone(), json!(entry.value().get()));
        }

        let mut histograms = serde_json::Map::new();
        for entry in self.histograms.iter() {
            let histogram = entry.value();
            histograms.insert(
                entry.key().clone(),
                json!({
                    "count": histogram.get_count(),
                    "sum": histogram.get_sum(),
                }),
            );
        }

        json!({
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }
}

// Global metrics registry
pub static METRICS: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        METRICS.export_metrics(),
    )
}

pub async fn metrics_json_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(METRICS.export_metrics_json()))
}
