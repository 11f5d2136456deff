//! Operational counters and latency samples.
//!
//! Counters are monotonic for the lifetime of the collector. Latency
//! samples live in bounded rings (oldest dropped on overflow) and are
//! summarised with nearest-rank percentiles, so P50 ≤ P95 ≤ P99 always
//! holds and every percentile lies within [min, max].

use std::collections::VecDeque;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::core::staging::StagingStore;

const SAMPLE_CAP: usize = 1000;

#[derive(Debug, Default, Clone)]
pub struct Counters {
    pub webhooks_received: u64,
    pub webhooks_processed: u64,
    pub webhooks_failed: u64,
    pub files_matched: u64,
    pub files_uploaded: u64,
    pub files_upload_failed: u64,
    pub files_deprecated: u64,
    pub api_calls: u64,
    pub api_errors: u64,
}

#[derive(Default)]
struct Inner {
    counters: Counters,
    webhook_durations: VecDeque<f64>,
    upload_durations: VecDeque<f64>,
}

pub struct MetricsCollector {
    inner: Mutex<Inner>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn inc_webhooks_received(&self) {
        self.inner.lock().counters.webhooks_received += 1;
    }

    pub fn inc_webhooks_processed(&self) {
        self.inner.lock().counters.webhooks_processed += 1;
    }

    pub fn inc_webhooks_failed(&self) {
        self.inner.lock().counters.webhooks_failed += 1;
    }

    pub fn inc_files_matched(&self) {
        self.inner.lock().counters.files_matched += 1;
    }

    pub fn inc_files_uploaded(&self) {
        self.inner.lock().counters.files_uploaded += 1;
    }

    pub fn inc_files_upload_failed(&self) {
        self.inner.lock().counters.files_upload_failed += 1;
    }

    pub fn inc_files_deprecated(&self) {
        self.inner.lock().counters.files_deprecated += 1;
    }

    pub fn inc_api_calls(&self) {
        self.inner.lock().counters.api_calls += 1;
    }

    pub fn inc_api_errors(&self) {
        self.inner.lock().counters.api_errors += 1;
    }

    pub fn record_webhook_duration_ms(&self, ms: f64) {
        let mut inner = self.inner.lock();
        push_sample(&mut inner.webhook_durations, ms);
    }

    pub fn record_upload_duration_ms(&self, ms: f64) {
        let mut inner = self.inner.lock();
        push_sample(&mut inner.upload_durations, ms);
    }

    pub fn counters(&self) -> Counters {
        self.inner.lock().counters.clone()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.started.elapsed()
    }

    /// Snapshot for the `/metrics` endpoint. Queue depths come from the
    /// staging store at snapshot time.
    pub fn report(&self, staging: &StagingStore) -> MetricsReport {
        let inner = self.inner.lock();
        let c = &inner.counters;

        MetricsReport {
            webhooks: WebhookMetrics {
                received: c.webhooks_received,
                processed: c.webhooks_processed,
                failed: c.webhooks_failed,
                success_rate_percent: rate(c.webhooks_processed, c.webhooks_received),
                latency_ms: summarise(&inner.webhook_durations),
            },
            files: FileMetrics {
                matched: c.files_matched,
                uploaded: c.files_uploaded,
                upload_failed: c.files_upload_failed,
                deprecated: c.files_deprecated,
                upload_latency_ms: summarise(&inner.upload_durations),
            },
            github_api: ApiMetrics {
                calls: c.api_calls,
                errors: c.api_errors,
                error_rate_percent: rate(c.api_errors, c.api_calls),
            },
            queues: QueueMetrics {
                upload_count: staging.upload_count(),
                deprecation_count: staging.deprecation_count(),
            },
            system: SystemMetrics {
                started: self.started_at,
                uptime: humanize(self.started.elapsed().as_secs()),
                uptime_seconds: self.started.elapsed().as_secs(),
            },
        }
    }
}

fn push_sample(ring: &mut VecDeque<f64>, value: f64) {
    if ring.len() == SAMPLE_CAP {
        ring.pop_front();
    }
    ring.push_back(value);
}

fn rate(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64) * 100.0
}

/// Formats seconds as e.g. "1h23m45s".
pub fn humanize(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn summarise(samples: &VecDeque<f64>) -> LatencySummary {
    if samples.is_empty() {
        return LatencySummary::default();
    }

    let mut sorted: Vec<f64> = samples.iter().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = sorted.len();
    let sum: f64 = sorted.iter().sum();

    LatencySummary {
        count,
        avg: sum / count as f64,
        min: sorted[0],
        max: sorted[count - 1],
        p50: nearest_rank(&sorted, 50.0),
        p95: nearest_rank(&sorted, 95.0),
        p99: nearest_rank(&sorted, 99.0),
    }
}

fn nearest_rank(sorted: &[f64], percentile: f64) -> f64 {
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub webhooks: WebhookMetrics,
    pub files: FileMetrics,
    pub github_api: ApiMetrics,
    pub queues: QueueMetrics,
    pub system: SystemMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookMetrics {
    pub received: u64,
    pub processed: u64,
    pub failed: u64,
    pub success_rate_percent: f64,
    pub latency_ms: LatencySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileMetrics {
    pub matched: u64,
    pub uploaded: u64,
    pub upload_failed: u64,
    pub deprecated: u64,
    pub upload_latency_ms: LatencySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiMetrics {
    pub calls: u64,
    pub errors: u64,
    pub error_rate_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueMetrics {
    pub upload_count: usize,
    pub deprecation_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    pub started: DateTime<Utc>,
    pub uptime: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}
