//! Request and cache counters with latency percentiles.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct ApiMetrics {
    // Request metrics
    requests_total: AtomicU64,
    failed_requests: AtomicU64,
    retries: AtomicU64,

    // Cache metrics
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_evictions: AtomicU64,

    start_time: Instant,
    last_error: RwLock<Option<String>>,
    latency_window: RwLock<TimeWindow<f64>>,
}

#[derive(Debug)]
struct TimeWindow<T> {
    data: VecDeque<(Instant, T)>,
    window_size: Duration,
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiMetrics {
    pub fn new() -> Self {
        let window_size = Duration::from_secs(300); // 5 minute window
        Self {
            requests_total: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_evictions: AtomicU64::new(0),
            start_time: Instant::now(),
            last_error: RwLock::new(None),
            latency_window: RwLock::new(TimeWindow::new(window_size)),
        }
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, error_msg: Option<String>) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        if let Some(msg) = error_msg {
            *self.last_error.write() = Some(msg);
        }
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, duration: Duration) {
        let latency = duration.as_secs_f64() * 1000.0; // milliseconds
        self.latency_window.write().add(latency);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_evictions(&self, count: u64) {
        self.cache_evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn get_cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn get_cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn get_cache_evictions(&self) -> u64 {
        self.cache_evictions.load(Ordering::Relaxed)
    }

    pub fn get_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    fn calculate_average_latency(&self, latencies: &[f64]) -> f64 {
        if latencies.is_empty() {
            return 0.0;
        }
        latencies.iter().sum::<f64>() / latencies.len() as f64
    }

    fn calculate_percentile(&self, values: &[f64], percentile: f64) -> f64 {
        if values.is_empty() {
            return 0.0;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let index = ((sorted.len() - 1) as f64 * percentile).round() as usize;
        sorted[index]
    }

    fn calculate_cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed) as f64;
        let misses = self.cache_misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;

        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latencies: Vec<f64> = {
            let mut window = self.latency_window.write();
            window.cleanup();
            window.data.iter().map(|(_, latency)| *latency).collect()
        };

        let total = self.requests_total.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            total_requests: total,
            failed_requests: failed,
            retries: self.retries.load(Ordering::Relaxed),
            error_rate: if total > 0 {
                failed as f64 / total as f64
            } else {
                0.0
            },
            average_latency: self.calculate_average_latency(&latencies),
            p95_response_time: self.calculate_percentile(&latencies, 0.95),
            cache_hits: self.get_cache_hits(),
            cache_misses: self.get_cache_misses(),
            cache_evictions: self.get_cache_evictions(),
            cache_hit_rate: self.calculate_cache_hit_rate(),
            last_error: self.last_error.read().clone(),
        }
    }
}

impl<T> TimeWindow<T> {
    fn new(window_size: Duration) -> Self {
        Self {
            data: VecDeque::new(),
            window_size,
        }
    }

    fn add(&mut self, value: T) {
        let now = Instant::now();
        self.data.push_back((now, value));
        self.cleanup();
    }

    fn cleanup(&mut self) {
        let Some(cutoff) = Instant::now().checked_sub(self.window_size) else {
            return;
        };
        while self.data.front().map_or(false, |(t, _)| *t < cutoff) {
            self.data.pop_front();
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub retries: u64,
    pub error_rate: f64,
    /// Milliseconds
    pub average_latency: f64,
    pub p95_response_time: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
    pub cache_hit_rate: f64,
    pub last_error: Option<String>,
}
