//! Prometheus metrics for the HTTP API
//!
//! Counters are plain atomics keyed by (method, route template) and are
//! rendered in the Prometheus text exposition format on `/metrics`.

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
const LATENCY_BUCKET_BOUNDARIES_MS: [u64; 11] =
    [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

/// Per-route metrics
#[derive(Debug, Default)]
struct RouteMetrics {
    requests_total: AtomicU64,
    /// 2xx
    requests_success: AtomicU64,
    /// 4xx
    requests_client_error: AtomicU64,
    /// 5xx
    requests_server_error: AtomicU64,
    latency_sum_us: AtomicU64,
    /// Cumulative counts
    latency_buckets: [AtomicU64; 11],
}

impl RouteMetrics {
    fn record(&self, status_code: u16, latency_us: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        if (200..300).contains(&status_code) {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else if (400..500).contains(&status_code) {
            self.requests_client_error.fetch_add(1, Ordering::Relaxed);
        } else if status_code >= 500 {
            self.requests_server_error.fetch_add(1, Ordering::Relaxed);
        }

        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        let latency_ms = latency_us / 1000;
        for (i, &boundary) in LATENCY_BUCKET_BOUNDARIES_MS.iter().enumerate() {
            if latency_ms <= boundary {
                self.latency_buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Process-wide API metrics
pub struct ApiMetrics {
    start_time: Instant,
    routes: RwLock<BTreeMap<(String, String), RouteMetrics>>,
    score_updates: AtomicU64,
    degraded_updates: AtomicU64,
}

impl ApiMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            routes: RwLock::new(BTreeMap::new()),
            score_updates: AtomicU64::new(0),
            degraded_updates: AtomicU64::new(0),
        }
    }

    /// Record one completed request
    pub fn record_request(&self, method: &str, route: &str, status_code: u16, latency_us: u64) {
        let key = (method.to_string(), route.to_string());
        {
            let routes = self.routes.read();
            if let Some(metrics) = routes.get(&key) {
                metrics.record(status_code, latency_us);
                return;
            }
        }
        self.routes
            .write()
            .entry(key)
            .or_default()
            .record(status_code, latency_us);
    }

    /// Record an accepted score update
    pub fn record_score_update(&self, degraded: bool) {
        self.score_updates.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.degraded_updates.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Render all metrics in Prometheus text format
    #[must_use]
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(4 * 1024);

        let _ = writeln!(
            output,
            "# HELP podium_uptime_seconds Server uptime in seconds"
        );
        let _ = writeln!(output, "# TYPE podium_uptime_seconds counter");
        let _ = writeln!(
            output,
            "podium_uptime_seconds {}",
            self.start_time.elapsed().as_secs()
        );

        let _ = writeln!(
            output,
            "# HELP podium_score_updates_total Accepted score updates"
        );
        let _ = writeln!(output, "# TYPE podium_score_updates_total counter");
        let _ = writeln!(
            output,
            "podium_score_updates_total {}",
            self.score_updates.load(Ordering::Relaxed)
        );

        let _ = writeln!(
            output,
            "# HELP podium_degraded_updates_total Score updates whose history or projection step failed"
        );
        let _ = writeln!(output, "# TYPE podium_degraded_updates_total counter");
        let _ = writeln!(
            output,
            "podium_degraded_updates_total {}",
            self.degraded_updates.load(Ordering::Relaxed)
        );

        let routes = self.routes.read();
        if routes.is_empty() {
            return output;
        }

        let _ = writeln!(
            output,
            "# HELP podium_http_requests_total Total HTTP requests by route and status class"
        );
        let _ = writeln!(output, "# TYPE podium_http_requests_total counter");
        for ((method, route), m) in routes.iter() {
            for (status, counter) in [
                ("2xx", &m.requests_success),
                ("4xx", &m.requests_client_error),
                ("5xx", &m.requests_server_error),
            ] {
                let _ = writeln!(
                    output,
                    "podium_http_requests_total{{method=\"{method}\",route=\"{route}\",status=\"{status}\"}} {}",
                    counter.load(Ordering::Relaxed)
                );
            }
        }

        let _ = writeln!(
            output,
            "# HELP podium_http_request_duration_seconds HTTP request latency"
        );
        let _ = writeln!(
            output,
            "# TYPE podium_http_request_duration_seconds histogram"
        );
        for ((method, route), m) in routes.iter() {
            for (i, &boundary) in LATENCY_BUCKET_BOUNDARIES_MS.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "podium_http_request_duration_seconds_bucket{{method=\"{method}\",route=\"{route}\",le=\"{}\"}} {}",
                    boundary as f64 / 1000.0,
                    m.latency_buckets[i].load(Ordering::Relaxed)
                );
            }
            let total = m.requests_total.load(Ordering::Relaxed);
            let _ = writeln!(
                output,
                "podium_http_request_duration_seconds_bucket{{method=\"{method}\",route=\"{route}\",le=\"+Inf\"}} {total}"
            );
            let _ = writeln!(
                output,
                "podium_http_request_duration_seconds_sum{{method=\"{method}\",route=\"{route}\"}} {}",
                m.latency_sum_us.load(Ordering::Relaxed) as f64 / 1_000_000.0
            );
            let _ = writeln!(
                output,
                "podium_http_request_duration_seconds_count{{method=\"{method}\",route=\"{route}\"}} {total}"
            );
        }

        output
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static API_METRICS: OnceLock<ApiMetrics> = OnceLock::new();

/// Global metrics instance
pub fn api_metrics() -> &'static ApiMetrics {
    API_METRICS.get_or_init(ApiMetrics::new)
}

/// Middleware recording per-route request metrics
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Route template, so player ids don't explode label cardinality
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());

    let response = next.run(request).await;

    if let Some(route) = route
        && route != "/metrics"
    {
        let latency_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        api_metrics().record_request(&method, &route, response.status().as_u16(), latency_us);
    }

    response
}
