use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Process-local request counters, served at `/debug/vars`.
#[derive(Debug, Default)]
pub struct Metrics {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    processing_time_us: AtomicU64,
    in_flight: AtomicI64,
    by_status: Mutex<BTreeMap<u16, u64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub version: &'static str,
    pub timestamp: i64,
    pub total_requests_received: u64,
    pub total_responses_sent: u64,
    #[serde(rename = "total_processing_time_μs")]
    pub total_processing_time_us: u64,
    pub total_responses_sent_by_status: BTreeMap<String, u64>,
    pub in_flight: i64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn request_started(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    fn response_sent(&self, status: u16, elapsed_us: u64) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.processing_time_us.fetch_add(elapsed_us, Ordering::Relaxed);
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        let mut by_status = self.by_status.lock().unwrap_or_else(PoisonError::into_inner);
        *by_status.entry(status).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_status = self.by_status.lock().unwrap_or_else(PoisonError::into_inner);
        MetricsSnapshot {
            version: env!("CARGO_PKG_VERSION"),
            timestamp: chrono::Utc::now().timestamp(),
            total_requests_received: self.requests_received.load(Ordering::Relaxed),
            total_responses_sent: self.responses_sent.load(Ordering::Relaxed),
            total_processing_time_us: self.processing_time_us.load(Ordering::Relaxed),
            total_responses_sent_by_status: by_status
                .iter()
                .map(|(status, count)| (status.to_string(), *count))
                .collect(),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }
}

/// Outermost pipeline stage: counts every request and the status it ended with.
pub async fn track_metrics(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    metrics.request_started();

    let response = next.run(request).await;

    let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    metrics.response_sent(response.status().as_u16(), elapsed_us);
    response
}
