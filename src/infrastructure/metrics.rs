//! Prometheus metrics for the scraper and consumer processes
//!
//! Counters and histograms are plain atomics (labelled families keep one
//! series per label set behind a mutex) rendered on demand in the text
//! exposition format. Each process serves its own registry on `/metrics`.

use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Default latency buckets in seconds, the usual Prometheus client defaults.
const DEFAULT_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Atomic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Atomic gauge
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fixed-bucket histogram over durations, stored in microseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Upper bounds in microseconds
    buckets: Vec<u64>,
    /// Non-cumulative count per bucket
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    #[must_use]
    pub fn with_buckets(bounds_secs: &[f64]) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let buckets: Vec<u64> = bounds_secs.iter().map(|s| (s * 1_000_000.0) as u64).collect();
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.sum.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        if let Some(i) = self.buckets.iter().position(|&bound| micros <= bound) {
            self.counts[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn write(&self, out: &mut String, name: &str, labels: &str) {
        let mut cumulative = 0;
        for (bound, count) in self.buckets.iter().zip(&self.counts) {
            cumulative += count.load(Ordering::Relaxed);
            #[allow(clippy::cast_precision_loss)]
            let le = *bound as f64 / 1_000_000.0;
            let _ = writeln!(out, "{name}_bucket{{{}}} {cumulative}", join_labels(labels, &format!("le=\"{le}\"")));
        }
        let total = self.count();
        let _ = writeln!(out, "{name}_bucket{{{}}} {total}", join_labels(labels, "le=\"+Inf\""));
        #[allow(clippy::cast_precision_loss)]
        let sum_secs = self.sum.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(out, "{name}_sum{} {sum_secs:.6}", wrap_labels(labels));
        let _ = writeln!(out, "{name}_count{} {total}", wrap_labels(labels));
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }
}

/// Counter family keyed by label values.
#[derive(Debug)]
pub struct CounterVec {
    label_names: &'static [&'static str],
    series: Mutex<BTreeMap<Vec<String>, u64>>,
}

impl CounterVec {
    #[must_use]
    pub const fn new(label_names: &'static [&'static str]) -> Self {
        Self {
            label_names,
            series: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn inc(&self, labels: &[&str]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[&str], n: u64) {
        debug_assert_eq!(labels.len(), self.label_names.len());
        let key = labels.iter().map(ToString::to_string).collect();
        let mut series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        *series.entry(key).or_insert(0) += n;
    }

    #[must_use]
    pub fn get(&self, labels: &[&str]) -> u64 {
        let key: Vec<String> = labels.iter().map(ToString::to_string).collect();
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        series.get(&key).copied().unwrap_or(0)
    }

    fn write(&self, out: &mut String, name: &str, help: &str) {
        write_header(out, name, help, "counter");
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        for (values, count) in series.iter() {
            let _ = writeln!(out, "{name}{} {count}", wrap_labels(&format_labels(self.label_names, values)));
        }
        let _ = writeln!(out);
    }
}

/// Histogram family keyed by label values.
#[derive(Debug)]
pub struct HistogramVec {
    label_names: &'static [&'static str],
    series: Mutex<BTreeMap<Vec<String>, Arc<Histogram>>>,
}

impl HistogramVec {
    #[must_use]
    pub const fn new(label_names: &'static [&'static str]) -> Self {
        Self {
            label_names,
            series: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn observe(&self, labels: &[&str], duration: Duration) {
        let key = labels.iter().map(ToString::to_string).collect();
        let histogram = {
            let mut series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(series.entry(key).or_default())
        };
        histogram.observe(duration);
    }

    #[must_use]
    pub fn count(&self, labels: &[&str]) -> u64 {
        let key: Vec<String> = labels.iter().map(ToString::to_string).collect();
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        series.get(&key).map_or(0, |h| h.count())
    }

    fn write(&self, out: &mut String, name: &str, help: &str) {
        write_header(out, name, help, "histogram");
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        for (values, histogram) in series.iter() {
            histogram.write(out, name, &format_labels(self.label_names, values));
        }
        let _ = writeln!(out);
    }
}

/// Anything that can render itself for a scrape of `/metrics`.
pub trait PrometheusRender: Send + Sync {
    fn to_prometheus(&self) -> String;
}

/// Page status label values.
pub mod page_status {
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
    pub const EMPTY: &str = "empty";
}

/// Metrics emitted while walking categories.
#[derive(Debug)]
pub struct ScraperMetrics {
    pub products_scraped: CounterVec,
    pub pages_processed: CounterVec,
    pub page_duration: HistogramVec,
    pub cloudflare_detections: Counter,
    pub duplicates_skipped: CounterVec,
}

impl Default for ScraperMetrics {
    fn default() -> Self {
        Self {
            products_scraped: CounterVec::new(&["category"]),
            pages_processed: CounterVec::new(&["category", "status"]),
            page_duration: HistogramVec::new(&["category"]),
            cloudflare_detections: Counter::default(),
            duplicates_skipped: CounterVec::new(&["category"]),
        }
    }
}

impl ScraperMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_page(&self, category: &str, status: &str) {
        self.pages_processed.inc(&[category, status]);
    }
}

impl PrometheusRender for ScraperMetrics {
    fn to_prometheus(&self) -> String {
        let mut out = String::with_capacity(2048);
        self.products_scraped
            .write(&mut out, "scraper_products_scraped_total", "Total number of products scraped");
        self.pages_processed
            .write(&mut out, "scraper_pages_processed_total", "Total number of pages processed");
        self.page_duration
            .write(&mut out, "scraper_page_duration_seconds", "Time spent processing each page");
        write_counter(
            &mut out,
            "scraper_cloudflare_detections_total",
            "Number of Cloudflare challenges detected",
            self.cloudflare_detections.get(),
        );
        self.duplicates_skipped
            .write(&mut out, "scraper_duplicates_skipped_total", "Number of duplicate products skipped");
        out
    }
}

/// Message status label values.
pub mod message_status {
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
}

/// Metrics emitted while draining the queue into storage.
#[derive(Debug)]
pub struct ConsumerMetrics {
    pub messages_processed: CounterVec,
    pub processing_duration: Histogram,
    pub database_inserts: CounterVec,
    pub queue_depth: Gauge,
}

impl Default for ConsumerMetrics {
    fn default() -> Self {
        Self {
            messages_processed: CounterVec::new(&["status"]),
            processing_duration: Histogram::default(),
            database_inserts: CounterVec::new(&["status"]),
            queue_depth: Gauge::default(),
        }
    }
}

impl ConsumerMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl PrometheusRender for ConsumerMetrics {
    fn to_prometheus(&self) -> String {
        let mut out = String::with_capacity(1024);
        self.messages_processed
            .write(&mut out, "consumer_messages_processed_total", "Total number of messages processed");
        write_header(
            &mut out,
            "consumer_message_processing_duration_seconds",
            "Time spent processing each message",
            "histogram",
        );
        self.processing_duration
            .write(&mut out, "consumer_message_processing_duration_seconds", "");
        let _ = writeln!(out);
        self.database_inserts
            .write(&mut out, "consumer_database_inserts_total", "Total number of database inserts");
        write_gauge(&mut out, "consumer_queue_depth", "Current depth of the queue", self.queue_depth.get());
        out
    }
}

/// Serve `GET /metrics` until `cancel` fires.
pub async fn serve_metrics(
    addr: SocketAddr,
    metrics: Arc<dyn PrometheusRender>,
    cancel: CancellationToken,
) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {addr}"))?;
    info!("📊 Metrics server listening on http://{addr}/metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("Metrics server failed")
}

/// Spawn [`serve_metrics`] in the background, logging a failure instead of propagating it.
pub fn spawn_metrics_server(
    addr: SocketAddr,
    metrics: Arc<dyn PrometheusRender>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve_metrics(addr, metrics, cancel).await {
            error!("Metrics server error: {e:#}");
        }
    })
}

async fn metrics_handler(State(metrics): State<Arc<dyn PrometheusRender>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        metrics.to_prometheus(),
    )
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    write_header(out, name, help, "counter");
    let _ = writeln!(out, "{name} {value}");
    let _ = writeln!(out);
}

fn write_gauge(out: &mut String, name: &str, help: &str, value: u64) {
    write_header(out, name, help, "gauge");
    let _ = writeln!(out, "{name} {value}");
    let _ = writeln!(out);
}

fn format_labels(names: &[&str], values: &[String]) -> String {
    names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{name}=\"{}\"", escape_label(value)))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn wrap_labels(labels: &str) -> String {
    if labels.is_empty() {
        String::new()
    } else {
        format!("{{{labels}}}")
    }
}

fn join_labels(labels: &str, extra: &str) -> String {
    if labels.is_empty() {
        extra.to_string()
    } else {
        format!("{labels},{extra}")
    }
}
