//! Send the corpus at a fixed concurrency for a fixed duration.
//!
//! Every worker draws from the same [`MessagesRing`], so the run as a whole
//! replays the corpus in strict round-robin order regardless of how many
//! workers there are. An optional QPS cap paces each worker evenly; there is
//! no adaptive rate discovery.

use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderValue, CONNECTION};
use http::StatusCode;
use sketches_ddsketch::DDSketch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::corpus::ring::MessagesRing;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::model::request::ScanRequest;

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// How long to keep sending.
    pub duration: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Overall requests per second cap; 0 means unlimited.
    pub qps: u32,
    /// Status that counts as a successful scan.
    pub success_status: StatusCode,
    /// Close the connection after every request.
    pub disable_keep_alive: bool,
}

impl RunOptions {
    /// Interval between two requests of one worker, if a QPS cap is set.
    fn pace(&self) -> Option<Duration> {
        (self.qps > 0).then(|| Duration::from_secs_f64(self.concurrency as f64 / self.qps as f64))
    }
}

/// What happened during a run.
#[derive(Default)]
pub struct RunSummary {
    /// Requests dispatched.
    pub requests: u64,
    /// Responses with the success status.
    pub successes: u64,
    /// Responses with any other status.
    pub failures: u64,
    /// Requests that got no response (connect error, timeout, ...).
    pub errors: u64,
    /// Bytes of request bodies dispatched.
    pub bytes_sent: u64,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    /// Latency of requests that got a response, in seconds.
    pub latency: DDSketch,
}

impl RunSummary {
    fn merge(&mut self, other: &RunSummary) {
        self.requests += other.requests;
        self.successes += other.successes;
        self.failures += other.failures;
        self.errors += other.errors;
        self.bytes_sent += other.bytes_sent;
        if let Err(e) = self.latency.merge(&other.latency) {
            warn!(error = ?e, "Could not merge latency sketch");
        }
    }

    /// Requests per second over the whole run.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.requests as f64 / secs
        } else {
            0.0
        }
    }

    /// Latency quantile, if any response was recorded.
    pub fn latency_quantile(&self, q: f64) -> Option<Duration> {
        self.latency
            .quantile(q)
            .ok()
            .flatten()
            .map(Duration::from_secs_f64)
    }

    /// Mean latency, if any response was recorded.
    pub fn latency_avg(&self) -> Option<Duration> {
        let count = self.latency.count();
        let sum = self.latency.sum()?;
        (count > 0).then(|| Duration::from_secs_f64(sum / count as f64))
    }
}

impl std::fmt::Debug for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSummary")
            .field("requests", &self.requests)
            .field("successes", &self.successes)
            .field("failures", &self.failures)
            .field("errors", &self.errors)
            .field("bytes_sent", &self.bytes_sent)
            .field("elapsed", &self.elapsed)
            .field("latency_count", &self.latency.count())
            .finish()
    }
}

/// Build the HTTP client used by every worker.
pub fn build_client(options: &RunOptions) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(options.timeout);
    if options.disable_keep_alive {
        builder = builder.pool_max_idle_per_host(0);
    }
    Ok(builder.build()?)
}

/// Replay `ring` against its scan endpoint until `options.duration` elapses.
pub async fn run(
    ring: Arc<MessagesRing>,
    metrics: Metrics,
    options: &RunOptions,
) -> Result<RunSummary> {
    let client = build_client(options)?;
    let start = Instant::now();
    let deadline = start + options.duration;

    info!(
        uri = %ring.uri(),
        concurrency = options.concurrency,
        duration = ?options.duration,
        qps = options.qps,
        "Starting run"
    );

    let mut workers = JoinSet::new();
    for _ in 0..options.concurrency.max(1) {
        workers.spawn(worker(
            client.clone(),
            Arc::clone(&ring),
            metrics.clone(),
            deadline,
            options.clone(),
        ));
    }

    let mut summary = RunSummary::default();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(tally) => summary.merge(&tally),
            Err(e) => warn!(error = %e, "Worker task failed"),
        }
    }
    summary.elapsed = start.elapsed();

    info!(
        requests = summary.requests,
        successes = summary.successes,
        failures = summary.failures,
        errors = summary.errors,
        "Run finished"
    );
    Ok(summary)
}

async fn worker(
    client: reqwest::Client,
    ring: Arc<MessagesRing>,
    metrics: Metrics,
    deadline: Instant,
    options: RunOptions,
) -> RunSummary {
    let mut tally = RunSummary::default();
    let mut ticker = options.pace().map(|period| {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    loop {
        if let Some(ticker) = ticker.as_mut() {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut sleep => break,
            }
        }
        if Instant::now() >= deadline {
            break;
        }

        let request = ring.next_message();
        let detail = request.detail();
        metrics.report(detail);
        tally.requests += 1;
        tally.bytes_sent += detail.size as u64;

        let sent = Instant::now();
        tokio::select! {
            result = send(&client, request, options.disable_keep_alive) => match result {
                Ok(status) => {
                    let elapsed = sent.elapsed().as_secs_f64();
                    tally.latency.add(elapsed);
                    metrics.latency.observe(elapsed);
                    metrics.responses.with_label_values(&[status.as_str()]).inc();
                    if status == options.success_status {
                        tally.successes += 1;
                    } else {
                        tally.failures += 1;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Request failed");
                    metrics.errors.inc();
                    tally.errors += 1;
                }
            },
            _ = &mut sleep => break,
        }
    }

    tally
}

async fn send(
    client: &reqwest::Client,
    request: &ScanRequest,
    disable_keep_alive: bool,
) -> reqwest::Result<StatusCode> {
    let mut outbound = request.to_http();
    if disable_keep_alive {
        outbound
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("close"));
    }
    let response = client.execute(reqwest::Request::try_from(outbound)?).await?;
    Ok(response.status())
}
