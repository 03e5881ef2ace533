//! Prometheus instruments for a benchmark run.

use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};

use crate::error::Result;
use crate::model::request::BodyDetail;

/// Record one dispatched request's body metadata.
///
/// The size always goes into `sizes`; `with_headers` is incremented only for
/// requests that carry envelope headers.
pub fn report(detail: BodyDetail, with_headers: &IntCounter, sizes: &Histogram) {
    sizes.observe(detail.size as f64);
    if detail.has_headers {
        with_headers.inc();
    }
}

/// All instruments of a run, registered in their own registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Requests dispatched with envelope headers.
    pub with_headers: IntCounter,
    /// Body sizes of dispatched requests, in bytes.
    pub body_size: Histogram,
    /// Response latency in seconds, for requests that got a response.
    pub latency: Histogram,
    /// Responses by status code.
    pub responses: IntCounterVec,
    /// Requests that failed before a response arrived.
    pub errors: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let with_headers = IntCounter::new(
            "scanbench_requests_with_headers_total",
            "Requests dispatched with X-Inet/X-Helo/X-Mailfrom/X-Rcptto headers",
        )?;
        // 1 KB .. ~32 MB
        let body_size = Histogram::with_opts(
            HistogramOpts::new("scanbench_body_size_bytes", "Body size of dispatched requests")
                .buckets(exponential_buckets(1000.0, 2.0, 16)?),
        )?;
        let latency = Histogram::with_opts(HistogramOpts::new(
            "scanbench_response_seconds",
            "Time from dispatch to response",
        ))?;
        let responses = IntCounterVec::new(
            Opts::new("scanbench_responses_total", "Responses by HTTP status"),
            &["status"],
        )?;
        let errors = IntCounter::new(
            "scanbench_request_errors_total",
            "Requests that failed without a response",
        )?;

        registry.register(Box::new(with_headers.clone()))?;
        registry.register(Box::new(body_size.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(responses.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        Ok(Self {
            registry,
            with_headers,
            body_size,
            latency,
            responses,
            errors,
        })
    }

    /// Record a request about to be dispatched.
    pub fn report(&self, detail: BodyDetail) {
        report(detail, &self.with_headers, &self.body_size);
    }

    /// Render all instruments in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("with_headers", &self.with_headers.get())
            .field("body_size_count", &self.body_size.get_sample_count())
            .field("errors", &self.errors.get())
            .finish_non_exhaustive()
    }
}
