/*!
 * Structured Tracing
 * Subscriber setup and per-pipeline spans using the tracing crate
 */

use crate::core::limits::SLOW_OPERATION_THRESHOLD;
use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - LOOPFS_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false when a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("LOOPFS_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
    installed
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one whole-file pipeline from first request to callback
pub struct PipelineSpan {
    span: tracing::Span,
    start: Instant,
    pipeline: &'static str,
    trace_id: String,
}

impl PipelineSpan {
    pub fn new(pipeline: &'static str, path: &std::path::Path) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "pipeline",
            trace_id = %trace_id,
            pipeline = pipeline,
            path = %path.display(),
            bytes = tracing::field::Empty,
            requests = tracing::field::Empty,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        let _entered = span.enter();
        debug!(pipeline, "pipeline started");
        drop(_entered);

        Self {
            span,
            start: Instant::now(),
            pipeline,
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Record bytes transferred and requests issued
    pub fn record_progress(&self, bytes: u64, requests: u64) {
        self.span.record("bytes", bytes);
        self.span.record("requests", requests);
    }

    pub fn record_result(&self, success: bool) {
        self.span
            .record("result", if success { "success" } else { "error" });
    }

    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
        self.span.record("result", "error");
    }
}

impl Drop for PipelineSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration > SLOW_OPERATION_THRESHOLD {
            warn!(
                trace_id = %self.trace_id,
                pipeline = self.pipeline,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow pipeline detected"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                pipeline = self.pipeline,
                duration_us = duration.as_micros() as u64,
                "pipeline completed"
            );
        }
    }
}
