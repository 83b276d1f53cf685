//! Failure capture for operator diagnosis.
//!
//! Records unhandled error chains keyed by request id into an unbounded,
//! duplicate-tolerant set. Purely diagnostic: recording never affects the
//! request outcome and never propagates its own failures.

use dashmap::DashSet;

use crate::error::AppError;

/// Concurrency-safe collection of formatted failure chains.
pub struct FailureRecorder {
    entries: DashSet<String>,
}

impl Default for FailureRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureRecorder {
    pub fn new() -> Self {
        Self {
            entries: DashSet::new(),
        }
    }

    /// Format the error and its full cause chain and store the result.
    /// Also forwards to the logging layer.
    pub fn record(&self, request_id: &str, error: &AppError) {
        let formatted = Self::format_failure(request_id, error);
        tracing::error!(request_id, failure = %formatted, "Captured failure");
        self.entries.insert(formatted);
    }

    /// Whether any failure has been captured since startup.
    pub fn has_failures(&self) -> bool {
        !self.entries.is_empty()
    }

    /// All captured failures, for the administrative surface.
    pub fn list_failures(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.clone()).collect()
    }

    /// Render one failure line: request id, error, cause chain, and for
    /// exhausted proxy chains the per-upstream reasons.
    fn format_failure(request_id: &str, error: &AppError) -> String {
        let mut out = format!("request {request_id}: {error}");

        if let AppError::UpstreamExhausted { attempts, .. } = error {
            for attempt in attempts {
                out.push_str(&format!("; upstream {attempt}"));
            }
        }

        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            out.push_str(&format!("; caused by: {cause}"));
            source = cause.source();
        }
        out
    }
}
