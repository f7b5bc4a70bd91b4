//! Operation metrics recording.

use std::sync::Arc;
use std::time::Duration;

/// Records one metric sample per engine or administration call.
///
/// Called synchronously on every call path, success or no-op, regardless of
/// whether the enclosing transaction later commits.
pub trait MetricsRecorder: Send + Sync {
    /// Record an operation's name, elapsed duration, and affected-row count.
    fn record(&self, operation: &str, elapsed: Duration, count: u64);
}

/// A recorder that drops every sample; the default when none is supplied.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn record(&self, _operation: &str, _elapsed: Duration, _count: u64) {}
}

/// The no-op recorder as a shared trait object.
pub fn noop() -> Arc<dyn MetricsRecorder> {
    Arc::new(NoopMetrics)
}
