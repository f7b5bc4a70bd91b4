//! Post-commit cache refresh notification.

/// Notifies downstream policy caches that stored grants changed.
///
/// Fire-and-forget. The engine invokes this once per mutating call that
/// actually changed rows; implementations are expected to defer delivery
/// until the caller's transaction commits (the engine itself owns no
/// transaction boundaries). Absence of a publisher is legal — wiring passes
/// `None` and the call is skipped.
pub trait RefreshPublisher: Send + Sync {
    /// Register a refresh notification for delivery after commit.
    fn publish_after_commit(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recording(AtomicUsize);

    impl RefreshPublisher for Recording {
        fn publish_after_commit(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_publisher_invocations_are_counted() {
        let publisher = Recording::default();
        publisher.publish_after_commit();
        publisher.publish_after_commit();
        assert_eq!(publisher.0.load(Ordering::SeqCst), 2);
    }
}
