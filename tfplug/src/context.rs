//! Request-scoped cancellation and deadlines
//!
//! Every trait method takes a Context first. The acceptance harness derives
//! one Context per run with the run deadline attached, and checks it between
//! lifecycle calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same cancellation signal, expiring `timeout` from now. An earlier
    /// deadline already on the context is kept. A timeout too large to
    /// represent leaves the context without a new deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self;
        };
        Self {
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
            ..self
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every clone of it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn timeout_expires() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));
        assert!(!ctx.is_cancelled());

        sleep(Duration::from_millis(100)).await;
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn cancel_reaches_clones() {
        let ctx = Context::new();
        let derived = ctx.clone().with_timeout(Duration::from_secs(60));

        ctx.cancel();
        assert!(derived.is_cancelled());
    }

    #[test]
    fn earlier_deadline_wins() {
        let ctx = Context::new().with_timeout(Duration::from_secs(1));
        let first = ctx.deadline();

        let ctx = ctx.with_timeout(Duration::from_secs(600));
        assert_eq!(ctx.deadline(), first);
        assert!(Context::new().deadline().is_none());
    }

    #[test]
    fn unrepresentable_timeout_sets_no_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_secs(u64::MAX));
        assert!(ctx.deadline().is_none());
        assert!(!ctx.is_cancelled());

        let bounded = Context::new().with_timeout(Duration::from_secs(60));
        let kept = bounded.clone().with_timeout(Duration::MAX);
        assert_eq!(kept.deadline(), bounded.deadline());
    }
}
