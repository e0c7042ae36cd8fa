//! Whole-harvest time budget.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::HarvestError;

/// Stand-in for budgets too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Wall-clock budget for one whole harvest, shared by the cascade and the
/// paginator. Every network call runs under the time that is left.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now()
                .checked_add(budget)
                .unwrap_or_else(|| Instant::now() + FAR_FUTURE),
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Runs `fut`, giving up with [`HarvestError::DeadlineExceeded`] once the
    /// budget is spent.
    ///
    /// # Errors
    ///
    /// Whatever `fut` returns, or `DeadlineExceeded` on timeout.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, HarvestError>
    where
        F: Future<Output = Result<T, HarvestError>>,
    {
        tokio::time::timeout_at(self.at, fut)
            .await
            .unwrap_or(Err(HarvestError::DeadlineExceeded))
    }

    /// Sleeps for `pause`, cut short by the deadline.
    pub async fn sleep(&self, pause: Duration) {
        tokio::time::sleep(pause.min(self.remaining())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_times_out_after_budget() {
        let deadline = Deadline::after(Duration::from_millis(50));
        let result: Result<(), _> = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(HarvestError::DeadlineExceeded)));
        assert!(deadline.is_expired());
    }

    #[tokio::test]
    async fn run_passes_through_fast_results() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let value = deadline.run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(!deadline.is_expired());
    }

    #[test]
    fn huge_budget_does_not_overflow() {
        let deadline = Deadline::after(Duration::from_secs(u64::MAX));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() > Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn sleep_is_capped_by_remaining_budget() {
        let deadline = Deadline::after(Duration::from_millis(100));
        let start = Instant::now();
        deadline.sleep(Duration::from_secs(10)).await;
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
