//! Ordered strategy cascade.
//!
//! Strategies are tried once each, in priority order, and the first `Ok`
//! wins. Failures are logged and collected so the caller can tell a rate
//! limit or a missing account apart from plain "nothing parseable".

use std::fmt::Display;
use std::future::Future;

use crate::deadline::Deadline;
use crate::error::HarvestError;

#[derive(Debug)]
pub struct StrategyFailure<S> {
    pub strategy: S,
    pub error: HarvestError,
}

/// Every strategy failed (or the deadline hit before one succeeded).
#[derive(Debug)]
pub struct CascadeExhausted<S> {
    pub failures: Vec<StrategyFailure<S>>,
}

impl<S> CascadeExhausted<S> {
    #[must_use]
    pub fn rate_limited(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_rate_limited())
    }

    /// True when at least one strategy got a definitive 404 and none got a
    /// rate limit (a blocked request says nothing about existence).
    #[must_use]
    pub fn not_found(&self) -> bool {
        !self.rate_limited() && self.failures.iter().any(|f| f.error.is_not_found())
    }

    #[must_use]
    pub fn deadline_exceeded(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f.error, HarvestError::DeadlineExceeded))
    }
}

impl<S: Display> CascadeExhausted<S> {
    /// One-line summary, e.g. `"api: endpoint not found: ...; embedded: ..."`.
    #[must_use]
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.strategy, f.error))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Tries each strategy in `order` until one succeeds.
///
/// `label` names the step for logs (`"profile"`, `"page"`).
///
/// # Errors
///
/// Returns [`CascadeExhausted`] listing every failure when no strategy
/// produced a value.
pub async fn run_cascade<S, T, F, Fut>(
    label: &str,
    order: &[S],
    deadline: &Deadline,
    mut attempt: F,
) -> Result<(S, T), CascadeExhausted<S>>
where
    S: Copy + Display,
    F: FnMut(S) -> Fut,
    Fut: Future<Output = Result<T, HarvestError>>,
{
    let mut failures = Vec::new();

    for &strategy in order {
        if deadline.is_expired() {
            failures.push(StrategyFailure {
                strategy,
                error: HarvestError::DeadlineExceeded,
            });
            break;
        }

        match deadline.run(attempt(strategy)).await {
            Ok(value) => {
                tracing::debug!(step = label, %strategy, "strategy succeeded");
                return Ok((strategy, value));
            }
            Err(error) => {
                tracing::debug!(step = label, %strategy, error = %error, "strategy failed");
                let stop = matches!(error, HarvestError::DeadlineExceeded);
                failures.push(StrategyFailure { strategy, error });
                if stop {
                    break;
                }
            }
        }
    }

    tracing::warn!(
        step = label,
        attempts = failures.len(),
        "all extraction strategies failed"
    );
    Err(CascadeExhausted { failures })
}
