//! Precondition retry guard.
//!
//! UI actions routinely need their target brought into the right state first
//! (chat focused, pane open). [`guarded`] runs a precondition check a bounded
//! number of times and only then hands the target to the wrapped operation,
//! so the operation never observes an unsatisfied precondition.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::{SiphonError, SiphonResult};

/// Attempt bound and pacing for a precondition check.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Runs `op` once `check` confirms the precondition on `target`.
///
/// `check` is attempted up to `policy.max_attempts` times with a fixed delay
/// between attempts. `Ok(false)` is retried; an `Err` from `check` propagates
/// immediately, unretried. When every attempt comes back false the call fails
/// with [`SiphonError::PreconditionFailed`] and `op` is never invoked.
pub async fn guarded<T, C, CF, O, OF, R>(
    op_name: &str,
    target_label: &str,
    target: T,
    policy: RetryPolicy,
    mut check: C,
    op: O,
) -> SiphonResult<R>
where
    T: Clone,
    C: FnMut(T) -> CF,
    CF: Future<Output = SiphonResult<bool>>,
    O: FnOnce(T) -> OF,
    OF: Future<Output = SiphonResult<R>>,
{
    for attempt in 1..=policy.max_attempts {
        if check(target.clone()).await? {
            return op(target).await;
        }
        warn!(
            "Precondition for {} on {} not met (attempt {}/{})",
            op_name, target_label, attempt, policy.max_attempts
        );
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(SiphonError::PreconditionFailed {
        op: op_name.to_string(),
        target: target_label.to_string(),
        attempts: policy.max_attempts,
    })
}
