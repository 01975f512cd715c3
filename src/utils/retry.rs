use std::time::Duration;
use tokio::time::sleep;

use crate::error::DomainError;

// ============================================================================
// Optimistic Commit Retry
// ============================================================================
//
// Two stores deciding on the same order touch disjoint item rows but both
// recompute total_amount; the loser of that race gets a version Conflict from
// storage. The fix is to re-read and re-apply, not to fail the caller, so
// mutating use cases run their read-validate-commit sequence through this
// helper. Only version conflicts are retried; every other error is final.
//
// ============================================================================

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

/// Run a read-validate-commit closure, retrying on version conflicts. The
/// closure re-reads fresh state on every attempt.
pub async fn commit_with_retries<F, Fut, T>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, DomainError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "Commit succeeded after version-conflict retry");
                }
                return Ok(value);
            }
            Err(DomainError::Conflict(message)) if is_version_conflict(&message) => {
                if attempt >= policy.max_attempts {
                    tracing::warn!(
                        attempt,
                        "Giving up after repeated version conflicts"
                    );
                    return Err(DomainError::Conflict(message));
                }
                tracing::debug!(attempt, "Version conflict, re-reading and retrying");
                sleep(policy.delay).await;
            }
            Err(other) => return Err(other),
        }
    }
}

fn is_version_conflict(message: &str) -> bool {
    message.starts_with(crate::storage::VERSION_CONFLICT_PREFIX)
}
