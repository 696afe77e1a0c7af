//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Total time budget across all attempts.
    pub deadline: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            deadline: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline,
            ..Default::default()
        }
    }
}

/// Runs `operation` until it succeeds or the deadline passes.
///
/// Returns the last error once the budget is spent. The final sleep is
/// clipped so the call never overshoots the deadline by more than one
/// attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    log::info!("{} succeeded after {} attempts", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                let elapsed = started.elapsed();
                if elapsed >= config.deadline {
                    log::error!(
                        "{} failed after {} attempts ({:?}): {}",
                        operation_name, attempt, elapsed, e
                    );
                    return Err(e);
                }

                let jitter = rand::rng().random_range(0.5..1.5);
                let remaining = config.deadline - elapsed;
                let sleep_for =
                    Duration::from_secs_f64(delay.as_secs_f64() * jitter).min(remaining);

                log::debug!(
                    "{} attempt {} failed: {}; retrying in {}ms",
                    operation_name,
                    attempt,
                    e,
                    sleep_for.as_millis()
                );

                tokio::time::sleep(sleep_for).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}
