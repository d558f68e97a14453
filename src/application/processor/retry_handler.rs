//! Bounded retries with exponential backoff for ledger and node calls

use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::config::RetryConfig;
use crate::utils::logging;

/// Retries an operation a fixed number of times before giving up
#[derive(Debug, Clone)]
pub struct RetryHandler {
    max_attempts: u32,
    base_delay_ms: u64,
}

impl RetryHandler {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `operation` until it succeeds or `max_attempts` is reached,
    /// returning the last error on exhaustion
    pub async fn execute_with_retry<F, Fut, T, E>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_with_retry_if(operation_name, operation, |_| true)
            .await
    }

    /// Like `execute_with_retry`, but gives up at once on errors for which
    /// `retryable` is false
    pub async fn execute_with_retry_if<F, Fut, T, E, P>(
        &self,
        operation_name: &str,
        operation: F,
        retryable: P,
    ) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        logging::log_info(&format!(
                            "{} succeeded after {} attempts",
                            operation_name, attempt
                        ));
                    }
                    return Ok(result);
                }
                Err(e) if !retryable(&e) => {
                    logging::log_error(&format!(
                        "{} failed and will not be retried: {}",
                        operation_name, e
                    ));
                    return Err(e);
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        logging::log_error(&format!(
                            "{} failed after {} attempts: {}",
                            operation_name, attempt, e
                        ));
                        return Err(e);
                    }

                    let delay = self.calculate_delay(attempt);
                    logging::log_warning(&format!(
                        "{} failed (attempt {}/{}): {}. Retrying in {}ms",
                        operation_name, attempt, self.max_attempts, e, delay
                    ));

                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    /// Calculate exponential backoff delay
    fn calculate_delay(&self, attempt: u32) -> u64 {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        self.base_delay_ms.saturating_mul(factor)
    }
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryHandler {
        RetryHandler::new(RetryConfig {
            max_attempts,
            base_delay_ms: 1,
        })
    }

    #[test]
    fn backoff_doubles() {
        let handler = RetryHandler::new(RetryConfig {
            max_attempts: 5,
            base_delay_ms: 500,
        });
        assert_eq!(handler.calculate_delay(1), 500);
        assert_eq!(handler.calculate_delay(2), 1000);
        assert_eq!(handler.calculate_delay(3), 2000);
    }

    #[tokio::test]
    async fn recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = fast(3)
            .execute_with_retry("listunspent", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("connection refused ({})", n))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = fast(2)
            .execute_with_retry("transaction_spend", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("database unavailable".to_string())
            })
            .await;

        assert_eq!(result, Err("database unavailable".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = fast(5)
            .execute_with_retry_if(
                "transaction_spend",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("state_conflict".to_string())
                },
                |e: &String| !e.starts_with("state_conflict"),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        assert_eq!(fast(0).max_attempts(), 1);
    }
}
