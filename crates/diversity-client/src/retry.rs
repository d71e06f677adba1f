//! Linear back-off for idempotent calls

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Wait before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }

    /// Run `op` until it succeeds or the retries are used up.
    ///
    /// `sleep` is supplied by the caller so the same policy works on tokio and
    /// in the browser.
    pub async fn run<T, Op, Fut, Sleep, SleepFut>(
        &self,
        label: &str,
        mut op: Op,
        mut sleep: Sleep,
    ) -> Result<T, ClientError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
        Sleep: FnMut(Duration) -> SleepFut,
        SleepFut: Future<Output = ()>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        label,
                        attempt = attempt + 1,
                        max = self.max_retries,
                        error = %e,
                        "Request failed, retrying in {:?}",
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::RefCell;

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(3));
    }

    #[test]
    fn test_succeeds_after_failures() {
        let calls = RefCell::new(0);
        let slept = RefCell::new(Vec::new());
        let result = block_on(RetryPolicy::default().run(
            "catalog",
            || {
                *calls.borrow_mut() += 1;
                let n = *calls.borrow();
                async move {
                    if n < 3 {
                        Err(ClientError::Transport("down".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            |d| {
                slept.borrow_mut().push(d);
                async {}
            },
        ));
        assert_eq!(result, Ok(3));
        assert_eq!(
            *slept.borrow(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let calls = RefCell::new(0u32);
        let result: Result<(), _> = block_on(RetryPolicy::default().run(
            "catalog",
            || {
                *calls.borrow_mut() += 1;
                async { Err(ClientError::Transport("down".into())) }
            },
            |_| async {},
        ));
        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 4);
    }
}
