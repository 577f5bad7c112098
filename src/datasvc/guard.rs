use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use super::{DataCommand, DataService, Row};
use crate::error::{AppError, MSG_TIMEOUT};

/// Wraps a data service with a per-call timeout and a bounded retry for reads.
/// Writes are attempted once. A timed-out call is reported as [`AppError::Timeout`]; the
/// underlying query is not cancelled on the database side.
pub struct GuardedDataService<D> {
    inner: D,
    timeout: Option<Duration>,
    read_retries: u32,
    backoff: Duration,
}

impl<D: DataService> GuardedDataService<D> {
    pub fn new(inner: D) -> Self {
        Self { inner, timeout: None, read_retries: 0, backoff: Duration::from_millis(100) }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    pub fn with_read_retries(mut self, retries: u32) -> Self {
        self.read_retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn attempt(&self, cmd: &DataCommand) -> Result<Vec<Row>> {
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.inner.execute(cmd)).await {
                Ok(res) => res,
                Err(_) => Err(AppError::timeout("timeout", MSG_TIMEOUT).into()),
            },
            None => self.inner.execute(cmd).await,
        }
    }
}

#[async_trait]
impl<D: DataService> DataService for GuardedDataService<D> {
    async fn execute(&self, cmd: &DataCommand) -> Result<Vec<Row>> {
        let attempts = if cmd.action.is_read() { self.read_retries + 1 } else { 1 };
        let mut n = 0;
        loop {
            n += 1;
            match self.attempt(cmd).await {
                Ok(rows) => return Ok(rows),
                Err(e) if n < attempts => {
                    warn!(target: "datasvc", entity = %cmd.entity, action = %cmd.action, attempt = n, "read failed, retrying: {}", e);
                    tokio::time::sleep(self.backoff * n).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasvc::{Action, Entity, Params};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        fail_first: u32,
        calls: AtomicU32,
        delay: Duration,
    }

    #[async_trait]
    impl DataService for Flaky {
        async fn execute(&self, _cmd: &DataCommand) -> Result<Vec<Row>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if n < self.fail_first { anyhow::bail!("connection reset") }
            Ok(vec![serde_json::json!({"ok": true})])
        }
    }

    fn flaky(fail_first: u32, delay_ms: u64) -> Flaky {
        Flaky { fail_first, calls: AtomicU32::new(0), delay: Duration::from_millis(delay_ms) }
    }

    fn cmd(action: Action) -> DataCommand { DataCommand::new(Entity::Expedientes, action, Params::new()) }

    #[tokio::test]
    async fn reads_retry_up_to_the_bound() {
        let svc = GuardedDataService::new(flaky(2, 0)).with_read_retries(2).with_backoff(Duration::from_millis(1));
        assert!(svc.execute(&cmd(Action::SelectAll)).await.is_ok());
        assert_eq!(svc.inner.calls.load(Ordering::SeqCst), 3);

        let svc = GuardedDataService::new(flaky(2, 0)).with_read_retries(1).with_backoff(Duration::from_millis(1));
        assert!(svc.execute(&cmd(Action::SelectAll)).await.is_err());
        assert_eq!(svc.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn writes_are_never_retried() {
        let svc = GuardedDataService::new(flaky(1, 0)).with_read_retries(5).with_backoff(Duration::from_millis(1));
        assert!(svc.execute(&cmd(Action::Insert)).await.is_err());
        assert_eq!(svc.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_become_timeouts() {
        let svc = GuardedDataService::new(flaky(0, 200)).with_timeout(Some(Duration::from_millis(20)));
        let err = svc.execute(&cmd(Action::Update)).await.unwrap_err();
        let app: AppError = err.into();
        assert!(matches!(app, AppError::Timeout { .. }));
    }

    #[tokio::test]
    async fn zero_timeout_means_unbounded() {
        let svc = GuardedDataService::new(flaky(0, 10)).with_timeout(Some(Duration::ZERO));
        assert!(svc.execute(&cmd(Action::Select)).await.is_ok());
    }
}
