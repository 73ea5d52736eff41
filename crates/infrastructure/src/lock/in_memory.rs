use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use scheduler_core::time::{Clock, SystemClock};
use scheduler_core::traits::LockProvider;
use scheduler_core::SchedulerResult;

/// 进程内的锁
///
/// 只在同一个进程内互斥. 设置了过期时间时, 超时未释放的锁可以被重新获取.
pub struct InMemoryLockProvider {
    locks: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLockProvider {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            ttl,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn is_live(&self, acquired_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.ttl.map_or(true, |ttl| now - acquired_at < ttl)
    }
}

impl Default for InMemoryLockProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl LockProvider for InMemoryLockProvider {
    async fn acquire(&self, key: &str) -> SchedulerResult<bool> {
        let now = self.clock.now();
        let mut locks = self.locks.lock().await;
        if let Some(acquired_at) = locks.get(key) {
            if self.is_live(*acquired_at, now) {
                debug!(lock = key, "锁已被持有");
                return Ok(false);
            }
            debug!(lock = key, "锁已过期, 重新获取");
        }
        locks.insert(key.to_string(), now);
        Ok(true)
    }

    async fn release(&self, key: &str) -> SchedulerResult<()> {
        self.locks.lock().await.remove(key);
        Ok(())
    }

    async fn is_acquired(&self, key: &str) -> SchedulerResult<bool> {
        let now = self.clock.now();
        Ok(self
            .locks
            .lock()
            .await
            .get(key)
            .is_some_and(|acquired_at| self.is_live(*acquired_at, now)))
    }
}
