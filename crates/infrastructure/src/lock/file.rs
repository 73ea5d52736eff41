use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use scheduler_core::time::{Clock, SystemClock};
use scheduler_core::traits::LockProvider;
use scheduler_core::{SchedulerResult, TransportError};

/// 基于文件的锁
///
/// 每个键对应目录下的一个 `.lock` 文件, 通过 `create_new` 获取,
/// 因此同一目录下的多个进程之间也互斥. 文件内容是获取时间.
pub struct FileLockProvider {
    directory: PathBuf,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl FileLockProvider {
    pub fn new<P: AsRef<Path>>(directory: P, ttl: Option<Duration>) -> SchedulerResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory).map_err(|err| {
            TransportError::backend_with_source(
                format!("无法创建锁目录 {}", directory.display()),
                err,
            )
        })?;
        Ok(Self {
            directory,
            ttl,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn file_for(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        self.directory.join(format!("{sanitized}.lock"))
    }

    /// 锁文件存在且未过期; 内容无法解析时按未过期处理
    async fn is_live(&self, path: &Path) -> SchedulerResult<bool> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(lock_error("读取锁文件失败", path, err)),
        };

        let Some(ttl) = self.ttl else {
            return Ok(true);
        };
        match DateTime::parse_from_rfc3339(content.trim()) {
            Ok(acquired_at) => Ok(self.clock.now() - acquired_at.with_timezone(&Utc) < ttl),
            Err(err) => {
                warn!(file = %path.display(), error = %err, "锁文件内容无效");
                Ok(true)
            }
        }
    }

    async fn try_create(&self, path: &Path) -> SchedulerResult<bool> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(lock_error("创建锁文件失败", path, err)),
        };
        file.write_all(self.clock.now().to_rfc3339().as_bytes())
            .await
            .map_err(|err| lock_error("写入锁文件失败", path, err))?;
        Ok(true)
    }
}

fn lock_error(message: &str, path: &Path, err: std::io::Error) -> scheduler_core::SchedulerError {
    TransportError::backend_with_source(format!("{message}: {}", path.display()), err).into()
}

#[async_trait]
impl LockProvider for FileLockProvider {
    async fn acquire(&self, key: &str) -> SchedulerResult<bool> {
        let path = self.file_for(key);
        if self.try_create(&path).await? {
            return Ok(true);
        }
        if self.is_live(&path).await? {
            debug!(lock = key, "锁已被持有");
            return Ok(false);
        }

        debug!(lock = key, "锁已过期, 重新获取");
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(lock_error("删除过期锁文件失败", &path, err)),
        }
        self.try_create(&path).await
    }

    async fn release(&self, key: &str) -> SchedulerResult<()> {
        let path = self.file_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(lock_error("删除锁文件失败", &path, err)),
        }
    }

    async fn is_acquired(&self, key: &str) -> SchedulerResult<bool> {
        self.is_live(&self.file_for(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scheduler_core::time::FixedClock;

    #[tokio::test]
    async fn test_lock_is_shared_between_providers() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileLockProvider::new(dir.path(), None).unwrap();
        let second = FileLockProvider::new(dir.path(), None).unwrap();

        assert!(first.acquire("_scheduler_schedule_foo").await.unwrap());
        assert!(!second.acquire("_scheduler_schedule_foo").await.unwrap());
        assert!(second.is_acquired("_scheduler_schedule_foo").await.unwrap());

        first.release("_scheduler_schedule_foo").await.unwrap();
        assert!(second.acquire("_scheduler_schedule_foo").await.unwrap());
        // 释放不存在的锁不报错
        first.release("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLockProvider::new(dir.path(), None).unwrap();
        assert!(lock.acquire("../escape/attempt").await.unwrap());
        assert!(dir.path().join(".._escape_attempt.lock").exists());
    }

    #[tokio::test]
    async fn test_expired_lock_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let lock = FileLockProvider::new(dir.path(), Some(Duration::seconds(60)))
            .unwrap()
            .with_clock(clock.clone());

        assert!(lock.acquire("foo").await.unwrap());
        assert!(!lock.acquire("foo").await.unwrap());

        clock.advance(Duration::seconds(61));
        assert!(!lock.is_acquired("foo").await.unwrap());
        assert!(lock.acquire("foo").await.unwrap());
        assert!(lock.is_acquired("foo").await.unwrap());
    }
}
