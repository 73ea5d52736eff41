//! 建议锁实现

pub mod file;
pub mod in_memory;

use std::sync::Arc;

use scheduler_core::config::{LockConfig, LockProviderKind};
use scheduler_core::traits::LockProvider;
use scheduler_core::{SchedulerError, SchedulerResult};

pub use file::FileLockProvider;
pub use in_memory::InMemoryLockProvider;

/// 根据配置创建锁
pub fn create_lock_provider(config: &LockConfig) -> SchedulerResult<Arc<dyn LockProvider>> {
    let ttl = config.ttl_secs.map(|secs| chrono::Duration::seconds(secs as i64));
    match config.provider {
        LockProviderKind::Memory => Ok(Arc::new(InMemoryLockProvider::new(ttl))),
        LockProviderKind::File => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| SchedulerError::config_error("文件锁需要配置 lock.path"))?;
            Ok(Arc::new(FileLockProvider::new(path, ttl)?))
        }
    }
}
