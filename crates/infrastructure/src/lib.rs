//! 调度器的基础设施: 任务存储, 锁与消息总线

pub mod in_memory_bus;
pub mod lock;
pub mod transport;

pub use in_memory_bus::InMemoryMessageBus;
pub use lock::{create_lock_provider, FileLockProvider, InMemoryLockProvider};
pub use transport::{
    Dsn, FailoverTransport, FilesystemTransport, InMemoryTransport, LazyTransport,
    LongTailTransport, RoundRobinTransport, TransportFactory,
};
