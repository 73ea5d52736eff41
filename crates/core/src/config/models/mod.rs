pub mod app_config;
pub mod scheduler_worker;
pub mod task_definition;
pub mod transport_lock;

pub use app_config::AppConfig;
pub use scheduler_worker::{ClockConfig, SchedulerConfig, WorkerConfig};
pub use task_definition::TaskDefinition;
pub use transport_lock::{LockConfig, LockProviderKind, TransportConfig};
