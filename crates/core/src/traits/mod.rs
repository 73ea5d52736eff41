pub mod lock;
pub mod message_bus;
pub mod middleware;
pub mod notifier;
pub mod scheduler;
pub mod transport;

pub use lock::*;
pub use message_bus::*;
pub use middleware::*;
pub use notifier::*;
pub use scheduler::*;
pub use transport::*;
