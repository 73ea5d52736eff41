//! 日志配置
//!
//! 订阅器本身在二进制入口里初始化, 这里只负责配置的解析和校验.

pub mod log_config;
pub mod log_level;

pub use log_config::{LogConfig, OutputFormat};
pub use log_level::LogLevel;
