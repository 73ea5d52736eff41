//! 应用配置
//!
//! 加载顺序: 内置默认值, TOML 配置文件, `SCHEDULER_` 前缀的环境变量.
//! 嵌套字段用 `__` 分隔, 例如 `SCHEDULER_WORKER__POLICY=deadline`.

pub mod models;

#[cfg(test)]
mod tests;

pub use models::*;
