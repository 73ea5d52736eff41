use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{LockConfig, SchedulerConfig, TaskDefinition, TransportConfig, WorkerConfig};
use crate::logging::LogConfig;

/// 默认配置文件查找路径
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/scheduler.toml",
    "scheduler.toml",
    "/etc/scheduler/config.toml",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub transport: TransportConfig,
    pub worker: WorkerConfig,
    pub lock: LockConfig,
    pub logging: LogConfig,
    pub tasks: Vec<TaskDefinition>,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 指定的文件不存在时报错; 未指定时依次尝试 [`DEFAULT_CONFIG_PATHS`],
    /// 都不存在则只使用默认值和环境变量.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("SCHEDULER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate().context("调度器配置验证失败")?;
        self.transport.validate().context("传输层配置验证失败")?;
        self.worker.validate().context("Worker配置验证失败")?;
        self.lock.validate().context("锁配置验证失败")?;
        self.logging
            .validate()
            .map_err(|e| anyhow::anyhow!("日志配置验证失败: {e}"))?;

        let mut names = HashSet::new();
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                return Err(anyhow::anyhow!("任务名称不能为空"));
            }
            if !names.insert(task.name.as_str()) {
                return Err(anyhow::anyhow!("重复的任务名称: {}", task.name));
            }
        }

        Ok(())
    }
}
