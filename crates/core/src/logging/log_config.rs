use serde::{Deserialize, Serialize};

use crate::logging::log_level::LogLevel;

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// 最低输出级别, `RUST_LOG` 存在时以它为准
    pub level: LogLevel,
    pub format: OutputFormat,
    /// 是否输出 target 字段
    pub include_target: bool,
    pub include_thread_ids: bool,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Pretty,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: OutputFormat::Pretty,
            include_target: true,
            include_thread_ids: false,
        }
    }
}

impl LogConfig {
    /// 从 `LOG_LEVEL` / `LOG_FORMAT` 环境变量构造
    pub fn from_env() -> Self {
        let mut config = Self {
            level: LogLevel::from_env(),
            ..Self::default()
        };

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.format = Self::parse_format(&format).unwrap_or_default();
        }

        config
    }

    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn parse_format(format: &str) -> Option<OutputFormat> {
        match format.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "pretty" | "text" => Some(OutputFormat::Pretty),
            _ => None,
        }
    }

    /// `EnvFilter` 在 `RUST_LOG` 未设置时使用的默认指令
    pub fn filter_directive(&self) -> String {
        format!(
            "{level},scheduler={level},scheduler_core={level},scheduler_dispatcher={level},scheduler_worker={level},scheduler_infrastructure={level}",
            level = self.level
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.include_thread_ids && self.format == OutputFormat::Json {
            return Err("JSON 格式日志不支持输出线程 ID".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LogConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.filter_directive().starts_with("info,"));
    }

    #[test]
    fn rejects_thread_ids_with_json() {
        let mut config = LogConfig::with_level(LogLevel::Debug).with_format(OutputFormat::Json);
        config.include_thread_ids = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_from_toml() {
        let config: LogConfig = toml::from_str("level = \"warn\"\nformat = \"json\"").unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.include_target);
    }
}
