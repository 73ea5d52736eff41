use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// 例如 `memory://first_in_first_out` 或 `failover://(memory:// || fs:///var/lib/scheduler)`
    pub dsn: String,
    /// 覆盖 DSN 中的 `execution_mode`
    pub execution_mode: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dsn: "memory://first_in_first_out".to_string(),
            execution_mode: None,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dsn.trim().is_empty() {
            return Err(anyhow::anyhow!("传输层 DSN 不能为空"));
        }
        if !self.dsn.contains("://") {
            return Err(anyhow::anyhow!("无效的传输层 DSN: {}", self.dsn));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LockProviderKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub provider: LockProviderKind,
    /// 文件锁目录
    pub path: Option<String>,
    /// 超过该秒数的锁视为过期
    pub ttl_secs: Option<u64>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            provider: LockProviderKind::Memory,
            path: None,
            ttl_secs: Some(300),
        }
    }
}

impl LockConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.provider == LockProviderKind::File && self.path.is_none() {
            return Err(anyhow::anyhow!("文件锁必须配置 lock.path"));
        }
        if self.ttl_secs == Some(0) {
            return Err(anyhow::anyhow!("锁过期时间必须大于0"));
        }
        Ok(())
    }
}
