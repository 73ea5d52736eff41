use thiserror::Error;

/// 存储层错误
///
/// 所有 Transport 实现只返回这一种错误, 调用方在存储边界上只需要匹配一个类型,
/// 原始原因保存在对应的变体里.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("任务不存在: \"{name}\"")]
    NotFound { name: String },

    #[error("任务已存在: \"{name}\"")]
    AlreadyExists { name: String },

    #[error("任务已暂停: \"{name}\"")]
    AlreadyPaused { name: String },

    #[error("任务已启用: \"{name}\"")]
    AlreadyEnabled { name: String },

    #[error("任务 \"{name}\" 不允许从 {from} 切换到 {to}")]
    InvalidStateTransition {
        name: String,
        from: String,
        to: String,
    },

    #[error("所有存储都执行失败: {operation} ({})", .causes.join("; "))]
    AllTransportsFailed {
        operation: String,
        causes: Vec<String>,
    },

    #[error("没有配置任何存储")]
    NoTransportConfigured,

    #[error("存储执行失败: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TransportError {
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn already_exists<S: Into<String>>(name: S) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    pub fn backend_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("存储错误: {0}")]
    Transport(#[from] TransportError),

    #[error("无效的调度表达式: \"{expression}\" - {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("未知的调度策略: \"{0}\"")]
    UnknownPolicy(String),

    #[error("没有注册任何调度策略")]
    NoPoliciesRegistered,

    #[error("调度器时钟不同步, 当前偏移 {drift_micros} 微秒, 允许范围 [{min_micros}, {max_micros}]")]
    ClockDriftExceeded {
        drift_micros: i64,
        min_micros: i64,
        max_micros: i64,
    },

    #[error("没有找到可以执行任务 \"{task}\" 的执行器")]
    NoRunnerFound { task: String },

    #[error("任务 \"{task}\" 匹配到多个执行器 ({count})")]
    AmbiguousRunner { task: String, count: usize },

    #[error("中间件 {middleware} 执行失败: {message}")]
    MiddlewareFailed { middleware: String, message: String },

    #[error("任务 \"{task}\" 执行失败: {message}")]
    RunnerFailed { task: String, message: String },

    #[error("任务 \"{task}\" 无法序列化: {reason}")]
    NotSerializable { task: String, reason: String },

    #[error("无效的任务: {0}")]
    InvalidTask(String),

    #[error("无法获取锁: {0}")]
    LockUnavailable(String),

    #[error("消息总线错误: {0}")]
    MessageBus(String),

    #[error("通知发送失败: {0}")]
    Notification(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("IO错误: {0}")]
    Io(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    pub fn invalid_expression<E: Into<String>, R: Into<String>>(expression: E, reason: R) -> Self {
        Self::InvalidExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    pub fn middleware<M: Into<String>, S: Into<String>>(middleware: M, message: S) -> Self {
        Self::MiddlewareFailed {
            middleware: middleware.into(),
            message: message.into(),
        }
    }

    pub fn config_error<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// 存储层的 NotFound
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Transport(TransportError::NotFound { .. }))
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }

    /// 是否值得在下一个周期重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError::Backend { .. })
                | Self::Transport(TransportError::AllTransportsFailed { .. })
                | Self::LockUnavailable(_)
                | Self::MessageBus(_)
                | Self::Io(_)
        )
    }

    /// 配置类错误, 重试没有意义
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoRunnerFound { .. }
                | Self::AmbiguousRunner { .. }
                | Self::NoPoliciesRegistered
                | Self::UnknownPolicy(_)
                | Self::ClockDriftExceeded { .. }
                | Self::Configuration(_)
        )
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        SchedulerError::Io(err.to_string())
    }
}

impl From<config::ConfigError> for SchedulerError {
    fn from(err: config::ConfigError) -> Self {
        SchedulerError::Configuration(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_name_the_task() {
        let err: SchedulerError = TransportError::already_exists("foo").into();
        assert_eq!(err.to_string(), "存储错误: 任务已存在: \"foo\"");
        assert!(!err.is_not_found());

        let err: SchedulerError = TransportError::not_found("bar").into();
        assert!(err.is_not_found());
    }

    #[test]
    fn all_transports_failed_lists_causes() {
        let err = TransportError::AllTransportsFailed {
            operation: "create".to_string(),
            causes: vec!["a down".to_string(), "b down".to_string()],
        };
        assert_eq!(err.to_string(), "所有存储都执行失败: create (a down; b down)");
    }

    #[test]
    fn classification() {
        assert!(SchedulerError::NoPoliciesRegistered.is_fatal());
        assert!(SchedulerError::LockUnavailable("k".into()).is_retryable());
        assert!(!SchedulerError::InvalidTask("x".into()).is_retryable());
    }
}
