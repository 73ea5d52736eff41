//! 表达式解析
//!
//! 把任务上的原始表达式统一转换成五段式 cron 表达式:
//! 宏展开, `#` 随机字段, 日期短语, 以及直接校验 cron 语法.

pub mod computed;
pub mod cron;
pub mod exact;
pub mod fluent;

use std::sync::Arc;

use tracing::debug;

use scheduler_core::time::Clock;
use scheduler_core::{SchedulerError, SchedulerResult};

pub use computed::ComputedExpressionBuilder;
pub use self::cron::CronExpression;
pub use exact::ExactExpressionBuilder;
pub use fluent::Expression;

pub const REBOOT_MACRO: &str = "@reboot";

const MACROS: [(&str, &str); 8] = [
    ("@annually", "0 0 1 1 *"),
    ("@yearly", "0 0 1 1 *"),
    ("@monthly", "0 0 1 * *"),
    ("@weekly", "0 0 * * 0"),
    ("@daily", "0 0 * * *"),
    ("@midnight", "0 0 * * *"),
    ("@hourly", "0 * * * *"),
    (REBOOT_MACRO, REBOOT_MACRO),
];

/// 展开宏, `@reboot` 原样返回
pub fn expand_macro(expression: &str) -> SchedulerResult<&'static str> {
    MACROS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(expression))
        .map(|(_, cron)| *cron)
        .ok_or_else(|| SchedulerError::invalid_expression(expression, "不支持的宏"))
}

pub fn is_reboot(expression: &str) -> bool {
    expression.trim().eq_ignore_ascii_case(REBOOT_MACRO)
}

/// 表达式构造器
pub trait ExpressionBuilder: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, expression: &str) -> bool;

    fn build(&self, expression: &str, timezone: &str) -> SchedulerResult<String>;
}

/// 表达式解析器
///
/// 依次尝试: 宏, 随机字段, 合法的 cron 表达式, 日期短语.
#[derive(Clone)]
pub struct ExpressionResolver {
    builders: Vec<Arc<dyn ExpressionBuilder>>,
}

impl ExpressionResolver {
    pub fn new(builders: Vec<Arc<dyn ExpressionBuilder>>) -> Self {
        Self { builders }
    }

    /// 日期短语使用指定时钟计算相对时间
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::new(vec![
            Arc::new(ComputedExpressionBuilder),
            Arc::new(ExactExpressionBuilder::new(clock)),
        ])
    }

    pub fn resolve(&self, expression: &str, timezone: &str) -> SchedulerResult<String> {
        let raw = expression.trim();
        if raw.is_empty() {
            return Err(SchedulerError::invalid_expression(raw, "表达式为空"));
        }

        if raw.starts_with('@') {
            return expand_macro(raw).map(str::to_string);
        }

        if let Ok(cron) = CronExpression::parse(raw) {
            return Ok(cron.to_string());
        }

        let builder = self
            .builders
            .iter()
            .find(|builder| builder.supports(raw))
            .ok_or_else(|| SchedulerError::invalid_expression(raw, "无法识别的表达式"))?;

        let resolved = builder.build(raw, timezone)?;
        debug!(
            builder = builder.name(),
            expression = raw,
            resolved = %resolved,
            "表达式已解析"
        );
        CronExpression::validate(&resolved)?;
        Ok(resolved)
    }
}

impl Default for ExpressionResolver {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(ComputedExpressionBuilder),
            Arc::new(ExactExpressionBuilder::default()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros() {
        let resolver = ExpressionResolver::default();
        assert_eq!(resolver.resolve("@yearly", "UTC").unwrap(), "0 0 1 1 *");
        assert_eq!(resolver.resolve("@daily", "UTC").unwrap(), "0 0 * * *");
        assert_eq!(resolver.resolve("@weekly", "UTC").unwrap(), "0 0 * * 0");
        assert_eq!(resolver.resolve("@reboot", "UTC").unwrap(), "@reboot");
        assert!(matches!(
            resolver.resolve("@sometimes", "UTC"),
            Err(SchedulerError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn test_literal_cron_is_normalized() {
        let resolver = ExpressionResolver::default();
        assert_eq!(resolver.resolve("  */5  * * * 1-5 ", "UTC").unwrap(), "*/5 * * * 1-5");
    }

    #[test]
    fn test_computed_expression() {
        let resolved = ExpressionResolver::default().resolve("# 3 * * *", "UTC").unwrap();
        assert!(resolved.ends_with(" 3 * * *"));
        assert_ne!(resolved.split(' ').next(), Some("#"));
    }

    #[test]
    fn test_unparseable_input() {
        let resolver = ExpressionResolver::default();
        for raw in ["", "every now and then", "99 * * * *"] {
            assert!(
                matches!(resolver.resolve(raw, "UTC"), Err(SchedulerError::InvalidExpression { .. })),
                "{raw}"
            );
        }
    }
}
