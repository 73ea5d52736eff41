use std::fmt;

use super::{expand_macro, REBOOT_MACRO};
use scheduler_core::models::DEFAULT_EXPRESSION;
use scheduler_core::{SchedulerError, SchedulerResult};

const MINUTE: usize = 0;
const HOUR: usize = 1;
const DAY: usize = 2;
const MONTH: usize = 3;
const DAY_OF_WEEK: usize = 4;

/// 链式构造 cron 表达式
///
/// ```rust
/// use scheduler_dispatcher::expression::Expression;
///
/// let expression = Expression::new().every_specific_days_of_week("1-5").at("9:30");
/// assert_eq!(expression.to_string(), "30 9 * * 1-5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    fields: [String; 5],
}

impl Expression {
    pub fn new() -> Self {
        Self::from_cron(DEFAULT_EXPRESSION)
    }

    /// 从五段式表达式或宏创建, `@reboot` 没有对应的字段因此不支持
    pub fn parse(expression: &str) -> SchedulerResult<Self> {
        let expression = expression.trim();
        if expression == REBOOT_MACRO {
            return Err(SchedulerError::invalid_expression(
                expression,
                "@reboot 不能作为链式构造的起点",
            ));
        }

        let expanded = if expression.starts_with('@') {
            expand_macro(expression)?
        } else {
            expression
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let fields: [&str; 5] = fields.try_into().map_err(|_| {
            SchedulerError::invalid_expression(expression, "需要 5 个字段")
        })?;
        Ok(Self {
            fields: fields.map(str::to_string),
        })
    }

    fn from_cron(cron: &str) -> Self {
        let mut fields: [String; 5] = Default::default();
        for (slot, value) in fields.iter_mut().zip(cron.split(' ')) {
            *slot = value.to_string();
        }
        Self { fields }
    }

    fn change(mut self, position: usize, value: impl Into<String>) -> Self {
        self.fields[position] = value.into();
        self
    }

    pub fn every_specific_minutes(self, minutes: &str) -> Self {
        self.change(MINUTE, minutes)
    }

    pub fn every_specific_hours(self, hours: &str) -> Self {
        self.change(HOUR, hours)
    }

    pub fn every_specific_days(self, days: &str) -> Self {
        self.change(DAY, days)
    }

    pub fn every_specific_months(self, months: &str) -> Self {
        self.change(MONTH, months)
    }

    pub fn every_specific_days_of_week(self, days: &str) -> Self {
        self.change(DAY_OF_WEEK, days)
    }

    pub fn every_5_minutes(self) -> Self {
        self.change(MINUTE, "*/5")
    }

    pub fn every_10_minutes(self) -> Self {
        self.change(MINUTE, "*/10")
    }

    pub fn every_15_minutes(self) -> Self {
        self.change(MINUTE, "*/15")
    }

    pub fn every_20_minutes(self) -> Self {
        self.change(MINUTE, "*/20")
    }

    pub fn every_25_minutes(self) -> Self {
        self.change(MINUTE, "*/25")
    }

    pub fn every_30_minutes(self) -> Self {
        self.change(MINUTE, "*/30")
    }

    /// 每小时整点
    pub fn every_hours(self) -> Self {
        self.change(MINUTE, "0")
    }

    pub fn every_days(self) -> Self {
        Self::from_cron("0 0 * * *")
    }

    pub fn every_weeks(self) -> Self {
        Self::from_cron("0 0 * * 0")
    }

    pub fn every_months(self) -> Self {
        Self::from_cron("0 0 1 * *")
    }

    pub fn every_years(self) -> Self {
        Self::from_cron("0 0 1 1 *")
    }

    /// 设置触发的时和分, 只给出小时时分钟为 0
    pub fn at(self, time: &str) -> Self {
        let (hour, minute) = time.split_once(':').unwrap_or((time, "0"));
        let minute = minute.trim_start_matches('0');
        let minute = if minute.is_empty() { "0" } else { minute }.to_string();
        self.change(MINUTE, minute).change(HOUR, hour)
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fields.join(" "))
    }
}

impl From<Expression> for String {
    fn from(expression: Expression) -> Self {
        expression.to_string()
    }
}
