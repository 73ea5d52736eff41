use rand::Rng;

use super::ExpressionBuilder;
use scheduler_core::{SchedulerError, SchedulerResult};

/// 各字段的取值范围: 分 时 日 月 周
const FIELD_RANGES: [(u32, u32); 5] = [(0, 59), (0, 23), (1, 31), (1, 12), (0, 6)];

/// 把 `#` 字段替换成范围内的随机值, 用于错开同一时刻触发的任务
#[derive(Debug, Default, Clone)]
pub struct ComputedExpressionBuilder;

impl ExpressionBuilder for ComputedExpressionBuilder {
    fn name(&self) -> &str {
        "computed"
    }

    fn supports(&self, expression: &str) -> bool {
        expression.split_whitespace().any(|field| field == "#")
    }

    fn build(&self, expression: &str, _timezone: &str) -> SchedulerResult<String> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != FIELD_RANGES.len() {
            return Err(SchedulerError::invalid_expression(
                expression,
                "随机字段只能用于五段式表达式",
            ));
        }

        let mut rng = rand::rng();
        let resolved: Vec<String> = fields
            .iter()
            .zip(FIELD_RANGES)
            .map(|(field, (min, max))| {
                if *field == "#" {
                    rng.random_range(min..=max).to_string()
                } else {
                    field.to_string()
                }
            })
            .collect();

        Ok(resolved.join(" "))
    }
}
