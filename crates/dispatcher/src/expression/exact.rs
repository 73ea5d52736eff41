use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

use super::ExpressionBuilder;
use scheduler_core::time::{parse_timezone, Clock, SystemClock};
use scheduler_core::{SchedulerError, SchedulerResult};

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// 把日期短语解析为只在那一分钟触发的表达式 `M H D Mo *`
///
/// 支持的写法:
/// - `12/22/78`, `12/22/1978 10:00`
/// - `2024-03-05`, `2024-03-05 10:30`
/// - `first monday of january 1980 10:00`, `last friday of march`
/// - `march 5`, `march 5, 2025 08:15`
/// - `today 18:00`, `tomorrow`, `+15 minutes`, `+2 hours`, `+1 day`
///
/// 短语中的日期和时间按目标时区理解.
#[derive(Clone)]
pub struct ExactExpressionBuilder {
    clock: Arc<dyn Clock>,
}

impl ExactExpressionBuilder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// 解析短语, 返回目标时区下的本地时间
    pub fn parse(&self, phrase: &str, timezone: &str) -> SchedulerResult<NaiveDateTime> {
        let offset = parse_timezone(timezone)?;
        let now = self.clock.now().with_timezone(&offset).naive_local();
        let invalid = |reason: &str| SchedulerError::invalid_expression(phrase, reason);

        let normalized = phrase.trim().to_lowercase().replace(',', " ");
        let mut tokens: Vec<&str> = normalized.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(invalid("表达式为空"));
        }

        if let Some(relative) = parse_relative(&tokens) {
            return relative
                .map(|delta| now + delta)
                .ok_or_else(|| invalid("无效的相对时间"));
        }

        let time = match tokens.last().and_then(|token| parse_time(token)) {
            Some(time) => {
                tokens.pop();
                time
            }
            None => NaiveTime::default(),
        };

        let date = match tokens.as_slice() {
            ["today"] | [] => Some(now.date()),
            ["tomorrow"] => Some(now.date() + Duration::days(1)),
            [single] if single.contains('/') => parse_slash_date(single),
            [single] if single.contains('-') => NaiveDate::parse_from_str(single, "%Y-%m-%d").ok(),
            [ordinal, weekday, "of", month, rest @ ..] => {
                let year = match rest {
                    [] => Some(now.year()),
                    [year] => parse_year(year),
                    _ => None,
                };
                weekday_of_month(ordinal, weekday, month, year)
            }
            [month, day, rest @ ..] => {
                let year = match rest {
                    [] => Some(now.year()),
                    [year] => parse_year(year),
                    _ => None,
                };
                match (parse_month(month), parse_day(day), year) {
                    (Some(month), Some(day), Some(year)) => NaiveDate::from_ymd_opt(year, month, day),
                    _ => None,
                }
            }
            _ => None,
        }
        .ok_or_else(|| invalid("无法识别的日期"))?;

        Ok(date.and_time(time))
    }
}

impl Default for ExactExpressionBuilder {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ExpressionBuilder for ExactExpressionBuilder {
    fn name(&self) -> &str {
        "exact"
    }

    fn supports(&self, expression: &str) -> bool {
        self.parse(expression, "UTC").is_ok()
    }

    fn build(&self, expression: &str, timezone: &str) -> SchedulerResult<String> {
        let at = self.parse(expression, timezone)?;
        Ok(format!(
            "{} {} {} {} *",
            at.minute(),
            at.hour(),
            at.day(),
            at.month()
        ))
    }
}

fn parse_relative(tokens: &[&str]) -> Option<Option<Duration>> {
    let (amount, unit) = match tokens {
        [amount, unit] if amount.starts_with('+') => (&amount[1..], *unit),
        [joined] if joined.starts_with('+') => {
            let split = joined[1..].find(|c: char| !c.is_ascii_digit())? + 1;
            (&joined[1..split], &joined[split..])
        }
        _ => return None,
    };

    let amount: i64 = match amount.parse() {
        Ok(amount) => amount,
        Err(_) => return Some(None),
    };
    let delta = match unit.trim_end_matches('s') {
        "min" | "minute" => Duration::minutes(amount),
        "hour" => Duration::hours(amount),
        "day" => Duration::days(amount),
        "week" => Duration::weeks(amount),
        _ => return Some(None),
    };
    Some(Some(delta))
}

fn parse_time(token: &str) -> Option<NaiveTime> {
    if !token.contains(':') {
        return None;
    }
    NaiveTime::parse_from_str(token, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(token, "%H:%M"))
        .ok()
}

/// 两位年份: 70-99 属于 1900 年代, 其余属于 2000 年代
fn parse_year(token: &str) -> Option<i32> {
    let year: i32 = token.parse().ok()?;
    match token.len() {
        2 if year >= 70 => Some(1900 + year),
        2 => Some(2000 + year),
        4 => Some(year),
        _ => None,
    }
}

fn parse_slash_date(token: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = token.split('/').collect();
    let [month, day, year] = parts.as_slice() else {
        return None;
    };
    NaiveDate::from_ymd_opt(parse_year(year)?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_month(token: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|month| *month == token || (token.len() >= 3 && month.starts_with(token)))
        .map(|index| index as u32 + 1)
}

fn parse_day(token: &str) -> Option<u32> {
    token
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()
}

fn weekday_of_month(ordinal: &str, weekday: &str, month: &str, year: Option<i32>) -> Option<NaiveDate> {
    let weekday: Weekday = weekday.parse().ok()?;
    let month = parse_month(month)?;
    let year = year?;

    let nth = match ordinal {
        "first" | "1st" => 1,
        "second" | "2nd" => 2,
        "third" | "3rd" => 3,
        "fourth" | "4th" => 4,
        "fifth" | "5th" => 5,
        "last" => {
            let next_month = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1)?
            };
            let mut day = next_month.pred_opt()?;
            while day.weekday() != weekday {
                day = day.pred_opt()?;
            }
            return Some(day);
        }
        _ => return None,
    };

    NaiveDate::from_weekday_of_month_opt(year, month, weekday, nth)
}
