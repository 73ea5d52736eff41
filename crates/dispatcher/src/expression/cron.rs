use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use cron::Schedule;

use scheduler_core::{SchedulerError, SchedulerResult};

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// 五段式 cron 表达式: 分 时 日 月 周
///
/// 星期字段使用 0-7 (0 和 7 都是周日) 或英文缩写. 日和星期字段
/// 同时受限时任意一个匹配即触发.
#[derive(Clone)]
pub struct CronExpression {
    expression: String,
    schedules: Vec<Schedule>,
}

impl CronExpression {
    pub fn parse(expression: &str) -> SchedulerResult<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(SchedulerError::invalid_expression(
                expression,
                format!("需要 5 个字段, 实际为 {} 个", fields.len()),
            ));
        }

        let (minute, hour, day, month, weekday) =
            (fields[0], fields[1], fields[2], fields[3], fields[4]);
        let translated = translate_weekday(weekday)
            .map_err(|reason| SchedulerError::invalid_expression(expression, reason))?;

        let variants = if is_restricted(day) && is_restricted(weekday) {
            vec![(day, "*".to_string()), ("*", translated)]
        } else {
            vec![(day, translated)]
        };

        let schedules = variants
            .into_iter()
            .map(|(day, weekday)| {
                let source = format!("0 {minute} {hour} {day} {month} {weekday}");
                Schedule::from_str(&source)
                    .map_err(|e| SchedulerError::invalid_expression(expression, e.to_string()))
            })
            .collect::<SchedulerResult<Vec<_>>>()?;

        Ok(Self {
            expression: fields.join(" "),
            schedules,
        })
    }

    /// 验证表达式是否有效
    pub fn validate(expression: &str) -> SchedulerResult<()> {
        Self::parse(expression).map(|_| ())
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// 给定时刻所在的分钟是否命中表达式
    pub fn matches(&self, at: DateTime<Utc>, timezone: FixedOffset) -> bool {
        let minute = truncate_to_minute(at).with_timezone(&timezone);
        let just_before = minute - Duration::seconds(1);
        self.schedules
            .iter()
            .any(|schedule| schedule.after(&just_before).next() == Some(minute))
    }

    /// 严格晚于 `after` 的下一次触发时间
    pub fn next_execution_time(
        &self,
        after: DateTime<Utc>,
        timezone: FixedOffset,
    ) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&timezone);
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(&local).next())
            .min()
            .map(|next| next.with_timezone(&Utc))
    }

    /// 从指定时间开始的多个触发时间
    pub fn upcoming_times(
        &self,
        after: DateTime<Utc>,
        timezone: FixedOffset,
        count: usize,
    ) -> Vec<DateTime<Utc>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = after;
        while times.len() < count {
            match self.next_execution_time(cursor, timezone) {
                Some(next) => {
                    times.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        times
    }

    /// 距离下次触发的时长
    pub fn time_until_next_execution(
        &self,
        now: DateTime<Utc>,
        timezone: FixedOffset,
    ) -> Option<Duration> {
        self.next_execution_time(now, timezone).map(|next| next - now)
    }
}

impl fmt::Debug for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronExpression").field(&self.expression).finish()
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

fn is_restricted(field: &str) -> bool {
    !field.starts_with('*') && field != "?"
}

fn parse_day(value: &str) -> Result<u32, String> {
    if let Some(index) = DAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(value))
    {
        return Ok(index as u32);
    }
    match value.parse::<u32>() {
        Ok(day) if day <= 7 => Ok(day),
        _ => Err(format!("无效的星期值: \"{value}\"")),
    }
}

/// 把星期字段展开成英文缩写列表, 消除 0/7 与 cron crate 编号的差异
fn translate_weekday(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok("*".to_string());
    }

    let mut days = BTreeSet::new();
    for part in field.split(',') {
        let (base, step) = match part.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| format!("无效的步长: \"{part}\""))?;
                (base, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if base == "*" {
            (0, 6)
        } else if let Some((start, end)) = base.split_once('-') {
            (parse_day(start)?, parse_day(end)?)
        } else {
            let start = parse_day(base)?;
            (start, if step.is_some() { 6 } else { start })
        };

        if start > end {
            return Err(format!("无效的星期范围: \"{part}\""));
        }

        let mut day = start;
        while day <= end {
            days.insert(day % 7);
            day += step.unwrap_or(1);
        }
    }

    Ok(days
        .into_iter()
        .map(|day| DAY_NAMES[day as usize])
        .collect::<Vec<_>>()
        .join(","))
}
