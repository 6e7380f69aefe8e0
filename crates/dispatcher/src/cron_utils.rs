use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use fantasy_core::{FantasyError, FantasyResult};

/// 标准5段CRON表达式（分 时 日 月 周）
///
/// 底层的 `cron` 库要求带秒字段，且星期取值为 1-7（周日为1），
/// 解析时会补上秒字段并把 0-7 的星期写法换算过去。
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> FantasyResult<Self> {
        let normalized = to_cron_crate_syntax(expression)?;
        let schedule = Schedule::from_str(&normalized).map_err(|e| invalid(expression, e.to_string()))?;

        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
        })
    }

    pub fn validate(expression: &str) -> FantasyResult<()> {
        Self::parse(expression).map(|_| ())
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 严格晚于 `after` 的下一次触发时间
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 粗略的执行频率描述，只用于日志
    pub fn frequency_description(&self, from: DateTime<Utc>) -> String {
        let upcoming = self.upcoming_times(from, 2);
        if upcoming.len() < 2 {
            return "无法确定频率".to_string();
        }

        match (upcoming[1] - upcoming[0]).num_seconds() {
            s if s < 3600 => format!("每{}分钟", s / 60),
            s if s < 86400 => format!("每{}小时", s / 3600),
            s if s < 604800 => format!("每{}天", s / 86400),
            s => format!("每{}周", s / 604800),
        }
    }
}

fn invalid(expression: &str, message: impl Into<String>) -> FantasyError {
    FantasyError::InvalidCron {
        expr: expression.to_string(),
        message: message.into(),
    }
}

fn to_cron_crate_syntax(expression: &str) -> FantasyResult<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(invalid(
            expression,
            format!("需要5个字段（分 时 日 月 周），实际为{}个", fields.len()),
        ));
    }

    let day_of_week = convert_day_of_week(expression, fields[4])?;
    Ok(format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], day_of_week
    ))
}

/// 把标准写法的星期字段（0-7，0和7都是周日）转换为 1-7（周日为1）
fn convert_day_of_week(expression: &str, field: &str) -> FantasyResult<String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = BTreeSet::new();
    let mut names = Vec::new();

    for item in field.split(',') {
        if item.chars().any(|c| c.is_ascii_alphabetic()) {
            names.push(item.to_string());
            continue;
        }

        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| invalid(expression, format!("星期字段步长无效: {item}")))?;
                (base, Some(step))
            }
            None => (item, None),
        };

        let (start, end) = match base {
            "*" => (0, 6),
            _ => match base.split_once('-') {
                Some((start, end)) => (parse_day(expression, start)?, parse_day(expression, end)?),
                None => {
                    let day = parse_day(expression, base)?;
                    // "5/2" 表示从5开始按步长取到周末
                    (day, if step.is_some() { 6 } else { day })
                }
            },
        };

        if start > end {
            return Err(invalid(expression, format!("星期字段范围无效: {item}")));
        }

        let step = step.unwrap_or(1) as usize;
        for day in (start..=end).step_by(step) {
            days.insert(day % 7 + 1);
        }
    }

    let mut parts: Vec<String> = days.into_iter().map(|d| d.to_string()).collect();
    parts.extend(names);
    Ok(parts.join(","))
}

fn parse_day(expression: &str, value: &str) -> FantasyResult<u32> {
    value
        .parse::<u32>()
        .ok()
        .filter(|d| *d <= 7)
        .ok_or_else(|| invalid(expression, format!("星期取值必须在0-7之间: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_week_conversion() {
        assert_eq!(convert_day_of_week("", "*").unwrap(), "*");
        assert_eq!(convert_day_of_week("", "0").unwrap(), "1");
        assert_eq!(convert_day_of_week("", "7").unwrap(), "1");
        assert_eq!(convert_day_of_week("", "1-5").unwrap(), "2,3,4,5,6");
        assert_eq!(convert_day_of_week("", "5-7").unwrap(), "1,6,7");
        assert_eq!(convert_day_of_week("", "*/2").unwrap(), "1,3,5,7");
        assert_eq!(convert_day_of_week("", "0,6").unwrap(), "1,7");
        assert_eq!(convert_day_of_week("", "Mon-Fri").unwrap(), "Mon-Fri");
        assert!(convert_day_of_week("", "8").is_err());
        assert!(convert_day_of_week("", "5-1").is_err());
        assert!(convert_day_of_week("", "*/0").is_err());
    }

    #[test]
    fn test_field_count() {
        assert!(to_cron_crate_syntax("0 */4 * * *").is_ok());
        assert!(to_cron_crate_syntax("0 0 */4 * * *").is_err());
        assert!(to_cron_crate_syntax("* * * *").is_err());
        assert_eq!(
            to_cron_crate_syntax("30 6 * * 1").unwrap(),
            "0 30 6 * * 2"
        );
    }
}
