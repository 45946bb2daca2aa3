//! 统计聚合工具：日期范围过滤、按天分桶、时间间隔的可读描述

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sea_orm::{ColumnTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// 默认统计窗口（天）
pub const DEFAULT_RANGE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Max,
}

/// 某一天的汇总值，date 序列化为 `YYYY-MM-DD`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub total: i64,
}

/// 当天零点 (UTC)
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

/// 按自然日闭区间过滤任意时间戳列：start 当天零点 <= t < end 次日零点
pub fn filter_date_range<Q, C>(
    query: Q,
    column: C,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Q
where
    Q: QueryFilter,
    C: ColumnTrait,
{
    let mut query = query;
    if let Some(start) = start {
        query = query.filter(column.gte(start_of_day(start)));
    }
    if let Some(end) = end {
        query = query.filter(column.lt(start_of_day(end) + Duration::days(1)));
    }
    query
}

/// 将记录按 UTC 自然日分组并聚合，结果按日期升序
///
/// 在应用层截断日期，保证 PostgreSQL 与 SQLite 得到一致的分桶结果。
pub fn bucket_by_day<T, F, V>(rows: &[T], timestamp: F, value: V, aggregate: Aggregate) -> Vec<DayTotal>
where
    F: Fn(&T) -> DateTime<Utc>,
    V: Fn(&T) -> i64,
{
    let mut buckets: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for row in rows {
        let day = timestamp(row).date_naive();
        let v = value(row);
        match aggregate {
            Aggregate::Count => *buckets.entry(day).or_insert(0) += 1,
            Aggregate::Sum => *buckets.entry(day).or_insert(0) += v,
            Aggregate::Max => {
                buckets
                    .entry(day)
                    .and_modify(|cur| *cur = (*cur).max(v))
                    .or_insert(v);
            }
        }
    }

    buckets
        .into_iter()
        .map(|(date, total)| DayTotal { date, total })
        .collect()
}

/// 已校验的统计日期范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// 请求未指定任何日期
    pub is_default: bool,
}

impl DateRange {
    /// 解析并校验查询参数
    ///
    /// - end 缺省为今天，start 缺省为 end 前 7 天
    /// - end 不能晚于今天，start 不能晚于 end
    pub fn resolve(
        start_date: Option<&str>,
        end_date: Option<&str>,
        today: NaiveDate,
    ) -> AppResult<Self> {
        let start = start_date.filter(|s| !s.is_empty()).map(parse_date).transpose()?;
        let end = end_date.filter(|s| !s.is_empty()).map(parse_date).transpose()?;

        let is_default = start.is_none() && end.is_none();

        let end = match end {
            Some(end) if end > today => {
                return Err(AppError::ValidationError(
                    "End date must be in the past.".to_string(),
                ));
            }
            Some(end) => end,
            None => today,
        };
        let start = match start {
            Some(start) if start > end => {
                return Err(AppError::ValidationError(
                    "Start date must be before end date.".to_string(),
                ));
            }
            Some(start) => start,
            None => end
                .checked_sub_signed(Duration::days(DEFAULT_RANGE_DAYS))
                .ok_or_else(|| AppError::ValidationError(format!("Invalid date: {end}")))?,
        };

        Ok(Self {
            start,
            end,
            is_default,
        })
    }

    pub fn label(&self) -> String {
        if self.is_default {
            "For This Week".to_string()
        } else {
            format!(
                "Between {}-{}",
                self.start.format("%d/%m/%y"),
                self.end.format("%d/%m/%y")
            )
        }
    }
}

fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("Invalid date: {value}")))
}

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// 取时间间隔中最大的两个非零单位，例如 `2 years 3 months`、`1 day`
pub fn humanize_interval(interval: Duration) -> String {
    let mut remaining = interval.num_seconds().max(0);
    let units = [
        (YEAR, "year"),
        (MONTH, "month"),
        (DAY, "day"),
        (HOUR, "hour"),
        (MINUTE, "minute"),
    ];

    let mut parts = Vec::new();
    for (size, name) in units {
        let n = remaining / size;
        remaining %= size;
        if n > 0 {
            let plural = if n == 1 { "" } else { "s" };
            parts.push(format!("{n} {name}{plural}"));
        }
    }

    if parts.is_empty() {
        return "0 minutes".to_string();
    }
    parts.truncate(2);
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_humanize_interval_two_largest_units() {
        assert_eq!(
            humanize_interval(Duration::days(833) + Duration::hours(12) + Duration::minutes(3)),
            "2 years 3 months"
        );
        assert_eq!(
            humanize_interval(Duration::days(103) + Duration::hours(12) + Duration::minutes(3)),
            "3 months 13 days"
        );
        assert_eq!(
            humanize_interval(Duration::hours(12) + Duration::minutes(3) + Duration::seconds(30)),
            "12 hours 3 minutes"
        );
    }

    #[test]
    fn test_humanize_interval_single_unit_and_plurals() {
        assert_eq!(humanize_interval(Duration::days(60)), "2 months");
        assert_eq!(humanize_interval(Duration::days(3)), "3 days");
        assert_eq!(humanize_interval(Duration::days(1)), "1 day");
        assert_eq!(humanize_interval(Duration::minutes(3)), "3 minutes");
        assert_eq!(humanize_interval(Duration::minutes(1)), "1 minute");
        assert_eq!(humanize_interval(Duration::seconds(20)), "0 minutes");
    }

    #[test]
    fn test_bucket_by_day_aggregates() {
        // (时间, 数值)：1 日 1 条，2 日 2 条，3 日 3 条，数值与日期相同
        let mut rows = Vec::new();
        for day in 1..=3u32 {
            for hour in 0..day {
                rows.push((
                    Utc.with_ymd_and_hms(2019, 1, day, hour, 30, 0).unwrap(),
                    day as i64,
                ));
            }
        }

        let count = bucket_by_day(&rows, |r| r.0, |r| r.1, Aggregate::Count);
        let sum = bucket_by_day(&rows, |r| r.0, |r| r.1, Aggregate::Sum);
        let max = bucket_by_day(&rows, |r| r.0, |r| r.1, Aggregate::Max);

        let totals = |v: &[DayTotal]| v.iter().map(|d| d.total).collect::<Vec<_>>();
        assert_eq!(totals(&count), vec![1, 2, 3]);
        assert_eq!(totals(&sum), vec![1, 4, 9]);
        assert_eq!(totals(&max), vec![1, 2, 3]);
        assert_eq!(count[0].date, date(2019, 1, 1));
    }

    #[test]
    fn test_bucket_by_day_same_day_collapses() {
        let rows = vec![
            Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 1).unwrap(),
            Utc.with_ymd_and_hms(2019, 1, 1, 23, 59, 59).unwrap(),
        ];
        let buckets = bucket_by_day(&rows, |t| *t, |_| 1, Aggregate::Count);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].total, 2);
        assert_eq!(
            serde_json::to_value(&buckets[0]).unwrap()["date"],
            "2019-01-01"
        );
    }

    #[test]
    fn test_bucket_by_day_empty() {
        let rows: Vec<DateTime<Utc>> = Vec::new();
        assert!(bucket_by_day(&rows, |t| *t, |_| 1, Aggregate::Sum).is_empty());
    }

    #[test]
    fn test_date_range_defaults_to_this_week() {
        let today = date(2024, 3, 10);
        let range = DateRange::resolve(None, None, today).unwrap();
        assert_eq!(range.start, date(2024, 3, 3));
        assert_eq!(range.end, today);
        assert_eq!(range.label(), "For This Week");
    }

    #[test]
    fn test_date_range_partial_and_explicit() {
        let today = date(2024, 3, 10);

        let range = DateRange::resolve(Some("2019-01-01"), None, today).unwrap();
        assert_eq!(range.end, today);

        let range = DateRange::resolve(None, Some("2019-01-08"), today).unwrap();
        assert_eq!(range.start, date(2019, 1, 1));

        let range = DateRange::resolve(Some("2019-01-01"), Some("2019-01-01"), today).unwrap();
        assert_eq!(range.start, range.end);
        assert_eq!(range.label(), "Between 01/01/19-01/01/19");
    }

    #[test]
    fn test_date_range_rejects_future_and_inverted() {
        let today = date(2024, 3, 10);
        assert!(DateRange::resolve(None, Some("2099-01-01"), today).is_err());
        assert!(DateRange::resolve(Some("2099-01-01"), None, today).is_err());
        assert!(DateRange::resolve(Some("2019-01-05"), Some("2019-01-01"), today).is_err());
        assert!(DateRange::resolve(Some("yesterday"), None, today).is_err());
    }

    #[test]
    fn test_date_range_rejects_out_of_range_end() {
        let today = date(2024, 3, 10);
        let err = DateRange::resolve(None, Some("-262143-01-03"), today).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
