//! Derived metrics over raw crawler counters.
//!
//! Everything here is pure: no I/O, no shared state, and total over its inputs.
//! Zero denominators yield `0`, never NaN.

use crate::model::{CalendarDay, Execution, PositionCount, StatSnapshot};
use serde::Serialize;
use std::time::{Duration, SystemTime};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime};

/// Ad-slot positions tracked by the distribution.
pub const POSITION_BUCKETS: std::ops::RangeInclusive<i64> = 1..=4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    /// Absolute change relative to the previous value, in percent (1 decimal).
    pub value: f64,
    pub is_positive: bool,
}

impl Trend {
    pub const NEUTRAL: Trend = Trend {
        value: 0.0,
        is_positive: true,
    };
}

/// Percent change from `previous` to `current`. A zero baseline is neutral.
pub fn trend(current: f64, previous: f64) -> Trend {
    if previous == 0.0 {
        return Trend::NEUTRAL;
    }
    let delta = current - previous;
    Trend {
        value: round_to(delta.abs() / previous.abs() * 100.0, 1),
        is_positive: delta >= 0.0,
    }
}

/// `numerator / denominator * 100`, or `0` when the denominator is zero.
pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (v * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionBucket {
    pub position: u8,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionDistribution {
    /// Always one bucket per tracked position, ascending.
    pub buckets: Vec<PositionBucket>,
    pub total: u64,
    /// Occurrences reported for positions outside the tracked range.
    pub excluded: u64,
}

/// Bucket raw position counts into slots 1..=4. Repeated positions are summed.
pub fn position_distribution(snapshots: &[PositionCount]) -> PositionDistribution {
    let mut counts = [0u64; 4];
    let mut excluded = 0u64;
    for snap in snapshots {
        if POSITION_BUCKETS.contains(&snap.position) {
            counts[(snap.position - 1) as usize] += snap.count;
        } else {
            excluded += snap.count;
        }
    }
    let total: u64 = counts.iter().sum();
    let buckets = counts
        .iter()
        .enumerate()
        .map(|(i, &count)| PositionBucket {
            position: (i + 1) as u8,
            count,
            percentage: rate(count, total),
        })
        .collect();
    PositionDistribution {
        buckets,
        total,
        excluded,
    }
}

/// Position with the highest count; ties go to the lowest position.
/// `None` when there is nothing to rank.
pub fn most_frequent_bucket(buckets: &[PositionBucket]) -> Option<u8> {
    let mut best: Option<&PositionBucket> = None;
    for bucket in buckets {
        match best {
            Some(b) if bucket.count <= b.count => {}
            _ => best = Some(bucket),
        }
    }
    best.filter(|b| b.count > 0).map(|b| b.position)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExecutionRates {
    pub target_rate: f64,
    pub click_rate: f64,
}

pub fn execution_rates(execution: &Execution) -> ExecutionRates {
    ExecutionRates {
        target_rate: rate(execution.total_target_found, execution.total_searches),
        click_rate: rate(execution.total_clicks, execution.total_searches),
    }
}

/// Time elapsed since an RFC 3339 timestamp (offset optional; naive stamps are UTC).
/// `None` for unparsable stamps or stamps in the future.
pub fn running_time(start_time: &str, now: SystemTime) -> Option<Duration> {
    let started = parse_timestamp(start_time)?;
    Duration::try_from(OffsetDateTime::from(now) - started).ok()
}

fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    let naive =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]");
    PrimitiveDateTime::parse(raw, naive)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatCard {
    pub value: u64,
    pub trend: Trend,
}

impl StatCard {
    fn new(current: u64, previous: u64) -> Self {
        Self {
            value: current,
            trend: trend(current as f64, previous as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Overview {
    pub executions: StatCard,
    pub searches: StatCard,
    pub clicks: StatCard,
    pub target_found: StatCard,
}

/// Latest period against the one before it. A lone period is compared with itself.
pub fn overview(snapshots: &[StatSnapshot]) -> Overview {
    let empty = StatSnapshot {
        date: String::new(),
        total_executions: 0,
        total_searches: 0,
        total_clicks: 0,
        total_target_found: 0,
    };
    let current = snapshots.last().unwrap_or(&empty);
    let previous = snapshots
        .len()
        .checked_sub(2)
        .and_then(|i| snapshots.get(i))
        .unwrap_or(current);
    Overview {
        executions: StatCard::new(current.total_executions, previous.total_executions),
        searches: StatCard::new(current.total_searches, previous.total_searches),
        clicks: StatCard::new(current.total_clicks, previous.total_clicks),
        target_found: StatCard::new(current.total_target_found, previous.total_target_found),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub date: String,
    pub searches: u64,
    pub clicks: u64,
    pub target_found: u64,
    pub click_rate: f64,
    pub target_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub points: Vec<TimelinePoint>,
    pub total_searches: u64,
    pub daily_average: u64,
}

pub fn timeline(snapshots: &[StatSnapshot]) -> Timeline {
    let points: Vec<TimelinePoint> = snapshots
        .iter()
        .map(|s| TimelinePoint {
            date: s.date.clone(),
            searches: s.total_searches,
            clicks: s.total_clicks,
            target_found: s.total_target_found,
            click_rate: rate(s.total_clicks, s.total_searches),
            target_rate: rate(s.total_target_found, s.total_searches),
        })
        .collect();
    let total_searches: u64 = points.iter().map(|p| p.searches).sum();
    let daily_average = if points.is_empty() {
        0
    } else {
        (total_searches as f64 / points.len() as f64).round() as u64
    };
    Timeline {
        points,
        total_searches,
        daily_average,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Intensity {
    None,
    Low,
    Medium,
    High,
}

impl Intensity {
    pub fn for_count(executions: u64) -> Self {
        match executions {
            0 => Intensity::None,
            1..=2 => Intensity::Low,
            3..=4 => Intensity::Medium,
            _ => Intensity::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarCell {
    pub day: u8,
    pub date: String,
    pub executions: u64,
    pub intensity: Intensity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u8,
    /// Blank cells before day 1 in a Sunday-first grid.
    pub leading_blanks: u8,
    pub cells: Vec<CalendarCell>,
}

/// Current local date, falling back to UTC when the local offset is unknown.
pub fn today() -> Date {
    time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
        .date()
}

/// Lay out one month. Days missing from `days` count as zero executions; entries
/// outside the month or with unparsable dates are ignored.
pub fn calendar(year: i32, month: Month, days: &[CalendarDay]) -> Option<CalendarMonth> {
    let fmt = format_description!("[year]-[month]-[day]");
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let len = month.length(year);

    let mut counts = vec![0u64; len as usize];
    for d in days {
        let Some(raw) = d.date.get(..10) else {
            continue;
        };
        let Ok(date) = Date::parse(raw, &fmt) else {
            continue;
        };
        if date.year() == year && date.month() == month {
            counts[(date.day() - 1) as usize] += d.executions;
        }
    }

    let cells = counts
        .iter()
        .enumerate()
        .map(|(i, &executions)| {
            let day = (i + 1) as u8;
            CalendarCell {
                day,
                date: format!("{year:04}-{:02}-{day:02}", u8::from(month)),
                executions,
                intensity: Intensity::for_count(executions),
            }
        })
        .collect();

    Some(CalendarMonth {
        year,
        month: u8::from(month),
        leading_blanks: first.weekday().number_days_from_sunday(),
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionId, ExecutionMode, ExecutionStatus};

    fn pos(position: i64, count: u64) -> PositionCount {
        PositionCount {
            position,
            count,
            percentage: 0.0,
        }
    }

    fn snap(date: &str, executions: u64, searches: u64, clicks: u64, found: u64) -> StatSnapshot {
        StatSnapshot {
            date: date.into(),
            total_executions: executions,
            total_searches: searches,
            total_clicks: clicks,
            total_target_found: found,
        }
    }

    #[test]
    fn trend_with_zero_baseline_is_neutral() {
        for current in [0.0, 1.0, 250.0, -3.0] {
            assert_eq!(trend(current, 0.0), Trend::NEUTRAL);
        }
    }

    #[test]
    fn trend_rounds_to_one_decimal() {
        assert_eq!(
            trend(150.0, 100.0),
            Trend {
                value: 50.0,
                is_positive: true
            }
        );
        assert_eq!(
            trend(2.0, 3.0),
            Trend {
                value: 33.3,
                is_positive: false
            }
        );
        assert_eq!(
            trend(7.0, 7.0),
            Trend {
                value: 0.0,
                is_positive: true
            }
        );
    }

    #[test]
    fn rate_with_zero_denominator_is_zero() {
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(42, 0), 0.0);
        assert_eq!(rate(1, 4), 25.0);
    }

    #[test]
    fn distribution_percentages_sum_to_100() {
        let dist = position_distribution(&[pos(1, 3), pos(2, 3), pos(3, 1), pos(4, 2)]);
        let sum: f64 = dist.buckets.iter().map(|b| b.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert_eq!(dist.total, 9);
        assert_eq!(
            dist.buckets.iter().map(|b| b.position).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn empty_distribution_is_all_zero() {
        let dist = position_distribution(&[]);
        assert_eq!(dist.buckets.len(), 4);
        assert!(dist.buckets.iter().all(|b| b.count == 0 && b.percentage == 0.0));
        assert_eq!(most_frequent_bucket(&dist.buckets), None);
    }

    #[test]
    fn out_of_range_positions_are_excluded_and_counted() {
        let dist = position_distribution(&[pos(0, 5), pos(2, 4), pos(7, 1), pos(-1, 2)]);
        assert_eq!(dist.total, 4);
        assert_eq!(dist.excluded, 8);
        assert_eq!(dist.buckets[1].percentage, 100.0);
    }

    #[test]
    fn repeated_positions_are_summed() {
        let dist = position_distribution(&[pos(3, 2), pos(3, 5)]);
        assert_eq!(dist.buckets[2].count, 7);
    }

    #[test]
    fn most_frequent_prefers_lowest_position_on_ties() {
        let dist = position_distribution(&[pos(1, 10), pos(2, 10), pos(3, 5)]);
        assert_eq!(most_frequent_bucket(&dist.buckets), Some(1));

        let dist = position_distribution(&[pos(2, 4), pos(4, 4), pos(1, 1)]);
        assert_eq!(most_frequent_bucket(&dist.buckets), Some(2));
    }

    #[test]
    fn aggregation_is_deterministic() {
        let input = [pos(4, 9), pos(1, 2), pos(2, 9)];
        assert_eq!(position_distribution(&input), position_distribution(&input));
    }

    #[test]
    fn execution_rates_guard_zero_searches() {
        let mut execution = Execution {
            id: ExecutionId(1),
            start_time: "2024-03-15T10:00:00".into(),
            end_time: None,
            total_searches: 0,
            total_clicks: 4,
            total_target_found: 2,
            is_running: true,
            mode: ExecutionMode::Visible,
            status: ExecutionStatus::Running,
            error_message: None,
        };
        assert_eq!(
            execution_rates(&execution),
            ExecutionRates {
                target_rate: 0.0,
                click_rate: 0.0
            }
        );
        execution.total_searches = 8;
        let rates = execution_rates(&execution);
        assert_eq!(rates.target_rate, 25.0);
        assert_eq!(rates.click_rate, 50.0);
    }

    #[test]
    fn running_time_accepts_naive_zulu_and_offset_stamps() {
        let start = humantime::parse_rfc3339("2024-03-15T10:00:00Z").unwrap();
        let now = start + Duration::from_secs(90);
        assert_eq!(
            running_time("2024-03-15T10:00:00", now),
            Some(Duration::from_secs(90))
        );
        assert_eq!(
            running_time("2024-03-15T10:00:00Z", now),
            Some(Duration::from_secs(90))
        );
        // 12:00 at +02:00 is 10:00 UTC.
        assert_eq!(
            running_time("2024-03-15T12:00:00+02:00", now),
            Some(Duration::from_secs(90))
        );
        assert_eq!(
            running_time("2024-03-15T10:00:00.500", now),
            Some(Duration::from_millis(89_500))
        );
        assert_eq!(running_time("yesterday", now), None);
    }

    #[test]
    fn running_time_of_future_stamp_is_none() {
        let now = humantime::parse_rfc3339("2024-03-15T10:00:00Z").unwrap();
        assert_eq!(running_time("2024-03-15T10:05:00Z", now), None);
    }

    #[test]
    fn overview_compares_last_two_periods() {
        let data = [
            snap("2024-03-14", 2, 100, 10, 5),
            snap("2024-03-15", 3, 150, 10, 0),
        ];
        let o = overview(&data);
        assert_eq!(o.executions.value, 3);
        assert_eq!(o.executions.trend.value, 50.0);
        assert_eq!(o.searches.trend.value, 50.0);
        assert_eq!(o.clicks.trend, Trend::NEUTRAL);
        assert_eq!(
            o.target_found.trend,
            Trend {
                value: 100.0,
                is_positive: false
            }
        );
    }

    #[test]
    fn overview_of_single_or_no_period_is_neutral() {
        let o = overview(&[snap("2024-03-15", 3, 150, 10, 4)]);
        assert_eq!(o.searches.value, 150);
        assert_eq!(o.searches.trend.value, 0.0);
        assert!(o.searches.trend.is_positive);

        let o = overview(&[]);
        assert_eq!(o.executions.value, 0);
        assert_eq!(o.executions.trend, Trend::NEUTRAL);
    }

    #[test]
    fn timeline_rates_and_average() {
        let t = timeline(&[
            snap("2024-03-14", 1, 0, 0, 0),
            snap("2024-03-15", 1, 25, 5, 1),
        ]);
        assert_eq!(t.points[0].click_rate, 0.0);
        assert_eq!(t.points[1].click_rate, 20.0);
        assert_eq!(t.points[1].target_rate, 4.0);
        assert_eq!(t.total_searches, 25);
        assert_eq!(t.daily_average, 13);
        assert_eq!(timeline(&[]).daily_average, 0);
    }

    #[test]
    fn calendar_fills_missing_days() {
        let days = [
            CalendarDay {
                date: "2024-02-03".into(),
                executions: 4,
            },
            CalendarDay {
                date: "2024-02-29T08:00:00".into(),
                executions: 7,
            },
            CalendarDay {
                date: "2024-03-01".into(),
                executions: 9,
            },
            CalendarDay {
                date: "garbage".into(),
                executions: 9,
            },
        ];
        let month = calendar(2024, Month::February, &days).unwrap();
        assert_eq!(month.cells.len(), 29);
        // 2024-02-01 was a Thursday.
        assert_eq!(month.leading_blanks, 4);
        assert_eq!(month.cells[0].executions, 0);
        assert_eq!(month.cells[0].intensity, Intensity::None);
        assert_eq!(month.cells[2].executions, 4);
        assert_eq!(month.cells[2].intensity, Intensity::Medium);
        assert_eq!(month.cells[28].intensity, Intensity::High);
        assert_eq!(month.cells[28].date, "2024-02-29");
        assert_eq!(month.cells.iter().map(|c| c.executions).sum::<u64>(), 11);
    }

    #[test]
    fn intensity_levels() {
        assert_eq!(Intensity::for_count(0), Intensity::None);
        assert_eq!(Intensity::for_count(2), Intensity::Low);
        assert_eq!(Intensity::for_count(3), Intensity::Medium);
        assert_eq!(Intensity::for_count(5), Intensity::High);
    }
}
