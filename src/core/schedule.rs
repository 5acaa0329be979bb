use crate::utils::error::{AspectError, Result};
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use cron::Schedule;
use std::fmt;
use std::str::FromStr;

/// A once-a-day trigger at a fixed UTC wall-clock time.
#[derive(Debug, Clone)]
pub struct DailySchedule {
    time: NaiveTime,
    cron: Schedule,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
        Self::at(time).ok()
    }

    fn at(time: NaiveTime) -> Result<Self> {
        // sec min hour dom month dow year
        let expression = format!("0 {} {} * * * *", time.minute(), time.hour());
        let cron = Schedule::from_str(&expression).map_err(|e| AspectError::ConfigError {
            message: format!("Invalid cron expression '{}': {}", expression, e),
        })?;
        Ok(Self { time, cron })
    }

    /// First trigger strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.cron
            .after(&now)
            .next()
            .ok_or_else(|| AspectError::ConfigError {
                message: format!("No run of the {} schedule after {}", self, now),
            })
    }

    /// Time left until the next trigger.
    pub fn wait_from(&self, now: DateTime<Utc>) -> Result<std::time::Duration> {
        let next = self.next_run_after(now)?;
        Ok((next - now).to_std().unwrap_or_default())
    }
}

impl PartialEq for DailySchedule {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl Eq for DailySchedule {}

impl fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} UTC", self.time.format("%H:%M"))
    }
}

impl FromStr for DailySchedule {
    type Err = AspectError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let time = NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|e| {
            AspectError::InvalidConfigValueError {
                field: "schedule.utc_time".to_string(),
                value: s.to_string(),
                reason: format!("expected HH:MM ({})", e),
            }
        })?;
        Self::at(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, h, m, s).unwrap()
    }

    #[test]
    fn test_parse_hh_mm() {
        let schedule: DailySchedule = "06:30".parse().unwrap();
        assert_eq!(schedule, DailySchedule::new(6, 30).unwrap());
        assert_eq!(schedule.to_string(), "06:30 UTC");
        assert!("25:00".parse::<DailySchedule>().is_err());
        assert!("noon".parse::<DailySchedule>().is_err());
    }

    #[test]
    fn test_next_run_later_today() {
        let schedule = DailySchedule::new(6, 0).unwrap();
        assert_eq!(schedule.next_run_after(at(5, 59, 0)).unwrap(), at(6, 0, 0));
    }

    #[test]
    fn test_next_run_is_strictly_after_now() {
        let schedule = DailySchedule::new(6, 0).unwrap();
        let next = schedule.next_run_after(at(6, 0, 0)).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_midnight_rolls_over() {
        let schedule = DailySchedule::new(0, 0).unwrap();
        let next = schedule.next_run_after(at(23, 30, 0)).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap());
        assert_eq!(
            schedule.wait_from(at(23, 30, 0)).unwrap(),
            std::time::Duration::from_secs(30 * 60)
        );
    }

    #[test]
    fn test_rolls_over_month_and_year_end() {
        let schedule = DailySchedule::new(0, 15).unwrap();
        let new_year = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            schedule.next_run_after(new_year).unwrap(),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 15, 0).unwrap()
        );
    }
}
