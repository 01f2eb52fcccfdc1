//! Attendance tallies for reports.

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::AttendanceError;
use crate::api::models::attendance::AttendanceStatus;

/// Longest range a summary report may cover, in days (inclusive of both ends).
pub const MAX_REPORT_RANGE_DAYS: i64 = 366;

/// Number of records in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub excused: i64,
    pub half_day: i64,
}

impl StatusCounts {
    pub fn add(&mut self, status: AttendanceStatus, count: i64) {
        match status {
            AttendanceStatus::Present => self.present += count,
            AttendanceStatus::Absent => self.absent += count,
            AttendanceStatus::Late => self.late += count,
            AttendanceStatus::Excused => self.excused += count,
            AttendanceStatus::HalfDay => self.half_day += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.present + self.absent + self.late + self.excused + self.half_day
    }

    /// (present + late + ½·half_day) / (total − excused) × 100, two decimals.
    ///
    /// Excused records count neither for nor against the student. `None` when nothing countable
    /// was recorded.
    pub fn attendance_percentage(&self) -> Option<f64> {
        let countable = self.total() - self.excused;
        if countable <= 0 {
            return None;
        }
        let attended = self.present as f64 + self.late as f64 + 0.5 * self.half_day as f64;
        Some((attended / countable as f64 * 10_000.0).round() / 100.0)
    }
}

impl FromIterator<(AttendanceStatus, i64)> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = (AttendanceStatus, i64)>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for (status, count) in iter {
            counts.add(status, count);
        }
        counts
    }
}

/// Validate an inclusive report range.
pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), AttendanceError> {
    if from > to {
        return Err(AttendanceError::InvalidDateRange {
            message: format!("from ({from}) is after to ({to})"),
        });
    }
    let days = (to - from).num_days() + 1;
    if days > MAX_REPORT_RANGE_DAYS {
        return Err(AttendanceError::InvalidDateRange {
            message: format!("range covers {days} days, maximum is {MAX_REPORT_RANGE_DAYS}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_from_grouped_rows() {
        let counts: StatusCounts = vec![
            (AttendanceStatus::Present, 15),
            (AttendanceStatus::Absent, 2),
            (AttendanceStatus::Present, 3),
            (AttendanceStatus::HalfDay, 1),
        ]
        .into_iter()
        .collect();

        assert_eq!(counts.present, 18);
        assert_eq!(counts.absent, 2);
        assert_eq!(counts.half_day, 1);
        assert_eq!(counts.total(), 21);
    }

    #[test]
    fn test_percentage_excludes_excused() {
        let counts = StatusCounts {
            present: 7,
            absent: 1,
            late: 1,
            excused: 2,
            half_day: 1,
        };
        // (7 + 1 + 0.5) / (12 - 2) = 85%
        assert_eq!(counts.attendance_percentage(), Some(85.0));
    }

    #[test]
    fn test_percentage_rounding() {
        let counts = StatusCounts {
            present: 2,
            absent: 1,
            ..Default::default()
        };
        assert_eq!(counts.attendance_percentage(), Some(66.67));
    }

    #[test]
    fn test_percentage_undefined_without_countable_days() {
        assert_eq!(StatusCounts::default().attendance_percentage(), None);
        let only_excused = StatusCounts {
            excused: 4,
            ..Default::default()
        };
        assert_eq!(only_excused.attendance_percentage(), None);
    }

    #[test]
    fn test_validate_range() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert!(validate_range(d("2025-01-01"), d("2025-01-01")).is_ok());
        assert!(validate_range(d("2024-01-01"), d("2024-12-31")).is_ok()); // leap year, 366 days
        assert!(validate_range(d("2025-01-02"), d("2025-01-01")).is_err());
        assert!(validate_range(d("2024-01-01"), d("2025-01-01")).is_err());
    }
}
