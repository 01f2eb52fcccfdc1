//! Student attendance rules.
//!
//! Attendance records are mutable only for a bounded time after they are marked. This module
//! holds the rules the HTTP handlers and repositories lean on, kept free of I/O so that they can
//! be exercised directly:
//!
//! - [`policy`]: the edit window and the original-marker / admin override decision, plus the
//!   date rules applied when marking
//! - [`audit`]: field-level change sets, snapshots and reconstruction of a record's history from
//!   its append-only audit trail
//! - [`summary`]: per-status tallies and attendance percentages used by the reports
//!
//! # Edit window
//!
//! ```text
//! marked_at                     marked_at + window
//!     |------ marker may edit ------|------ admins only ------>
//! ```
//!
//! Admins (platform or school) may always edit. Anyone else must be the user who marked the
//! record, and must edit before the window closes. The window is anchored to `marked_at`; edits do
//! not extend it.

pub mod audit;
pub mod policy;
pub mod summary;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::types::{AttendanceId, StudentId};

/// Sentinel errors raised by the attendance module.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttendanceError {
    #[error("Attendance record {id} not found")]
    NotFound { id: AttendanceId },

    #[error("The edit window for this record closed at {window_ended_at}")]
    EditWindowExpired { window_ended_at: DateTime<Utc> },

    #[error("Only the user who marked this record may edit it")]
    NotOriginalMarker,

    #[error("Attendance already marked for {} student(s) on this date and period", student_ids.len())]
    AlreadyMarked { student_ids: Vec<StudentId> },

    #[error("Attendance cannot be marked for a future date ({date})")]
    FutureDate { date: NaiveDate },

    #[error("Attendance older than {max_days} days can only be marked by an administrator")]
    BeyondBackdateLimit { date: NaiveDate, max_days: u32 },

    #[error("{} student(s) are not active members of this section", student_ids.len())]
    StudentsNotInSection { student_ids: Vec<StudentId> },

    #[error("Student {student_id} appears more than once")]
    DuplicateStudent { student_id: StudentId },

    #[error("At least one attendance entry is required")]
    EmptyRoster,

    #[error("Invalid date range: {message}")]
    InvalidDateRange { message: String },
}
