//! API models for attendance reports.

use crate::api::models::attendance::AttendanceStatus;
use crate::attendance::summary::StatusCounts;
use crate::types::{AttendanceId, PeriodSlotId, SectionId, StudentId, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for a section's daily register
#[derive(Debug, Deserialize, IntoParams)]
pub struct SectionRegisterQuery {
    pub date: NaiveDate,
    /// Omit for whole-day attendance
    #[param(value_type = Option<String>, format = "uuid")]
    pub period_slot_id: Option<PeriodSlotId>,
}

/// Inclusive date range for summaries (at most 366 days)
#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// One roster line of a register. Attendance fields are null when the student is unmarked.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterEntry {
    #[schema(value_type = String, format = "uuid")]
    pub student_id: StudentId,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub attendance_id: Option<AttendanceId>,
    pub status: Option<AttendanceStatus>,
    pub remarks: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub marked_by: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SectionRegisterResponse {
    #[schema(value_type = String, format = "uuid")]
    pub section_id: SectionId,
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub period_slot_id: Option<PeriodSlotId>,
    pub entries: Vec<RegisterEntry>,
    pub totals: StatusCounts,
    pub unmarked: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentAttendanceSummary {
    #[schema(value_type = String, format = "uuid")]
    pub student_id: StudentId,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub counts: StatusCounts,
    pub total_marked: i64,
    /// `null` when no countable (non-excused) records exist in the range
    pub attendance_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SectionSummaryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub section_id: SectionId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub students: Vec<StudentAttendanceSummary>,
}
