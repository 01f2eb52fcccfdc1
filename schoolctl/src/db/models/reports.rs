//! Row shapes returned by report queries.

use crate::api::models::attendance::AttendanceStatus;
use crate::api::models::reports::RegisterEntry;
use crate::types::{AttendanceId, StudentId, UserId};
use sqlx::FromRow;

/// A roster student joined with their (optional) attendance record
#[derive(Debug, Clone, FromRow)]
pub struct RegisterRow {
    pub student_id: StudentId,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub attendance_id: Option<AttendanceId>,
    pub status: Option<AttendanceStatus>,
    pub remarks: Option<String>,
    pub marked_by: Option<UserId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct StatusCountRow {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
    pub count: i64,
}

impl From<RegisterRow> for RegisterEntry {
    fn from(row: RegisterRow) -> Self {
        Self {
            student_id: row.student_id,
            admission_number: row.admission_number,
            first_name: row.first_name,
            last_name: row.last_name,
            attendance_id: row.attendance_id,
            status: row.status,
            remarks: row.remarks,
            marked_by: row.marked_by,
        }
    }
}
