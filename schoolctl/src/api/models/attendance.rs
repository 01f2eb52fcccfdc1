//! API request/response models for student attendance.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::pagination::Pagination;
use crate::attendance::audit::{AttendanceSnapshot, FieldChange, FieldTimeline};
use crate::attendance::policy::EditWindowReason;
use crate::db::models::attendance::{AttendanceDBResponse, AuditEntryDBResponse};
use crate::types::{AttendanceId, AuditEntryId, BranchId, PeriodSlotId, SectionId, StudentId, TenantId, UserId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "attendance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
    /// Counts as half a day attended
    HalfDay,
}

/// What an audit entry recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "audit_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkAttendanceEntry {
    #[schema(value_type = String, format = "uuid")]
    pub student_id: StudentId,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

/// Mark attendance for (part of) a section's roster on one date and period.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkAttendanceRequest {
    #[schema(value_type = String, format = "uuid")]
    pub section_id: SectionId,
    pub attendance_date: NaiveDate,
    /// Omit for whole-day attendance
    #[schema(value_type = Option<String>, format = "uuid")]
    pub period_slot_id: Option<PeriodSlotId>,
    pub entries: Vec<MarkAttendanceEntry>,
}

/// Partial edit of a marked record. Empty `remarks` clears them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AttendanceEdit {
    pub status: Option<AttendanceStatus>,
    pub remarks: Option<String>,
    /// Stored on the audit entry
    pub reason: Option<String>,
}

/// Query parameters for deleting a record
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DeleteAttendanceQuery {
    /// Stored on the audit entry
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AttendanceId,
    #[schema(value_type = String, format = "uuid")]
    pub tenant_id: TenantId,
    #[schema(value_type = String, format = "uuid")]
    pub branch_id: BranchId,
    #[schema(value_type = String, format = "uuid")]
    pub section_id: SectionId,
    #[schema(value_type = String, format = "uuid")]
    pub student_id: StudentId,
    pub attendance_date: NaiveDate,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub period_slot_id: Option<PeriodSlotId>,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub marked_by: UserId,
    pub marked_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub last_edited_by: Option<UserId>,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing attendance records
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListAttendanceQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[param(value_type = Option<String>, format = "uuid")]
    pub section_id: Option<SectionId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub student_id: Option<StudentId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub period_slot_id: Option<PeriodSlotId>,
    pub status: Option<AttendanceStatus>,
    /// Inclusive start date
    pub from: Option<NaiveDate>,
    /// Inclusive end date
    pub to: Option<NaiveDate>,
}

/// Whether the caller may edit a record right now.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EditWindowStatusResponse {
    #[schema(value_type = String, format = "uuid")]
    pub attendance_id: AttendanceId,
    pub editable: bool,
    pub window_ends_at: DateTime<Utc>,
    pub window_minutes: i64,
    pub reason: EditWindowReason,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditEntryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AuditEntryId,
    #[schema(value_type = String, format = "uuid")]
    pub attendance_id: AttendanceId,
    pub action: AuditAction,
    #[schema(value_type = String, format = "uuid")]
    pub changed_by: UserId,
    pub changed_at: DateTime<Utc>,
    pub changes: Vec<FieldChange>,
    /// Record state before this entry (absent on creation)
    pub previous: Option<AttendanceSnapshot>,
    pub reason: Option<String>,
    pub override_applied: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceHistoryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub attendance_id: AttendanceId,
    /// Oldest first
    pub entries: Vec<AuditEntryResponse>,
    pub fields: Vec<FieldTimeline>,
    /// State obtained by replaying `entries`; `null` once the record is deleted
    pub current: Option<AttendanceSnapshot>,
}

impl From<AttendanceDBResponse> for AttendanceResponse {
    fn from(db: AttendanceDBResponse) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            branch_id: db.branch_id,
            section_id: db.section_id,
            student_id: db.student_id,
            attendance_date: db.attendance_date,
            period_slot_id: db.period_slot_id,
            status: db.status,
            remarks: db.remarks,
            marked_by: db.marked_by,
            marked_at: db.marked_at,
            last_edited_by: db.last_edited_by,
            last_edited_at: db.last_edited_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<AuditEntryDBResponse> for AuditEntryResponse {
    fn from(db: AuditEntryDBResponse) -> Self {
        Self {
            id: db.id,
            attendance_id: db.attendance_id,
            action: db.action,
            changed_by: db.changed_by,
            changed_at: db.changed_at,
            changes: db.changes.0,
            previous: db.previous.map(|p| p.0),
            reason: db.reason,
            override_applied: db.override_applied,
        }
    }
}
