//! Database models for student attendance and its audit trail.

use crate::api::models::attendance::{AttendanceStatus, AuditAction};
use crate::attendance::audit::{AttendanceSnapshot, FieldChange, TrailEntry};
use crate::types::{AttendanceId, AuditEntryId, BranchId, PeriodSlotId, SectionId, StudentId, TenantId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use sqlx::types::Json;

/// One student's line in a marking request
#[derive(Debug, Clone)]
pub struct AttendanceMarkEntry {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

/// Database request for marking a batch of students on one date and period
#[derive(Debug, Clone)]
pub struct AttendanceMarkDBRequest {
    pub tenant_id: TenantId,
    pub branch_id: BranchId,
    pub section_id: SectionId,
    pub attendance_date: NaiveDate,
    pub period_slot_id: Option<PeriodSlotId>,
    pub marked_by: UserId,
    pub marked_at: DateTime<Utc>,
    pub entries: Vec<AttendanceMarkEntry>,
}

/// Database request for applying an authorised edit
#[derive(Debug, Clone)]
pub struct AttendanceEditDBRequest {
    pub next: AttendanceSnapshot,
    pub edited_by: UserId,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AttendanceDBResponse {
    pub id: AttendanceId,
    pub tenant_id: TenantId,
    pub branch_id: BranchId,
    pub section_id: SectionId,
    pub student_id: StudentId,
    pub attendance_date: NaiveDate,
    pub period_slot_id: Option<PeriodSlotId>,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub marked_by: UserId,
    pub marked_at: DateTime<Utc>,
    pub last_edited_by: Option<UserId>,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceDBResponse {
    pub fn snapshot(&self) -> AttendanceSnapshot {
        AttendanceSnapshot {
            status: self.status,
            remarks: self.remarks.clone(),
        }
    }
}

/// Database request for appending an audit entry
#[derive(Debug, Clone)]
pub struct AuditEntryCreateDBRequest {
    pub tenant_id: TenantId,
    pub attendance_id: AttendanceId,
    pub action: AuditAction,
    pub changed_by: UserId,
    pub changed_at: DateTime<Utc>,
    pub changes: Vec<FieldChange>,
    pub previous: Option<AttendanceSnapshot>,
    pub reason: Option<String>,
    pub override_applied: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditEntryDBResponse {
    pub id: AuditEntryId,
    pub seq: i64,
    pub tenant_id: TenantId,
    pub attendance_id: AttendanceId,
    pub action: AuditAction,
    pub changed_by: UserId,
    pub changed_at: DateTime<Utc>,
    pub changes: Json<Vec<FieldChange>>,
    pub previous: Option<Json<AttendanceSnapshot>>,
    pub reason: Option<String>,
    pub override_applied: bool,
}

impl From<&AuditEntryDBResponse> for TrailEntry {
    fn from(entry: &AuditEntryDBResponse) -> Self {
        Self {
            action: entry.action,
            changed_at: entry.changed_at,
            changed_by: entry.changed_by,
            changes: entry.changes.0.clone(),
        }
    }
}
