//! Append-only audit trail for attendance records.
//!
//! Entries are only ever inserted. The table's triggers reject updates, deletes and truncation.

use crate::{
    db::{
        errors::Result,
        models::attendance::{AuditEntryCreateDBRequest, AuditEntryDBResponse},
    },
    types::{AttendanceId, abbrev_uuid},
};
use sqlx::PgConnection;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

pub struct AttendanceAudit<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AttendanceAudit<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(attendance_id = %abbrev_uuid(&request.attendance_id), action = ?request.action), err)]
    pub async fn append(&mut self, request: &AuditEntryCreateDBRequest) -> Result<AuditEntryDBResponse> {
        let entry = sqlx::query_as::<_, AuditEntryDBResponse>(
            r#"
            INSERT INTO attendance_audit_entries (
                id, tenant_id, attendance_id, action, changed_by, changed_at, changes, previous, reason, override_applied
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.tenant_id)
        .bind(request.attendance_id)
        .bind(request.action)
        .bind(request.changed_by)
        .bind(request.changed_at)
        .bind(Json(&request.changes))
        .bind(request.previous.as_ref().map(Json))
        .bind(request.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()))
        .bind(request.override_applied)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(entry)
    }

    /// Every entry for a record in insertion order. Includes entries of a deleted record.
    #[instrument(skip(self), fields(attendance_id = %abbrev_uuid(&attendance_id)), err)]
    pub async fn list_for_record(&mut self, attendance_id: AttendanceId) -> Result<Vec<AuditEntryDBResponse>> {
        let entries = sqlx::query_as::<_, AuditEntryDBResponse>(
            "SELECT * FROM attendance_audit_entries WHERE attendance_id = $1 ORDER BY seq ASC",
        )
        .bind(attendance_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(entries)
    }
}
