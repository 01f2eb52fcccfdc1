//! Read-only queries behind the attendance reports.

use crate::{
    db::{
        errors::Result,
        models::reports::{RegisterRow, StatusCountRow},
    },
    types::{PeriodSlotId, SectionId, StudentId, TenantId, abbrev_uuid},
};
use chrono::NaiveDate;
use sqlx::PgConnection;
use tracing::instrument;

pub struct Reports<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Reports<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// The section's active roster with each student's live record for the date and period, if any
    #[instrument(skip(self), fields(section_id = %abbrev_uuid(&section_id)), err)]
    pub async fn section_register(
        &mut self,
        section_id: SectionId,
        date: NaiveDate,
        period_slot_id: Option<PeriodSlotId>,
    ) -> Result<Vec<RegisterRow>> {
        let rows = sqlx::query_as::<_, RegisterRow>(
            r#"
            SELECT
                s.id AS student_id,
                s.admission_number,
                s.first_name,
                s.last_name,
                a.id AS attendance_id,
                a.status,
                a.remarks,
                a.marked_by
            FROM students s
            LEFT JOIN student_attendance a
                ON a.student_id = s.id
               AND a.attendance_date = $2
               AND a.period_slot_id IS NOT DISTINCT FROM $3::UUID
               AND a.deleted_at IS NULL
            WHERE s.section_id = $1 AND s.status = 'active' AND s.deleted_at IS NULL
            ORDER BY s.last_name ASC, s.first_name ASC, s.admission_number ASC
            "#,
        )
        .bind(section_id)
        .bind(date)
        .bind(period_slot_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }

    /// Live record counts per student and status over an inclusive date range.
    ///
    /// With `section_id` set, only records taken in that section are counted.
    #[instrument(skip(self, student_ids), fields(tenant_id = %abbrev_uuid(&tenant_id), count = student_ids.len()), err)]
    pub async fn status_counts(
        &mut self,
        tenant_id: TenantId,
        student_ids: &[StudentId],
        from: NaiveDate,
        to: NaiveDate,
        section_id: Option<SectionId>,
    ) -> Result<Vec<StatusCountRow>> {
        if student_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, StatusCountRow>(
            r#"
            SELECT student_id, status, COUNT(*) AS count
            FROM student_attendance
            WHERE tenant_id = $1
              AND student_id = ANY($2)
              AND attendance_date BETWEEN $3 AND $4
              AND ($5::UUID IS NULL OR section_id = $5)
              AND deleted_at IS NULL
            GROUP BY student_id, status
            "#,
        )
        .bind(tenant_id)
        .bind(student_ids)
        .bind(from)
        .bind(to)
        .bind(section_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }
}
