//! Database repository for student attendance records.
//!
//! Marking inserts a batch of rows for one section, date and period. The partial unique index
//! `student_attendance_unique_mark` guarantees at most one live record per student, date and
//! period even when two markers race; `already_marked` exists so the common case gets a clean
//! error listing every offending student instead of the first constraint hit.
//!
//! Records are never hard deleted. Edits and deletes must go through [`Attendance::get_for_update`]
//! inside a transaction so the window check and the audit append see the same row.

use crate::types::{AttendanceId, BranchId, PeriodSlotId, SectionId, StudentId, TenantId, abbrev_uuid};
use crate::{
    api::models::attendance::AttendanceStatus,
    db::{
        errors::{DbError, Result},
        models::attendance::{AttendanceDBResponse, AttendanceEditDBRequest, AttendanceMarkDBRequest},
    },
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing attendance records of a tenant
#[derive(Debug, Clone)]
pub struct AttendanceFilter {
    pub tenant_id: TenantId,
    pub skip: i64,
    pub limit: i64,
    pub branch_id: Option<BranchId>,
    pub section_id: Option<SectionId>,
    pub student_id: Option<StudentId>,
    pub period_slot_id: Option<PeriodSlotId>,
    pub status: Option<AttendanceStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AttendanceFilter {
    pub fn new(tenant_id: TenantId, skip: i64, limit: i64) -> Self {
        Self {
            tenant_id,
            skip,
            limit,
            branch_id: None,
            section_id: None,
            student_id: None,
            period_slot_id: None,
            status: None,
            from: None,
            to: None,
        }
    }
}

const FILTER_CLAUSE: &str = r#"
    deleted_at IS NULL
    AND tenant_id = $1
    AND ($2::UUID IS NULL OR section_id = $2)
    AND ($3::UUID IS NULL OR student_id = $3)
    AND ($4::UUID IS NULL OR period_slot_id = $4)
    AND ($5::attendance_status IS NULL OR status = $5)
    AND ($6::DATE IS NULL OR attendance_date >= $6)
    AND ($7::DATE IS NULL OR attendance_date <= $7)
    AND ($8::UUID IS NULL OR branch_id = $8)
"#;

pub struct Attendance<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Attendance<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert one record per entry. Callers are expected to run this inside a transaction.
    #[instrument(skip(self, request), fields(section_id = %abbrev_uuid(&request.section_id), count = request.entries.len()), err)]
    pub async fn insert_batch(&mut self, request: &AttendanceMarkDBRequest) -> Result<Vec<AttendanceDBResponse>> {
        let mut records = Vec::with_capacity(request.entries.len());
        for entry in &request.entries {
            let record = sqlx::query_as::<_, AttendanceDBResponse>(
                r#"
                INSERT INTO student_attendance (
                    id, tenant_id, branch_id, section_id, student_id, attendance_date, period_slot_id,
                    status, remarks, marked_by, marked_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING id, tenant_id, branch_id, section_id, student_id, attendance_date, period_slot_id,
                          status, remarks, marked_by, marked_at, last_edited_by, last_edited_at, created_at, updated_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(request.tenant_id)
            .bind(request.branch_id)
            .bind(request.section_id)
            .bind(entry.student_id)
            .bind(request.attendance_date)
            .bind(request.period_slot_id)
            .bind(entry.status)
            .bind(entry.remarks.as_deref().map(str::trim).filter(|r| !r.is_empty()))
            .bind(request.marked_by)
            .bind(request.marked_at)
            .fetch_one(&mut *self.db)
            .await?;
            records.push(record);
        }
        Ok(records)
    }

    /// Students among `student_ids` that already have a live record for the date and period
    #[instrument(skip(self, student_ids), fields(count = student_ids.len()), err)]
    pub async fn already_marked(
        &mut self,
        tenant_id: TenantId,
        student_ids: &[StudentId],
        date: NaiveDate,
        period_slot_id: Option<PeriodSlotId>,
    ) -> Result<Vec<StudentId>> {
        let marked = sqlx::query_scalar::<_, StudentId>(
            r#"
            SELECT student_id FROM student_attendance
            WHERE tenant_id = $1
              AND student_id = ANY($2)
              AND attendance_date = $3
              AND period_slot_id IS NOT DISTINCT FROM $4::UUID
              AND deleted_at IS NULL
            ORDER BY student_id
            "#,
        )
        .bind(tenant_id)
        .bind(student_ids)
        .bind(date)
        .bind(period_slot_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(marked)
    }

    #[instrument(skip(self), fields(attendance_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: AttendanceId) -> Result<Option<AttendanceDBResponse>> {
        let record = sqlx::query_as::<_, AttendanceDBResponse>(
            "SELECT * FROM student_attendance WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(record)
    }

    /// Fetch a record whether or not it has been soft-deleted
    #[instrument(skip(self), fields(attendance_id = %abbrev_uuid(&id)), err)]
    pub async fn get_including_deleted(&mut self, id: AttendanceId) -> Result<Option<AttendanceDBResponse>> {
        let record = sqlx::query_as::<_, AttendanceDBResponse>("SELECT * FROM student_attendance WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(record)
    }

    /// Fetch a live record and lock it until the surrounding transaction ends
    #[instrument(skip(self), fields(attendance_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: AttendanceId) -> Result<Option<AttendanceDBResponse>> {
        let record = sqlx::query_as::<_, AttendanceDBResponse>(
            "SELECT * FROM student_attendance WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(record)
    }

    #[instrument(skip(self, request), fields(attendance_id = %abbrev_uuid(&id)), err)]
    pub async fn apply_edit(&mut self, id: AttendanceId, request: &AttendanceEditDBRequest) -> Result<AttendanceDBResponse> {
        let record = sqlx::query_as::<_, AttendanceDBResponse>(
            r#"
            UPDATE student_attendance SET
                status = $2,
                remarks = $3,
                last_edited_by = $4,
                last_edited_at = $5,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.next.status)
        .bind(&request.next.remarks)
        .bind(request.edited_by)
        .bind(request.edited_at)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(record)
    }

    #[instrument(skip(self), fields(attendance_id = %abbrev_uuid(&id)), err)]
    pub async fn soft_delete(&mut self, id: AttendanceId, deleted_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE student_attendance SET deleted_at = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(deleted_at)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %abbrev_uuid(&filter.tenant_id), limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &AttendanceFilter) -> Result<Vec<AttendanceDBResponse>> {
        let query = format!(
            "SELECT * FROM student_attendance WHERE {FILTER_CLAUSE} \
             ORDER BY attendance_date DESC, marked_at DESC, id ASC LIMIT $9 OFFSET $10"
        );
        let records = sqlx::query_as::<_, AttendanceDBResponse>(&query)
            .bind(filter.tenant_id)
            .bind(filter.section_id)
            .bind(filter.student_id)
            .bind(filter.period_slot_id)
            .bind(filter.status)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.branch_id)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(records)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &AttendanceFilter) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM student_attendance WHERE {FILTER_CLAUSE}");
        let count = sqlx::query_scalar::<_, i64>(&query)
            .bind(filter.tenant_id)
            .bind(filter.section_id)
            .bind(filter.student_id)
            .bind(filter.period_slot_id)
            .bind(filter.status)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.branch_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::attendance::audit::AttendanceSnapshot;
    use crate::db::models::attendance::AttendanceMarkEntry;
    use crate::test_utils::{create_test_branch, create_test_section, create_test_student, create_test_tenant, create_test_user};
    use sqlx::PgPool;

    struct Fixture {
        request: AttendanceMarkDBRequest,
        students: Vec<StudentId>,
    }

    async fn fixture(pool: &PgPool, slug: &str) -> Fixture {
        let tenant = create_test_tenant(pool, slug).await;
        let branch = create_test_branch(pool, tenant.id, "MAIN").await;
        let section = create_test_section(pool, tenant.id, branch.id, "A").await;
        let teacher = create_test_user(pool, Some(tenant.id), Some(branch.id), Role::Teacher).await;
        let first = create_test_student(pool, tenant.id, branch.id, Some(section.id), "S-1").await;
        let second = create_test_student(pool, tenant.id, branch.id, Some(section.id), "S-2").await;

        Fixture {
            request: AttendanceMarkDBRequest {
                tenant_id: tenant.id,
                branch_id: branch.id,
                section_id: section.id,
                attendance_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                period_slot_id: None,
                marked_by: teacher.id,
                marked_at: Utc::now(),
                entries: vec![
                    AttendanceMarkEntry {
                        student_id: first.id,
                        status: AttendanceStatus::Present,
                        remarks: None,
                    },
                    AttendanceMarkEntry {
                        student_id: second.id,
                        status: AttendanceStatus::Absent,
                        remarks: Some("  fever  ".to_string()),
                    },
                ],
            },
            students: vec![first.id, second.id],
        }
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_insert_batch_and_already_marked(pool: PgPool) {
        let fx = fixture(&pool, "attendance-batch").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Attendance::new(&mut conn);

        let records = repo.insert_batch(&fx.request).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].remarks.as_deref(), Some("fever"));

        let mut marked = repo
            .already_marked(fx.request.tenant_id, &fx.students, fx.request.attendance_date, None)
            .await
            .unwrap();
        marked.sort();
        let mut expected = fx.students.clone();
        expected.sort();
        assert_eq!(marked, expected);

        // A different period on the same date is a separate mark
        let other_date = repo
            .already_marked(fx.request.tenant_id, &fx.students, fx.request.attendance_date.succ_opt().unwrap(), None)
            .await
            .unwrap();
        assert!(other_date.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_unique_mark_enforced_for_whole_day(pool: PgPool) {
        let fx = fixture(&pool, "attendance-unique").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Attendance::new(&mut conn);

        repo.insert_batch(&fx.request).await.unwrap();
        let err = repo.insert_batch(&fx.request).await.unwrap_err();
        match err {
            DbError::UniqueViolation { constraint, .. } => {
                assert_eq!(constraint.as_deref(), Some("student_attendance_unique_mark"))
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_edit_and_soft_delete(pool: PgPool) {
        let fx = fixture(&pool, "attendance-edit").await;
        let mut tx = pool.begin().await.unwrap();
        let mut repo = Attendance::new(&mut tx);

        let records = repo.insert_batch(&fx.request).await.unwrap();
        let id = records[0].id;

        let locked = repo.get_for_update(id).await.unwrap().unwrap();
        let edited = repo
            .apply_edit(
                id,
                &AttendanceEditDBRequest {
                    next: locked.snapshot().apply(Some(AttendanceStatus::Late), Some("bus delayed")),
                    edited_by: fx.request.marked_by,
                    edited_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            edited.snapshot(),
            AttendanceSnapshot {
                status: AttendanceStatus::Late,
                remarks: Some("bus delayed".to_string())
            }
        );
        assert_eq!(edited.last_edited_by, Some(fx.request.marked_by));

        assert!(repo.soft_delete(id, Utc::now()).await.unwrap());
        assert!(!repo.soft_delete(id, Utc::now()).await.unwrap());
        assert!(repo.get_by_id(id).await.unwrap().is_none());
        assert!(repo.get_for_update(id).await.unwrap().is_none());

        // The slot is free again after a delete
        let remaining = repo
            .already_marked(fx.request.tenant_id, &fx.students, fx.request.attendance_date, None)
            .await
            .unwrap();
        assert_eq!(remaining, vec![fx.students[1]]);
        tx.commit().await.unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_list_filters(pool: PgPool) {
        let fx = fixture(&pool, "attendance-list").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Attendance::new(&mut conn);
        repo.insert_batch(&fx.request).await.unwrap();

        let all = AttendanceFilter::new(fx.request.tenant_id, 0, 10);
        assert_eq!(repo.count(&all).await.unwrap(), 2);

        let absent = AttendanceFilter {
            status: Some(AttendanceStatus::Absent),
            ..all.clone()
        };
        let records = repo.list(&absent).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student_id, fx.students[1]);

        let later = AttendanceFilter {
            from: NaiveDate::from_ymd_opt(2025, 3, 11),
            ..all.clone()
        };
        assert_eq!(repo.count(&later).await.unwrap(), 0);

        let other_tenant = create_test_tenant(&pool, "attendance-other").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Attendance::new(&mut conn);
        assert_eq!(repo.count(&AttendanceFilter::new(other_tenant.id, 0, 10)).await.unwrap(), 0);
    }
}
