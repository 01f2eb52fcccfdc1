//! Database repository for students.
//!
//! Students are soft deleted: `delete` stamps `deleted_at` and every read ignores stamped rows,
//! so attendance history keeps pointing at a real row.

use crate::types::{BranchId, SectionId, StudentId, TenantId, abbrev_uuid};
use crate::{
    api::models::students::StudentStatus,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::students::{StudentCreateDBRequest, StudentDBResponse, StudentUpdateDBRequest},
    },
};
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing students of a tenant
#[derive(Debug, Clone)]
pub struct StudentFilter {
    pub tenant_id: TenantId,
    pub skip: i64,
    pub limit: i64,
    pub section_id: Option<SectionId>,
    pub branch_id: Option<BranchId>,
    pub status: Option<StudentStatus>,
    /// ILIKE pattern, already wrapped in `%`
    pub search: Option<String>,
}

impl StudentFilter {
    pub fn new(tenant_id: TenantId, skip: i64, limit: i64) -> Self {
        Self {
            tenant_id,
            skip,
            limit,
            section_id: None,
            branch_id: None,
            status: None,
            search: None,
        }
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.trim().is_empty()).map(|s| format!("%{}%", s.trim()));
        self
    }
}

const FILTER_CLAUSE: &str = r#"
    deleted_at IS NULL
    AND tenant_id = $1
    AND ($2::UUID IS NULL OR section_id = $2)
    AND ($3::UUID IS NULL OR branch_id = $3)
    AND ($4::student_status IS NULL OR status = $4)
    AND ($5::TEXT IS NULL
         OR first_name ILIKE $5
         OR last_name ILIKE $5
         OR (first_name || ' ' || last_name) ILIKE $5
         OR admission_number ILIKE $5)
"#;

pub struct Students<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Students<'c> {
    type CreateRequest = StudentCreateDBRequest;
    type UpdateRequest = StudentUpdateDBRequest;
    type Response = StudentDBResponse;
    type Id = StudentId;
    type Filter = StudentFilter;

    #[instrument(skip(self, request), fields(tenant_id = %abbrev_uuid(&request.tenant_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let student = sqlx::query_as::<_, StudentDBResponse>(
            r#"
            INSERT INTO students (id, tenant_id, branch_id, section_id, admission_number, first_name, last_name, date_of_birth)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, tenant_id, branch_id, section_id, admission_number, first_name, last_name, date_of_birth,
                      status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.tenant_id)
        .bind(request.branch_id)
        .bind(request.section_id)
        .bind(&request.admission_number)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.date_of_birth)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(student)
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let student = sqlx::query_as::<_, StudentDBResponse>("SELECT * FROM students WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(student)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %abbrev_uuid(&filter.tenant_id), limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let query = format!(
            "SELECT * FROM students WHERE {FILTER_CLAUSE} ORDER BY last_name ASC, first_name ASC, admission_number ASC LIMIT $6 OFFSET $7"
        );
        let students = sqlx::query_as::<_, StudentDBResponse>(&query)
            .bind(filter.tenant_id)
            .bind(filter.section_id)
            .bind(filter.branch_id)
            .bind(filter.status)
            .bind(&filter.search)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(students)
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE students SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let student = sqlx::query_as::<_, StudentDBResponse>(
            r#"
            UPDATE students SET
                section_id = CASE WHEN $2 THEN $3 ELSE section_id END,
                admission_number = COALESCE($4, admission_number),
                first_name = COALESCE($5, first_name),
                last_name = COALESCE($6, last_name),
                date_of_birth = COALESCE($7, date_of_birth),
                status = COALESCE($8, status),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.section_id.is_some())
        .bind(request.section_id.flatten())
        .bind(&request.admission_number)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.date_of_birth)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(student)
    }
}

impl<'c> Students<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &StudentFilter) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM students WHERE {FILTER_CLAUSE}");
        let count = sqlx::query_scalar::<_, i64>(&query)
            .bind(filter.tenant_id)
            .bind(filter.section_id)
            .bind(filter.branch_id)
            .bind(filter.status)
            .bind(&filter.search)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    /// Active students of a section, in register order
    #[instrument(skip(self), fields(section_id = %abbrev_uuid(&section_id)), err)]
    pub async fn active_roster(&mut self, section_id: SectionId) -> Result<Vec<StudentDBResponse>> {
        let students = sqlx::query_as::<_, StudentDBResponse>(
            r#"
            SELECT * FROM students
            WHERE section_id = $1 AND status = 'active' AND deleted_at IS NULL
            ORDER BY last_name ASC, first_name ASC, admission_number ASC
            "#,
        )
        .bind(section_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(students)
    }

    /// The subset of `student_ids` that are not active members of the section, in input order
    #[instrument(skip(self, student_ids), fields(section_id = %abbrev_uuid(&section_id), count = student_ids.len()), err)]
    pub async fn non_members(&mut self, section_id: SectionId, student_ids: &[StudentId]) -> Result<Vec<StudentId>> {
        let members: Vec<StudentId> = sqlx::query_scalar(
            r#"
            SELECT id FROM students
            WHERE id = ANY($1) AND section_id = $2 AND status = 'active' AND deleted_at IS NULL
            "#,
        )
        .bind(student_ids)
        .bind(section_id)
        .fetch_all(&mut *self.db)
        .await?;

        let members: HashSet<StudentId> = members.into_iter().collect();
        Ok(student_ids.iter().filter(|id| !members.contains(id)).copied().collect())
    }
}
