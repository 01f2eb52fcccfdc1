//! Database repository for class sections.

use crate::types::{BranchId, Operation, SectionId, TenantId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::sections::{SectionCreateDBRequest, SectionDBResponse, SectionUpdateDBRequest},
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing sections of a tenant
#[derive(Debug, Clone)]
pub struct SectionFilter {
    pub tenant_id: TenantId,
    pub skip: i64,
    pub limit: i64,
    pub branch_id: Option<BranchId>,
    pub academic_year: Option<String>,
    pub grade_level: Option<String>,
}

impl SectionFilter {
    pub fn new(tenant_id: TenantId, skip: i64, limit: i64) -> Self {
        Self {
            tenant_id,
            skip,
            limit,
            branch_id: None,
            academic_year: None,
            grade_level: None,
        }
    }
}

pub struct Sections<'c> {
    db: &'c mut PgConnection,
}

const FILTER_CLAUSE: &str = r#"
    tenant_id = $1
    AND ($2::UUID IS NULL OR branch_id = $2)
    AND ($3::TEXT IS NULL OR academic_year = $3)
    AND ($4::TEXT IS NULL OR grade_level = $4)
"#;

#[async_trait::async_trait]
impl<'c> Repository for Sections<'c> {
    type CreateRequest = SectionCreateDBRequest;
    type UpdateRequest = SectionUpdateDBRequest;
    type Response = SectionDBResponse;
    type Id = SectionId;
    type Filter = SectionFilter;

    #[instrument(skip(self, request), fields(branch_id = %abbrev_uuid(&request.branch_id), name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let section = sqlx::query_as::<_, SectionDBResponse>(
            r#"
            INSERT INTO sections (id, tenant_id, branch_id, name, grade_level, academic_year, class_teacher_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.tenant_id)
        .bind(request.branch_id)
        .bind(&request.name)
        .bind(&request.grade_level)
        .bind(&request.academic_year)
        .bind(request.class_teacher_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(section)
    }

    #[instrument(skip(self), fields(section_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let section = sqlx::query_as::<_, SectionDBResponse>("SELECT * FROM sections WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(section)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %abbrev_uuid(&filter.tenant_id), limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let query = format!(
            "SELECT * FROM sections WHERE {FILTER_CLAUSE} ORDER BY academic_year DESC, grade_level ASC, name ASC LIMIT $5 OFFSET $6"
        );
        let sections = sqlx::query_as::<_, SectionDBResponse>(&query)
            .bind(filter.tenant_id)
            .bind(filter.branch_id)
            .bind(&filter.academic_year)
            .bind(&filter.grade_level)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(sections)
    }

    #[instrument(skip(self), fields(section_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let has_attendance: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM student_attendance WHERE section_id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;
        if has_attendance {
            return Err(DbError::ProtectedEntity {
                operation: Operation::DeleteAll,
                reason: "section has attendance records".to_string(),
                entity_type: "section".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query("DELETE FROM sections WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(section_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let section = sqlx::query_as::<_, SectionDBResponse>(
            r#"
            UPDATE sections SET
                name = COALESCE($2, name),
                grade_level = COALESCE($3, grade_level),
                academic_year = COALESCE($4, academic_year),
                class_teacher_id = CASE WHEN $5 THEN $6 ELSE class_teacher_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.grade_level)
        .bind(&request.academic_year)
        .bind(request.class_teacher_id.is_some())
        .bind(request.class_teacher_id.flatten())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(section)
    }
}

impl<'c> Sections<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &SectionFilter) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM sections WHERE {FILTER_CLAUSE}");
        let count = sqlx::query_scalar::<_, i64>(&query)
            .bind(filter.tenant_id)
            .bind(filter.branch_id)
            .bind(&filter.academic_year)
            .bind(&filter.grade_level)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_branch, create_test_tenant};
    use sqlx::PgPool;

    fn create_request(tenant_id: TenantId, branch_id: BranchId, grade: &str, name: &str) -> SectionCreateDBRequest {
        SectionCreateDBRequest {
            tenant_id,
            branch_id,
            name: name.to_string(),
            grade_level: grade.to_string(),
            academic_year: "2025-2026".to_string(),
            class_teacher_id: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_section_names_unique_per_grade_and_year(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "sections-unique").await;
        let branch = create_test_branch(&pool, tenant.id, "MAIN").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Sections::new(&mut conn);

        repo.create(&create_request(tenant.id, branch.id, "Grade 5", "A")).await.unwrap();
        repo.create(&create_request(tenant.id, branch.id, "Grade 6", "A")).await.unwrap();

        let err = repo.create(&create_request(tenant.id, branch.id, "Grade 5", "A")).await.unwrap_err();
        match err {
            DbError::UniqueViolation { constraint, .. } => assert_eq!(constraint.as_deref(), Some("sections_unique_name")),
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_list_filters(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "sections-list").await;
        let north = create_test_branch(&pool, tenant.id, "NORTH").await;
        let south = create_test_branch(&pool, tenant.id, "SOUTH").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Sections::new(&mut conn);

        repo.create(&create_request(tenant.id, north.id, "Grade 1", "A")).await.unwrap();
        repo.create(&create_request(tenant.id, north.id, "Grade 2", "A")).await.unwrap();
        repo.create(&create_request(tenant.id, south.id, "Grade 1", "A")).await.unwrap();

        let mut filter = SectionFilter::new(tenant.id, 0, 10);
        assert_eq!(repo.list(&filter).await.unwrap().len(), 3);

        filter.branch_id = Some(north.id);
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        filter.grade_level = Some("Grade 1".to_string());
        let sections = repo.list(&filter).await.unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].branch_id, north.id);
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_update_unassigns_class_teacher(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "sections-teacher").await;
        let branch = create_test_branch(&pool, tenant.id, "MAIN").await;
        let teacher = crate::test_utils::create_test_user(&pool, Some(tenant.id), None, crate::api::models::users::Role::Teacher).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Sections::new(&mut conn);

        let mut request = create_request(tenant.id, branch.id, "Grade 3", "B");
        request.class_teacher_id = Some(teacher.id);
        let section = repo.create(&request).await.unwrap();
        assert_eq!(section.class_teacher_id, Some(teacher.id));

        let updated = repo
            .update(
                section.id,
                &SectionUpdateDBRequest {
                    name: None,
                    grade_level: None,
                    academic_year: None,
                    class_teacher_id: Some(None),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.class_teacher_id, None);
    }
}
