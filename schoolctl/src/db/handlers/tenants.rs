//! Database repository for tenants.

use crate::types::{Operation, TenantId, abbrev_uuid};
use crate::{
    api::models::tenants::TenantStatus,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::tenants::{TenantCreateDBRequest, TenantDBResponse, TenantUpdateDBRequest},
    },
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing tenants
#[derive(Debug, Clone)]
pub struct TenantFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<TenantStatus>,
}

impl TenantFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit, status: None }
    }

    pub fn with_status(mut self, status: Option<TenantStatus>) -> Self {
        self.status = status;
        self
    }
}

pub struct Tenants<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Tenants<'c> {
    type CreateRequest = TenantCreateDBRequest;
    type UpdateRequest = TenantUpdateDBRequest;
    type Response = TenantDBResponse;
    type Id = TenantId;
    type Filter = TenantFilter;

    #[instrument(skip(self, request), fields(slug = %request.slug), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let tenant = sqlx::query_as::<_, TenantDBResponse>(
            r#"
            INSERT INTO tenants (id, name, slug, attendance_edit_window_minutes)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.slug)
        .bind(request.attendance_edit_window_minutes)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(tenant)
    }

    #[instrument(skip(self), fields(tenant_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let tenant = sqlx::query_as::<_, TenantDBResponse>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(tenant)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let tenants = sqlx::query_as::<_, TenantDBResponse>(
            r#"
            SELECT * FROM tenants
            WHERE ($1::tenant_status IS NULL OR status = $1)
            ORDER BY name ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(tenants)
    }

    #[instrument(skip(self), fields(tenant_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let has_attendance: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM student_attendance WHERE tenant_id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;
        if has_attendance {
            return Err(DbError::ProtectedEntity {
                operation: Operation::DeleteAll,
                reason: "tenant has attendance records; suspend it instead".to_string(),
                entity_type: "tenant".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query("DELETE FROM tenants WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(tenant_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let tenant = sqlx::query_as::<_, TenantDBResponse>(
            r#"
            UPDATE tenants SET
                name = COALESCE($2, name),
                status = COALESCE($3, status),
                attendance_edit_window_minutes = CASE WHEN $4 THEN $5 ELSE attendance_edit_window_minutes END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.status)
        .bind(request.attendance_edit_window_minutes.is_some())
        .bind(request.attendance_edit_window_minutes.flatten())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(tenant)
    }
}

impl<'c> Tenants<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &TenantFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tenants WHERE ($1::tenant_status IS NULL OR status = $1)")
            .bind(filter.status)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}
