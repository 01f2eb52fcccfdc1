//! Database repository for branches.

use crate::types::{BranchId, Operation, TenantId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::branches::{BranchCreateDBRequest, BranchDBResponse, BranchUpdateDBRequest},
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing branches of a tenant
#[derive(Debug, Clone)]
pub struct BranchFilter {
    pub tenant_id: TenantId,
    pub skip: i64,
    pub limit: i64,
    pub is_active: Option<bool>,
}

impl BranchFilter {
    pub fn new(tenant_id: TenantId, skip: i64, limit: i64) -> Self {
        Self {
            tenant_id,
            skip,
            limit,
            is_active: None,
        }
    }
}

pub struct Branches<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Branches<'c> {
    type CreateRequest = BranchCreateDBRequest;
    type UpdateRequest = BranchUpdateDBRequest;
    type Response = BranchDBResponse;
    type Id = BranchId;
    type Filter = BranchFilter;

    #[instrument(skip(self, request), fields(tenant_id = %abbrev_uuid(&request.tenant_id), code = %request.code), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let branch = sqlx::query_as::<_, BranchDBResponse>(
            r#"
            INSERT INTO branches (id, tenant_id, name, code, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.tenant_id)
        .bind(&request.name)
        .bind(&request.code)
        .bind(&request.address)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(branch)
    }

    #[instrument(skip(self), fields(branch_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let branch = sqlx::query_as::<_, BranchDBResponse>("SELECT * FROM branches WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(branch)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %abbrev_uuid(&filter.tenant_id), limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let branches = sqlx::query_as::<_, BranchDBResponse>(
            r#"
            SELECT * FROM branches
            WHERE tenant_id = $1 AND ($2::BOOLEAN IS NULL OR is_active = $2)
            ORDER BY code ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.tenant_id)
        .bind(filter.is_active)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(branches)
    }

    #[instrument(skip(self), fields(branch_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let has_attendance: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM student_attendance WHERE branch_id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;
        if has_attendance {
            return Err(DbError::ProtectedEntity {
                operation: Operation::DeleteAll,
                reason: "branch has attendance records; deactivate it instead".to_string(),
                entity_type: "branch".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query("DELETE FROM branches WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(branch_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let branch = sqlx::query_as::<_, BranchDBResponse>(
            r#"
            UPDATE branches SET
                name = COALESCE($2, name),
                code = COALESCE($3, code),
                address = COALESCE($4, address),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.code)
        .bind(&request.address)
        .bind(request.is_active)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(branch)
    }
}

impl<'c> Branches<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &BranchFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM branches WHERE tenant_id = $1 AND ($2::BOOLEAN IS NULL OR is_active = $2)")
            .bind(filter.tenant_id)
            .bind(filter.is_active)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}
