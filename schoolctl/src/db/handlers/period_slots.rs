//! Database repository for period slots.

use crate::types::{BranchId, Operation, PeriodSlotId, TenantId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::period_slots::{PeriodSlotCreateDBRequest, PeriodSlotDBResponse, PeriodSlotUpdateDBRequest},
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing period slots of a tenant
#[derive(Debug, Clone)]
pub struct PeriodSlotFilter {
    pub tenant_id: TenantId,
    pub skip: i64,
    pub limit: i64,
    pub branch_id: Option<BranchId>,
}

impl PeriodSlotFilter {
    pub fn new(tenant_id: TenantId, skip: i64, limit: i64) -> Self {
        Self {
            tenant_id,
            skip,
            limit,
            branch_id: None,
        }
    }
}

pub struct PeriodSlots<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for PeriodSlots<'c> {
    type CreateRequest = PeriodSlotCreateDBRequest;
    type UpdateRequest = PeriodSlotUpdateDBRequest;
    type Response = PeriodSlotDBResponse;
    type Id = PeriodSlotId;
    type Filter = PeriodSlotFilter;

    #[instrument(skip(self, request), fields(branch_id = %abbrev_uuid(&request.branch_id), period = request.period_number), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let slot = sqlx::query_as::<_, PeriodSlotDBResponse>(
            r#"
            INSERT INTO period_slots (id, tenant_id, branch_id, name, period_number, start_time, end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.tenant_id)
        .bind(request.branch_id)
        .bind(&request.name)
        .bind(request.period_number)
        .bind(request.start_time)
        .bind(request.end_time)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(slot)
    }

    #[instrument(skip(self), fields(period_slot_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let slot = sqlx::query_as::<_, PeriodSlotDBResponse>("SELECT * FROM period_slots WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(slot)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %abbrev_uuid(&filter.tenant_id), limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let slots = sqlx::query_as::<_, PeriodSlotDBResponse>(
            r#"
            SELECT * FROM period_slots
            WHERE tenant_id = $1 AND ($2::UUID IS NULL OR branch_id = $2)
            ORDER BY branch_id ASC, period_number ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.tenant_id)
        .bind(filter.branch_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(slots)
    }

    #[instrument(skip(self), fields(period_slot_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let in_use: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM student_attendance WHERE period_slot_id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;
        if in_use {
            return Err(DbError::ProtectedEntity {
                operation: Operation::DeleteAll,
                reason: "period slot has attendance records".to_string(),
                entity_type: "period slot".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query("DELETE FROM period_slots WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(period_slot_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let slot = sqlx::query_as::<_, PeriodSlotDBResponse>(
            r#"
            UPDATE period_slots SET
                name = COALESCE($2, name),
                period_number = COALESCE($3, period_number),
                start_time = COALESCE($4, start_time),
                end_time = COALESCE($5, end_time),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.period_number)
        .bind(request.start_time)
        .bind(request.end_time)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(slot)
    }
}

impl<'c> PeriodSlots<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &PeriodSlotFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM period_slots WHERE tenant_id = $1 AND ($2::UUID IS NULL OR branch_id = $2)",
        )
        .bind(filter.tenant_id)
        .bind(filter.branch_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_branch, create_test_tenant};
    use chrono::NaiveTime;
    use sqlx::PgPool;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_period_numbers_unique_per_branch(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "slots-unique").await;
        let branch = create_test_branch(&pool, tenant.id, "MAIN").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PeriodSlots::new(&mut conn);

        let request = PeriodSlotCreateDBRequest {
            tenant_id: tenant.id,
            branch_id: branch.id,
            name: "Period 1".to_string(),
            period_number: 1,
            start_time: time(8, 0),
            end_time: time(8, 45),
        };
        repo.create(&request).await.unwrap();
        let err = repo.create(&request).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_check_constraint_rejects_inverted_times(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "slots-check").await;
        let branch = create_test_branch(&pool, tenant.id, "MAIN").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PeriodSlots::new(&mut conn);

        let slot = repo
            .create(&PeriodSlotCreateDBRequest {
                tenant_id: tenant.id,
                branch_id: branch.id,
                name: "Period 2".to_string(),
                period_number: 2,
                start_time: time(9, 0),
                end_time: time(9, 45),
            })
            .await
            .unwrap();

        let err = repo
            .update(
                slot.id,
                &PeriodSlotUpdateDBRequest {
                    name: None,
                    period_number: None,
                    start_time: Some(time(10, 0)),
                    end_time: None,
                },
            )
            .await
            .unwrap_err();
        match err {
            DbError::CheckViolation { constraint, .. } => assert_eq!(constraint.as_deref(), Some("period_slots_time_order")),
            other => panic!("expected check violation, got {other:?}"),
        }
    }
}
