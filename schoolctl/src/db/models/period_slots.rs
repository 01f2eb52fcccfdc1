//! Database models for period slots.

use crate::api::models::period_slots::{PeriodSlotCreate, PeriodSlotUpdate};
use crate::types::{BranchId, PeriodSlotId, TenantId};
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct PeriodSlotCreateDBRequest {
    pub tenant_id: TenantId,
    pub branch_id: BranchId,
    pub name: String,
    pub period_number: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl PeriodSlotCreateDBRequest {
    pub fn new(tenant_id: TenantId, create: PeriodSlotCreate) -> Self {
        Self {
            tenant_id,
            branch_id: create.branch_id,
            name: create.name.trim().to_string(),
            period_number: create.period_number,
            start_time: create.start_time,
            end_time: create.end_time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeriodSlotUpdateDBRequest {
    pub name: Option<String>,
    pub period_number: Option<i32>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

impl From<PeriodSlotUpdate> for PeriodSlotUpdateDBRequest {
    fn from(api: PeriodSlotUpdate) -> Self {
        Self {
            name: api.name.map(|s| s.trim().to_string()),
            period_number: api.period_number,
            start_time: api.start_time,
            end_time: api.end_time,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PeriodSlotDBResponse {
    pub id: PeriodSlotId,
    pub tenant_id: TenantId,
    pub branch_id: BranchId,
    pub name: String,
    pub period_number: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
