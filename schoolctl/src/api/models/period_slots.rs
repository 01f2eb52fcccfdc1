//! API request/response models for period slots.

use super::pagination::Pagination;
use crate::db::models::period_slots::PeriodSlotDBResponse;
use crate::types::{BranchId, PeriodSlotId, TenantId};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// A numbered period in a branch's school day.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PeriodSlotCreate {
    #[schema(value_type = String, format = "uuid")]
    pub branch_id: BranchId,
    #[schema(example = "Period 1")]
    pub name: String,
    /// Unique inside the branch, starting at 1
    pub period_number: i32,
    #[schema(value_type = String, example = "08:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "08:45:00")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PeriodSlotUpdate {
    pub name: Option<String>,
    pub period_number: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PeriodSlotResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PeriodSlotId,
    #[schema(value_type = String, format = "uuid")]
    pub tenant_id: TenantId,
    #[schema(value_type = String, format = "uuid")]
    pub branch_id: BranchId,
    pub name: String,
    pub period_number: i32,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = String)]
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing period slots
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPeriodSlotsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[param(value_type = Option<String>, format = "uuid")]
    pub branch_id: Option<BranchId>,
}

impl From<PeriodSlotDBResponse> for PeriodSlotResponse {
    fn from(db: PeriodSlotDBResponse) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            branch_id: db.branch_id,
            name: db.name,
            period_number: db.period_number,
            start_time: db.start_time,
            end_time: db.end_time,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
