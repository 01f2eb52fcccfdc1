//! API request/response models for branches.

use super::pagination::Pagination;
use crate::db::models::branches::BranchDBResponse;
use crate::types::{BranchId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BranchCreate {
    #[schema(example = "North Campus")]
    pub name: String,
    /// Short code, unique inside the tenant
    #[schema(example = "NC")]
    pub code: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BranchUpdate {
    pub name: Option<String>,
    pub code: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BranchResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BranchId,
    #[schema(value_type = String, format = "uuid")]
    pub tenant_id: TenantId,
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing branches
#[serde_as]
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListBranchesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only active (or only inactive) branches
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub is_active: Option<bool>,
}

impl From<BranchDBResponse> for BranchResponse {
    fn from(db: BranchDBResponse) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            name: db.name,
            code: db.code,
            address: db.address,
            is_active: db.is_active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
