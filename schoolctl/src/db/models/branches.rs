//! Database models for branches.

use crate::api::models::branches::{BranchCreate, BranchUpdate};
use crate::types::{BranchId, TenantId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct BranchCreateDBRequest {
    pub tenant_id: TenantId,
    pub name: String,
    pub code: String,
    pub address: Option<String>,
}

impl BranchCreateDBRequest {
    pub fn new(tenant_id: TenantId, create: BranchCreate) -> Self {
        Self {
            tenant_id,
            name: create.name.trim().to_string(),
            code: create.code.trim().to_uppercase(),
            address: create.address,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BranchUpdateDBRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

impl From<BranchUpdate> for BranchUpdateDBRequest {
    fn from(api: BranchUpdate) -> Self {
        Self {
            name: api.name.map(|n| n.trim().to_string()),
            code: api.code.map(|c| c.trim().to_uppercase()),
            address: api.address,
            is_active: api.is_active,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct BranchDBResponse {
    pub id: BranchId,
    pub tenant_id: TenantId,
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
