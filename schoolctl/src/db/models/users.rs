//! Database models for users.

use crate::api::models::users::Role;
use crate::types::{BranchId, TenantId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub tenant_id: Option<TenantId>,
    pub branch_id: Option<BranchId>,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
}

/// Database request for updating a user
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub branch_id: Option<BranchId>,
    pub roles: Option<Vec<Role>>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

/// Database response for a user
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub branch_id: Option<BranchId>,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub is_active: bool,
    pub password_hash: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
