//! API request/response models for tenants.

use super::pagination::Pagination;
use crate::db::models::tenants::TenantDBResponse;
use crate::types::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "tenant_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    /// Users of a suspended tenant cannot sign in
    Suspended,
}

/// Request body for creating a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TenantCreate {
    #[schema(example = "Riverside Public School")]
    pub name: String,
    /// Lowercase letters, digits and dashes, 3 to 63 characters
    #[schema(example = "riverside")]
    pub slug: String,
    /// Overrides the configured attendance edit window (minutes)
    pub attendance_edit_window_minutes: Option<i32>,
}

/// Request body for updating a tenant. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TenantUpdate {
    pub name: Option<String>,
    pub status: Option<TenantStatus>,
    /// Send `null` to fall back to the configured default
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i32>)]
    pub attendance_edit_window_minutes: Option<Option<i32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TenantResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    pub attendance_edit_window_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing tenants
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListTenantsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<TenantStatus>,
}

impl From<TenantDBResponse> for TenantResponse {
    fn from(db: TenantDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            slug: db.slug,
            status: db.status,
            attendance_edit_window_minutes: db.attendance_edit_window_minutes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
