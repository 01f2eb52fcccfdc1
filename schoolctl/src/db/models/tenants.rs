//! Database models for tenants.

use crate::api::models::tenants::{TenantCreate, TenantStatus, TenantUpdate};
use crate::types::TenantId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new tenant
#[derive(Debug, Clone)]
pub struct TenantCreateDBRequest {
    pub name: String,
    pub slug: String,
    pub attendance_edit_window_minutes: Option<i32>,
}

impl From<TenantCreate> for TenantCreateDBRequest {
    fn from(api: TenantCreate) -> Self {
        Self {
            name: api.name.trim().to_string(),
            slug: api.slug.trim().to_lowercase(),
            attendance_edit_window_minutes: api.attendance_edit_window_minutes,
        }
    }
}

/// Database request for updating a tenant
#[derive(Debug, Clone)]
pub struct TenantUpdateDBRequest {
    pub name: Option<String>,
    pub status: Option<TenantStatus>,
    /// Outer `None` leaves the override alone, `Some(None)` clears it
    pub attendance_edit_window_minutes: Option<Option<i32>>,
}

impl From<TenantUpdate> for TenantUpdateDBRequest {
    fn from(api: TenantUpdate) -> Self {
        Self {
            name: api.name.map(|n| n.trim().to_string()),
            status: api.status,
            attendance_edit_window_minutes: api.attendance_edit_window_minutes,
        }
    }
}

/// Database response for a tenant
#[derive(Debug, Clone, FromRow)]
pub struct TenantDBResponse {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    pub attendance_edit_window_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
