//! API request/response models for users.

use super::pagination::Pagination;
use crate::attendance::policy::Editor;
use crate::db::models::users::UserDBResponse;
use crate::errors::Error;
use crate::types::{BranchId, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Job functions. A user holds one or more.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Operates the platform; belongs to no tenant and may act inside any of them
    PlatformAdmin,
    SchoolAdmin,
    Teacher,
    OfficeStaff,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::PlatformAdmin | Role::SchoolAdmin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub email: String,
    pub display_name: String,
    pub password: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub branch_id: Option<BranchId>,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    /// Reassign the user's branch. Send `null` explicitly to leave unchanged.
    #[schema(value_type = Option<String>, format = "uuid")]
    pub branch_id: Option<BranchId>,
    pub roles: Option<Vec<Role>>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub tenant_id: Option<TenantId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub branch_id: Option<BranchId>,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on email or display name
    pub search: Option<String>,
}

/// The authenticated caller, with the tenant they are acting in resolved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    /// Tenant the request acts inside (the user's own, or the `X-Tenant-ID` header for platform admins)
    #[schema(value_type = Option<String>, format = "uuid")]
    pub tenant_id: Option<TenantId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub branch_id: Option<BranchId>,
    pub email: String,
    pub roles: Vec<Role>,
}

impl CurrentUser {
    /// Admins may override the attendance edit window.
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.is_admin())
    }

    pub fn is_platform_admin(&self) -> bool {
        self.roles.contains(&Role::PlatformAdmin)
    }

    /// The tenant this request acts inside, or a 400 when none was resolved.
    pub fn require_tenant(&self) -> Result<TenantId, Error> {
        self.tenant_id.ok_or_else(|| Error::BadRequest {
            message: "This operation requires a tenant: set the X-Tenant-ID header".to_string(),
        })
    }

    /// Branch-bound users may only touch their own branch.
    pub fn can_access_branch(&self, branch_id: BranchId) -> bool {
        self.is_platform_admin() || self.branch_id.is_none_or(|own| own == branch_id)
    }

    pub fn editor(&self) -> Editor {
        Editor {
            user_id: self.id,
            is_admin: self.is_admin(),
        }
    }
}

impl From<&UserDBResponse> for CurrentUser {
    /// The user acting in their home tenant.
    fn from(db: &UserDBResponse) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            branch_id: db.branch_id,
            email: db.email.clone(),
            roles: db.roles.clone(),
        }
    }
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            branch_id: db.branch_id,
            email: db.email,
            display_name: db.display_name,
            roles: db.roles,
            is_active: db.is_active,
            last_login: db.last_login,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(roles: Vec<Role>, tenant_id: Option<TenantId>, branch_id: Option<BranchId>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            tenant_id,
            branch_id,
            email: "someone@school.test".to_string(),
            roles,
        }
    }

    #[test]
    fn test_admin_roles() {
        assert!(user(vec![Role::SchoolAdmin], None, None).is_admin());
        assert!(user(vec![Role::Teacher, Role::PlatformAdmin], None, None).is_admin());
        assert!(!user(vec![Role::Teacher, Role::OfficeStaff], None, None).is_admin());
    }

    #[test]
    fn test_require_tenant() {
        let tenant = Uuid::new_v4();
        assert_eq!(user(vec![Role::Teacher], Some(tenant), None).require_tenant().unwrap(), tenant);
        assert!(matches!(
            user(vec![Role::PlatformAdmin], None, None).require_tenant(),
            Err(Error::BadRequest { .. })
        ));
    }

    #[test]
    fn test_branch_scope() {
        let branch = Uuid::new_v4();
        let other = Uuid::new_v4();

        let bound = user(vec![Role::Teacher], Some(Uuid::new_v4()), Some(branch));
        assert!(bound.can_access_branch(branch));
        assert!(!bound.can_access_branch(other));

        let unbound = user(vec![Role::SchoolAdmin], Some(Uuid::new_v4()), None);
        assert!(unbound.can_access_branch(other));
    }
}
