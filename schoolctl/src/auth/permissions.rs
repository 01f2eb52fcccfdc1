//! Role-based permission checks.
//!
//! Each [`Role`] grants a fixed set of (resource, operation) pairs. A `*All` grant implies the
//! matching `*Own` grant. Handlers declare what they need in their signature:
//!
//! ```ignore
//! async fn delete_branch(
//!     State(state): State<AppState>,
//!     current_user: RequiresPermission<resource::Branches, operation::DeleteAll>,
//!     Path(id): Path<BranchId>,
//! ) -> Result<StatusCode> { ... }
//! ```
//!
//! Ownership ("own record", "own tenant", "own branch") is checked by the handler once the
//! target row is loaded.

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
    types::{Operation, Permission, Resource},
};

use Operation::*;

const ALL_OPS: &[Operation] = &[CreateAll, ReadAll, UpdateAll, DeleteAll];
const READ: &[Operation] = &[ReadAll];

/// Operations a role may perform on a resource.
pub fn role_operations(role: Role, resource: Resource) -> &'static [Operation] {
    match (role, resource) {
        (Role::PlatformAdmin, _) => ALL_OPS,

        (Role::SchoolAdmin, Resource::Tenants) => &[ReadOwn],
        (Role::SchoolAdmin, Resource::AttendanceAudit | Resource::Reports) => READ,
        (Role::SchoolAdmin, _) => ALL_OPS,

        (Role::Teacher, Resource::Tenants) => &[ReadOwn],
        (Role::Teacher, Resource::Users) => &[ReadOwn],
        (Role::Teacher, Resource::Attendance) => &[CreateAll, ReadAll, UpdateOwn],
        (Role::Teacher, _) => READ,

        (Role::OfficeStaff, Resource::Tenants) => &[ReadOwn],
        (Role::OfficeStaff, Resource::Users) => &[ReadOwn],
        (Role::OfficeStaff, Resource::Students) => &[CreateAll, ReadAll, UpdateAll],
        (Role::OfficeStaff, Resource::AttendanceAudit) => &[],
        (Role::OfficeStaff, _) => READ,
    }
}

/// The `*All` operation that implies an `*Own` one.
fn broader(operation: Operation) -> Option<Operation> {
    match operation {
        CreateOwn => Some(CreateAll),
        ReadOwn => Some(ReadAll),
        UpdateOwn => Some(UpdateAll),
        DeleteOwn => Some(DeleteAll),
        _ => None,
    }
}

pub fn role_has_permission(role: Role, resource: Resource, operation: Operation) -> bool {
    let granted = role_operations(role, resource);
    granted.contains(&operation) || broader(operation).is_some_and(|all| granted.contains(&all))
}

pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    user.roles.iter().any(|role| role_has_permission(*role, resource, operation))
}

/// Fail with 403 unless the user holds the permission.
pub fn require_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<()> {
    if has_permission(user, resource, operation) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(resource, operation),
            action: operation,
            resource: resource.to_string(),
        })
    }
}

/// Fail with 403 unless a branch-bound user owns `branch_id`.
pub fn require_branch_access(user: &CurrentUser, branch_id: crate::types::BranchId, action: Operation, resource: Resource) -> Result<()> {
    if user.can_access_branch(branch_id) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::BranchScope,
            action,
            resource: resource.to_string(),
        })
    }
}

pub trait ResourceMarker {
    const RESOURCE: Resource;
}

pub trait OperationMarker {
    const OPERATION: Operation;
}

/// Type-level resources for [`RequiresPermission`].
pub mod resource {
    use super::ResourceMarker;
    use crate::types::Resource;

    macro_rules! markers {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    markers!(Tenants, Branches, Users, Sections, Students, PeriodSlots, Attendance, AttendanceAudit, Reports);
}

/// Type-level operations for [`RequiresPermission`].
pub mod operation {
    use super::OperationMarker;
    use crate::types::Operation;

    macro_rules! markers {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    markers!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn);
}

/// Extractor that authenticates the caller and checks a static permission.
///
/// Derefs to [`CurrentUser`].
pub struct RequiresPermission<R, O> {
    user: CurrentUser,
    _marker: PhantomData<fn() -> (R, O)>,
}

impl<R, O> RequiresPermission<R, O> {
    pub fn into_inner(self) -> CurrentUser {
        self.user
    }
}

impl<R, O> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &CurrentUser {
        &self.user
    }
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: ResourceMarker,
    O: OperationMarker,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if let Err(e) = require_permission(&user, R::RESOURCE, O::OPERATION) {
            debug!(user_id = %user.id, resource = %R::RESOURCE, operation = ?O::OPERATION, "Permission denied");
            return Err(e);
        }
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}
