//! Lookups that confine handlers to the effective tenant.
//!
//! Rows from another tenant are reported as missing, never as forbidden, so a caller cannot probe
//! for identifiers outside their tenant.

use sqlx::PgConnection;

use crate::{
    api::models::users::CurrentUser,
    auth::permissions::require_branch_access,
    db::{
        handlers::{Branches, Repository, Sections, Students},
        models::{branches::BranchDBResponse, sections::SectionDBResponse, students::StudentDBResponse},
    },
    errors::{Error, Result},
    types::{BranchId, Operation, Resource, SectionId, StudentId, TenantId},
};

pub fn not_found(resource: &str, id: impl ToString) -> Error {
    Error::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

/// Reject blank required text fields.
pub fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

/// Same as [`require_text`] for optional update fields.
pub fn require_text_if_set(field: &str, value: Option<&str>) -> Result<()> {
    value.map_or(Ok(()), |v| require_text(field, v))
}

pub async fn branch_in_tenant(conn: &mut PgConnection, tenant_id: TenantId, id: BranchId) -> Result<BranchDBResponse> {
    Branches::new(conn)
        .get_in_tenant(id, tenant_id)
        .await?
        .ok_or_else(|| not_found("Branch", id))
}

/// A branch named in a request body. Missing branches are a bad request rather than a 404.
pub async fn referenced_branch(conn: &mut PgConnection, tenant_id: TenantId, id: BranchId) -> Result<BranchDBResponse> {
    branch_in_tenant(conn, tenant_id, id).await.map_err(|_| Error::BadRequest {
        message: format!("Branch {id} does not exist in this tenant"),
    })
}

/// Load a section of the tenant and check the caller may work in its branch.
pub async fn section_for(
    conn: &mut PgConnection,
    user: &CurrentUser,
    tenant_id: TenantId,
    id: SectionId,
    action: Operation,
) -> Result<SectionDBResponse> {
    let section = Sections::new(conn)
        .get_in_tenant(id, tenant_id)
        .await?
        .ok_or_else(|| not_found("Section", id))?;
    require_branch_access(user, section.branch_id, action, Resource::Sections)?;
    Ok(section)
}

/// Load a (non-deleted) student of the tenant and check the caller may work in its branch.
pub async fn student_for(
    conn: &mut PgConnection,
    user: &CurrentUser,
    tenant_id: TenantId,
    id: StudentId,
    action: Operation,
) -> Result<StudentDBResponse> {
    let student = Students::new(conn)
        .get_in_tenant(id, tenant_id)
        .await?
        .ok_or_else(|| not_found("Student", id))?;
    require_branch_access(user, student.branch_id, action, Resource::Students)?;
    Ok(student)
}

/// The branch filter for a list request: branch-bound users only ever see their own branch.
pub fn branch_filter(user: &CurrentUser, requested: Option<BranchId>, resource: Resource) -> Result<Option<BranchId>> {
    if user.is_platform_admin() {
        return Ok(requested);
    }
    match (user.branch_id, requested) {
        (Some(own), Some(other)) if own != other => {
            require_branch_access(user, other, Operation::ReadAll, resource)?;
            Ok(Some(other))
        }
        (Some(own), _) => Ok(Some(own)),
        (None, requested) => Ok(requested),
    }
}
