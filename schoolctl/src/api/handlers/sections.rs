use crate::{
    AppState,
    api::{
        handlers::scope::{branch_filter, referenced_branch, require_text, require_text_if_set, section_for},
        models::{
            pagination::PaginatedResponse,
            sections::{ListSectionsQuery, SectionCreate, SectionResponse, SectionUpdate},
            students::StudentResponse,
        },
    },
    auth::permissions::{RequiresPermission, operation, require_branch_access, resource},
    db::{
        handlers::{Repository, Sections, Students, Users, sections::SectionFilter},
        models::sections::{SectionCreateDBRequest, SectionUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Operation, Resource, SectionId, TenantId, UserId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

/// A class teacher must be an active member of the section's tenant.
async fn check_class_teacher(conn: &mut PgConnection, tenant_id: TenantId, user_id: UserId) -> Result<()> {
    let teacher = Users::new(conn).get_by_id(user_id).await?;
    match teacher {
        Some(t) if t.tenant_id == Some(tenant_id) && t.is_active => Ok(()),
        _ => Err(Error::BadRequest {
            message: format!("User {user_id} is not an active member of this tenant"),
        }),
    }
}

#[utoipa::path(
    get,
    path = "/sections",
    tag = "sections",
    summary = "List sections",
    description = "Branch-bound staff only see the sections of their own branch.",
    params(ListSectionsQuery),
    responses(
        (status = 200, description = "Paginated list of sections", body = PaginatedResponse<SectionResponse>),
        (status = 400, description = "No tenant selected"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_sections(
    State(state): State<AppState>,
    Query(query): Query<ListSectionsQuery>,
    current_user: RequiresPermission<resource::Sections, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<SectionResponse>>> {
    let tenant_id = current_user.require_tenant()?;
    let (skip, limit) = query.pagination.params();
    let filter = SectionFilter {
        branch_id: branch_filter(&current_user, query.branch_id, Resource::Sections)?,
        academic_year: query.academic_year,
        grade_level: query.grade_level,
        ..SectionFilter::new(tenant_id, skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Sections::new(&mut conn);
    let sections = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        sections.into_iter().map(SectionResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/sections",
    tag = "sections",
    summary = "Create a section",
    request_body = SectionCreate,
    responses(
        (status = 201, description = "Section created", body = SectionResponse),
        (status = 400, description = "Unknown branch or class teacher"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Section already exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_section(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Sections, operation::CreateAll>,
    Json(create): Json<SectionCreate>,
) -> Result<(StatusCode, Json<SectionResponse>)> {
    let tenant_id = current_user.require_tenant()?;
    require_text("name", &create.name)?;
    require_text("grade_level", &create.grade_level)?;
    require_text("academic_year", &create.academic_year)?;
    require_branch_access(&current_user, create.branch_id, Operation::CreateAll, Resource::Sections)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    referenced_branch(&mut tx, tenant_id, create.branch_id).await?;
    if let Some(teacher_id) = create.class_teacher_id {
        check_class_teacher(&mut tx, tenant_id, teacher_id).await?;
    }
    let section = Sections::new(&mut tx).create(&SectionCreateDBRequest::new(tenant_id, create)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(SectionResponse::from(section))))
}

#[utoipa::path(
    get,
    path = "/sections/{id}",
    tag = "sections",
    summary = "Get a section",
    params(("id" = String, Path, description = "Section ID")),
    responses(
        (status = 200, description = "The section", body = SectionResponse),
        (status = 403, description = "Section belongs to another branch"),
        (status = 404, description = "Section not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_section(
    State(state): State<AppState>,
    Path(id): Path<SectionId>,
    current_user: RequiresPermission<resource::Sections, operation::ReadAll>,
) -> Result<Json<SectionResponse>> {
    let tenant_id = current_user.require_tenant()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let section = section_for(&mut conn, &current_user, tenant_id, id, Operation::ReadAll).await?;
    Ok(Json(SectionResponse::from(section)))
}

#[utoipa::path(
    patch,
    path = "/sections/{id}",
    tag = "sections",
    summary = "Update a section",
    params(("id" = String, Path, description = "Section ID")),
    request_body = SectionUpdate,
    responses(
        (status = 200, description = "Section updated", body = SectionResponse),
        (status = 400, description = "Unknown class teacher"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Section not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_section(
    State(state): State<AppState>,
    Path(id): Path<SectionId>,
    current_user: RequiresPermission<resource::Sections, operation::UpdateAll>,
    Json(update): Json<SectionUpdate>,
) -> Result<Json<SectionResponse>> {
    let tenant_id = current_user.require_tenant()?;
    require_text_if_set("name", update.name.as_deref())?;
    require_text_if_set("grade_level", update.grade_level.as_deref())?;
    require_text_if_set("academic_year", update.academic_year.as_deref())?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    section_for(&mut tx, &current_user, tenant_id, id, Operation::UpdateAll).await?;
    if let Some(Some(teacher_id)) = update.class_teacher_id {
        check_class_teacher(&mut tx, tenant_id, teacher_id).await?;
    }
    let section = Sections::new(&mut tx).update(id, &SectionUpdateDBRequest::from(update)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(SectionResponse::from(section)))
}

#[utoipa::path(
    delete,
    path = "/sections/{id}",
    tag = "sections",
    summary = "Delete a section",
    description = "Sections with recorded attendance cannot be deleted.",
    params(("id" = String, Path, description = "Section ID")),
    responses(
        (status = 204, description = "Section deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Section not found in this tenant"),
        (status = 409, description = "Section has attendance history"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_section(
    State(state): State<AppState>,
    Path(id): Path<SectionId>,
    current_user: RequiresPermission<resource::Sections, operation::DeleteAll>,
) -> Result<StatusCode> {
    let tenant_id = current_user.require_tenant()?;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    section_for(&mut tx, &current_user, tenant_id, id, Operation::DeleteAll).await?;
    Sections::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/sections/{id}/students",
    tag = "sections",
    summary = "Section roster",
    description = "Active students of the section in register order.",
    params(("id" = String, Path, description = "Section ID")),
    responses(
        (status = 200, description = "The roster", body = Vec<StudentResponse>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Section not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_section_students(
    State(state): State<AppState>,
    Path(id): Path<SectionId>,
    current_user: RequiresPermission<resource::Students, operation::ReadAll>,
) -> Result<Json<Vec<StudentResponse>>> {
    let tenant_id = current_user.require_tenant()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    section_for(&mut conn, &current_user, tenant_id, id, Operation::ReadAll).await?;
    let roster = Students::new(&mut conn).active_roster(id).await?;
    Ok(Json(roster.into_iter().map(StudentResponse::from).collect()))
}
