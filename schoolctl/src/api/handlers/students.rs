use crate::{
    AppState,
    api::{
        handlers::scope::{branch_filter, referenced_branch, require_text, require_text_if_set, student_for},
        models::{
            pagination::PaginatedResponse,
            students::{ListStudentsQuery, StudentCreate, StudentResponse, StudentUpdate},
        },
    },
    auth::permissions::{RequiresPermission, operation, require_branch_access, resource},
    db::{
        handlers::{Repository, Sections, Students, students::StudentFilter},
        models::students::{StudentCreateDBRequest, StudentUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{BranchId, Operation, Resource, SectionId, StudentId, TenantId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

/// A student's section must be in the same tenant and branch as the student.
async fn check_section(conn: &mut PgConnection, tenant_id: TenantId, branch_id: BranchId, section_id: SectionId) -> Result<()> {
    match Sections::new(conn).get_by_id(section_id).await? {
        Some(s) if s.tenant_id == tenant_id && s.branch_id == branch_id => Ok(()),
        _ => Err(Error::BadRequest {
            message: format!("Section {section_id} does not exist in the student's branch"),
        }),
    }
}

#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    summary = "List students",
    description = "Branch-bound staff only see the students of their own branch.",
    params(ListStudentsQuery),
    responses(
        (status = 200, description = "Paginated list of students", body = PaginatedResponse<StudentResponse>),
        (status = 400, description = "No tenant selected"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<ListStudentsQuery>,
    current_user: RequiresPermission<resource::Students, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<StudentResponse>>> {
    let tenant_id = current_user.require_tenant()?;
    let (skip, limit) = query.pagination.params();
    let filter = StudentFilter {
        section_id: query.section_id,
        branch_id: branch_filter(&current_user, query.branch_id, Resource::Students)?,
        status: query.status,
        ..StudentFilter::new(tenant_id, skip, limit)
    }
    .with_search(query.search);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Students::new(&mut conn);
    let students = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        students.into_iter().map(StudentResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/students",
    tag = "students",
    summary = "Enrol a student",
    request_body = StudentCreate,
    responses(
        (status = 201, description = "Student created", body = StudentResponse),
        (status = 400, description = "Unknown branch or section"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Admission number already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_student(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Students, operation::CreateAll>,
    Json(create): Json<StudentCreate>,
) -> Result<(StatusCode, Json<StudentResponse>)> {
    let tenant_id = current_user.require_tenant()?;
    require_text("admission_number", &create.admission_number)?;
    require_text("first_name", &create.first_name)?;
    require_text("last_name", &create.last_name)?;
    require_branch_access(&current_user, create.branch_id, Operation::CreateAll, Resource::Students)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    referenced_branch(&mut tx, tenant_id, create.branch_id).await?;
    if let Some(section_id) = create.section_id {
        check_section(&mut tx, tenant_id, create.branch_id, section_id).await?;
    }
    let student = Students::new(&mut tx).create(&StudentCreateDBRequest::new(tenant_id, create)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(StudentResponse::from(student))))
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "students",
    summary = "Get a student",
    params(("id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "The student", body = StudentResponse),
        (status = 403, description = "Student belongs to another branch"),
        (status = 404, description = "Student not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
    current_user: RequiresPermission<resource::Students, operation::ReadAll>,
) -> Result<Json<StudentResponse>> {
    let tenant_id = current_user.require_tenant()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let student = student_for(&mut conn, &current_user, tenant_id, id, Operation::ReadAll).await?;
    Ok(Json(StudentResponse::from(student)))
}

#[utoipa::path(
    patch,
    path = "/students/{id}",
    tag = "students",
    summary = "Update a student",
    description = "Move a student between sections of their branch, correct their details or change their status.",
    params(("id" = String, Path, description = "Student ID")),
    request_body = StudentUpdate,
    responses(
        (status = 200, description = "Student updated", body = StudentResponse),
        (status = 400, description = "Unknown section"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Student not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
    current_user: RequiresPermission<resource::Students, operation::UpdateAll>,
    Json(update): Json<StudentUpdate>,
) -> Result<Json<StudentResponse>> {
    let tenant_id = current_user.require_tenant()?;
    require_text_if_set("admission_number", update.admission_number.as_deref())?;
    require_text_if_set("first_name", update.first_name.as_deref())?;
    require_text_if_set("last_name", update.last_name.as_deref())?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let existing = student_for(&mut tx, &current_user, tenant_id, id, Operation::UpdateAll).await?;
    if let Some(Some(section_id)) = update.section_id {
        check_section(&mut tx, tenant_id, existing.branch_id, section_id).await?;
    }
    let student = Students::new(&mut tx).update(id, &StudentUpdateDBRequest::from(update)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(StudentResponse::from(student)))
}

#[utoipa::path(
    delete,
    path = "/students/{id}",
    tag = "students",
    summary = "Delete a student",
    description = "Soft-deletes the student. Their attendance history is kept.",
    params(("id" = String, Path, description = "Student ID")),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Student not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
    current_user: RequiresPermission<resource::Students, operation::DeleteAll>,
) -> Result<StatusCode> {
    let tenant_id = current_user.require_tenant()?;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    student_for(&mut tx, &current_user, tenant_id, id, Operation::DeleteAll).await?;
    Students::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}
