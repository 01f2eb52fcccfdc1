use crate::{
    AppState,
    api::{
        handlers::scope::{branch_in_tenant, require_text, require_text_if_set},
        models::{
            branches::{BranchCreate, BranchResponse, BranchUpdate, ListBranchesQuery},
            pagination::PaginatedResponse,
        },
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Branches, Repository, branches::BranchFilter},
        models::branches::{BranchCreateDBRequest, BranchUpdateDBRequest},
    },
    errors::{Error, Result},
    types::BranchId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/branches",
    tag = "branches",
    summary = "List branches",
    params(ListBranchesQuery),
    responses(
        (status = 200, description = "Paginated list of branches in the tenant", body = PaginatedResponse<BranchResponse>),
        (status = 400, description = "No tenant selected"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_branches(
    State(state): State<AppState>,
    Query(query): Query<ListBranchesQuery>,
    current_user: RequiresPermission<resource::Branches, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<BranchResponse>>> {
    let tenant_id = current_user.require_tenant()?;
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Branches::new(&mut conn);

    let filter = BranchFilter {
        is_active: query.is_active,
        ..BranchFilter::new(tenant_id, skip, limit)
    };
    let branches = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        branches.into_iter().map(BranchResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/branches",
    tag = "branches",
    summary = "Create a branch",
    request_body = BranchCreate,
    responses(
        (status = 201, description = "Branch created", body = BranchResponse),
        (status = 400, description = "Invalid request or no tenant selected"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Branch code already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_branch(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Branches, operation::CreateAll>,
    Json(create): Json<BranchCreate>,
) -> Result<(StatusCode, Json<BranchResponse>)> {
    let tenant_id = current_user.require_tenant()?;
    require_text("name", &create.name)?;
    require_text("code", &create.code)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let branch = Branches::new(&mut conn).create(&BranchCreateDBRequest::new(tenant_id, create)).await?;
    Ok((StatusCode::CREATED, Json(BranchResponse::from(branch))))
}

#[utoipa::path(
    get,
    path = "/branches/{id}",
    tag = "branches",
    summary = "Get a branch",
    params(("id" = String, Path, description = "Branch ID")),
    responses(
        (status = 200, description = "The branch", body = BranchResponse),
        (status = 404, description = "Branch not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_branch(
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
    current_user: RequiresPermission<resource::Branches, operation::ReadAll>,
) -> Result<Json<BranchResponse>> {
    let tenant_id = current_user.require_tenant()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let branch = branch_in_tenant(&mut conn, tenant_id, id).await?;
    Ok(Json(BranchResponse::from(branch)))
}

#[utoipa::path(
    patch,
    path = "/branches/{id}",
    tag = "branches",
    summary = "Update a branch",
    params(("id" = String, Path, description = "Branch ID")),
    request_body = BranchUpdate,
    responses(
        (status = 200, description = "Branch updated", body = BranchResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Branch not found in this tenant"),
        (status = 409, description = "Branch code already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_branch(
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
    current_user: RequiresPermission<resource::Branches, operation::UpdateAll>,
    Json(update): Json<BranchUpdate>,
) -> Result<Json<BranchResponse>> {
    let tenant_id = current_user.require_tenant()?;
    require_text_if_set("name", update.name.as_deref())?;
    require_text_if_set("code", update.code.as_deref())?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    branch_in_tenant(&mut tx, tenant_id, id).await?;
    let branch = Branches::new(&mut tx).update(id, &BranchUpdateDBRequest::from(update)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(BranchResponse::from(branch)))
}

#[utoipa::path(
    delete,
    path = "/branches/{id}",
    tag = "branches",
    summary = "Delete a branch",
    description = "Branches with recorded attendance cannot be deleted; deactivate them instead.",
    params(("id" = String, Path, description = "Branch ID")),
    responses(
        (status = 204, description = "Branch deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Branch not found in this tenant"),
        (status = 409, description = "Branch has attendance history"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_branch(
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
    current_user: RequiresPermission<resource::Branches, operation::DeleteAll>,
) -> Result<StatusCode> {
    let tenant_id = current_user.require_tenant()?;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    branch_in_tenant(&mut tx, tenant_id, id).await?;
    Branches::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}
