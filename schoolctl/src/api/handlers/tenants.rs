use crate::{
    AppState,
    api::{
        handlers::scope::{not_found, require_text, require_text_if_set},
        models::{
            pagination::PaginatedResponse,
            tenants::{ListTenantsQuery, TenantCreate, TenantResponse, TenantUpdate},
            users::CurrentUser,
        },
    },
    auth::permissions::{RequiresPermission, has_permission, operation, resource},
    db::{
        handlers::{Repository, Tenants, tenants::TenantFilter},
        models::tenants::{TenantCreateDBRequest, TenantUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Operation, Resource, TenantId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/tenants",
    tag = "tenants",
    summary = "List tenants",
    params(ListTenantsQuery),
    responses(
        (status = 200, description = "Paginated list of tenants", body = PaginatedResponse<TenantResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - platform admin only"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_tenants(
    State(state): State<AppState>,
    Query(query): Query<ListTenantsQuery>,
    _: RequiresPermission<resource::Tenants, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<TenantResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Tenants::new(&mut conn);

    let filter = TenantFilter::new(skip, limit).with_status(query.status);
    let tenants = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        tenants.into_iter().map(TenantResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/tenants",
    tag = "tenants",
    summary = "Create a tenant",
    request_body = TenantCreate,
    responses(
        (status = 201, description = "Tenant created", body = TenantResponse),
        (status = 400, description = "Invalid slug or edit window"),
        (status = 403, description = "Forbidden - platform admin only"),
        (status = 409, description = "Slug already taken"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_tenant(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Tenants, operation::CreateAll>,
    Json(create): Json<TenantCreate>,
) -> Result<(StatusCode, Json<TenantResponse>)> {
    require_text("name", &create.name)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tenant = Tenants::new(&mut conn).create(&TenantCreateDBRequest::from(create)).await?;
    Ok((StatusCode::CREATED, Json(TenantResponse::from(tenant))))
}

#[utoipa::path(
    get,
    path = "/tenants/{id}",
    tag = "tenants",
    summary = "Get a tenant",
    description = "Tenant users can only read their own tenant.",
    params(("id" = String, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "The tenant", body = TenantResponse),
        (status = 404, description = "Tenant not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(id): Path<TenantId>,
    current_user: RequiresPermission<resource::Tenants, operation::ReadOwn>,
) -> Result<Json<TenantResponse>> {
    if !can_read_tenant(&current_user, id) {
        return Err(not_found("Tenant", id));
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tenant = Tenants::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found("Tenant", id))?;
    Ok(Json(TenantResponse::from(tenant)))
}

fn can_read_tenant(user: &CurrentUser, id: TenantId) -> bool {
    has_permission(user, Resource::Tenants, Operation::ReadAll) || user.tenant_id == Some(id)
}

#[utoipa::path(
    patch,
    path = "/tenants/{id}",
    tag = "tenants",
    summary = "Update a tenant",
    description = "Rename, suspend or reactivate a tenant, or change its attendance edit window.",
    params(("id" = String, Path, description = "Tenant ID")),
    request_body = TenantUpdate,
    responses(
        (status = 200, description = "Tenant updated", body = TenantResponse),
        (status = 400, description = "Invalid edit window"),
        (status = 403, description = "Forbidden - platform admin only"),
        (status = 404, description = "Tenant not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_tenant(
    State(state): State<AppState>,
    Path(id): Path<TenantId>,
    _: RequiresPermission<resource::Tenants, operation::UpdateAll>,
    Json(update): Json<TenantUpdate>,
) -> Result<Json<TenantResponse>> {
    require_text_if_set("name", update.name.as_deref())?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tenant = Tenants::new(&mut conn).update(id, &TenantUpdateDBRequest::from(update)).await?;
    Ok(Json(TenantResponse::from(tenant)))
}

#[utoipa::path(
    delete,
    path = "/tenants/{id}",
    tag = "tenants",
    summary = "Delete a tenant",
    description = "Tenants with recorded attendance cannot be deleted; suspend them instead.",
    params(("id" = String, Path, description = "Tenant ID")),
    responses(
        (status = 204, description = "Tenant deleted"),
        (status = 403, description = "Forbidden - platform admin only"),
        (status = 404, description = "Tenant not found"),
        (status = 409, description = "Tenant has attendance history"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_tenant(
    State(state): State<AppState>,
    Path(id): Path<TenantId>,
    _: RequiresPermission<resource::Tenants, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Tenants::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Tenant", id))
    }
}
