use crate::{
    AppState,
    api::{
        handlers::scope::{not_found, referenced_branch, require_text, require_text_if_set},
        models::{
            pagination::PaginatedResponse,
            users::{CurrentUser, ListUsersQuery, Role, UserCreate, UserResponse, UserUpdate},
        },
    },
    auth::{
        password::{self, Argon2Params},
        permissions::{RequiresPermission, operation, require_permission, resource},
    },
    db::{
        handlers::{Repository, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Operation, Resource, UserId, UserIdOrMe},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

/// Tenant staff hold at least one role, and only platform administrators are seeded with that role.
fn validate_roles(roles: &[Role]) -> Result<()> {
    if roles.is_empty() {
        return Err(Error::BadRequest {
            message: "A user needs at least one role".to_string(),
        });
    }
    if roles.contains(&Role::PlatformAdmin) {
        return Err(Error::BadRequest {
            message: "The platform_admin role cannot be granted through the API".to_string(),
        });
    }
    Ok(())
}

/// Whether the caller may see `target` at all. Platform admins outside a tenant see everyone.
fn visible_to(user: &CurrentUser, target: &UserDBResponse) -> bool {
    match user.tenant_id {
        Some(tenant_id) => target.tenant_id == Some(tenant_id),
        None => user.is_platform_admin(),
    }
}

async fn load_visible_user(conn: &mut PgConnection, user: &CurrentUser, id: UserId) -> Result<UserDBResponse> {
    Users::new(conn)
        .get_by_id(id)
        .await?
        .filter(|target| visible_to(user, target))
        .ok_or_else(|| not_found("User", id))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    description = "Lists the users of the effective tenant. Platform admins without a tenant selected see every account.",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Paginated list of users", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    current_user: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = UserFilter::new(skip, limit).with_search(query.search);
    if !current_user.is_platform_admin() || current_user.tenant_id.is_some() {
        filter = filter.in_tenant(current_user.require_tenant()?);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let users = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create a user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid roles, password or branch"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Email already registered"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Users, operation::CreateAll>,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let tenant_id = current_user.require_tenant()?;
    require_text("display_name", &create.display_name)?;
    if !create.email.contains('@') {
        return Err(Error::BadRequest {
            message: "email must be a valid email address".to_string(),
        });
    }
    validate_roles(&create.roles)?;
    let rules = &state.config.auth.native.password;
    password::validate_password(&create.password, rules)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if let Some(branch_id) = create.branch_id {
        referenced_branch(&mut tx, tenant_id, branch_id).await?;
    }
    let password_hash = password::hash_password(create.password, Argon2Params::from(rules)).await?;
    let user = Users::new(&mut tx)
        .create(&UserCreateDBRequest {
            tenant_id: Some(tenant_id),
            branch_id: create.branch_id,
            email: create.email,
            display_name: create.display_name,
            password_hash,
            roles: create.roles,
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get a user",
    description = "Anyone may read their own profile via `/users/me`. Reading other users requires user management rights.",
    params(("id" = String, Path, description = "User ID, or `me`")),
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserIdOrMe>,
    current_user: RequiresPermission<resource::Users, operation::ReadOwn>,
) -> Result<Json<UserResponse>> {
    let id = match id {
        UserIdOrMe::Me(_) => current_user.id,
        UserIdOrMe::Id(id) => id,
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if id == current_user.id {
        let user = Users::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found("User", id))?;
        return Ok(Json(UserResponse::from(user)));
    }

    require_permission(&current_user, Resource::Users, Operation::ReadAll)?;
    let user = load_visible_user(&mut conn, &current_user, id).await?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    summary = "Update a user",
    description = "Change a user's profile, branch or roles, deactivate them, or reset their password.",
    params(("id" = String, Path, description = "User ID")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid roles, password or branch"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::UpdateAll>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    require_text_if_set("display_name", update.display_name.as_deref())?;
    if let Some(roles) = &update.roles {
        validate_roles(roles)?;
    }
    if id == current_user.id && update.is_active == Some(false) {
        return Err(Error::BadRequest {
            message: "You cannot deactivate your own account".to_string(),
        });
    }
    let rules = &state.config.auth.native.password;
    if let Some(new_password) = &update.password {
        password::validate_password(new_password, rules)?;
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let target = load_visible_user(&mut tx, &current_user, id).await?;
    if let Some(branch_id) = update.branch_id {
        let tenant_id = target.tenant_id.ok_or_else(|| Error::BadRequest {
            message: "Users outside a tenant cannot be assigned a branch".to_string(),
        })?;
        referenced_branch(&mut tx, tenant_id, branch_id).await?;
    }
    let password_hash = match update.password {
        Some(new_password) => Some(password::hash_password(new_password, Argon2Params::from(rules)).await?),
        None => None,
    };
    let user = Users::new(&mut tx)
        .update(
            id,
            &UserUpdateDBRequest {
                display_name: update.display_name,
                branch_id: update.branch_id,
                roles: update.roles,
                is_active: update.is_active,
                password_hash,
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    summary = "Delete a user",
    description = "Users who have marked attendance cannot be deleted; deactivate them instead.",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete yourself"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found in this tenant"),
        (status = 409, description = "User has marked attendance"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::DeleteAll>,
) -> Result<StatusCode> {
    if id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot delete your own account".to_string(),
        });
    }
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    load_visible_user(&mut tx, &current_user, id).await?;
    Users::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}
