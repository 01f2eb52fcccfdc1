use crate::{
    AppState,
    api::models::{
        auth::{LoginRequest, LoginResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::{current_user::ensure_account_usable, password, session},
    db::handlers::{Repository, Users},
    errors::{Error, Result},
};
use axum::{Json, extract::State};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "auth",
    summary = "Log in",
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials, inactive account or suspended tenant"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut pool_conn)
        .get_user_by_email(&request.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let is_valid = password::verify_password(request.password, user.password_hash.clone()).await?;
    if !is_valid {
        return Err(invalid_credentials());
    }
    ensure_account_usable(&mut pool_conn, &user)
        .await
        .map_err(|_| invalid_credentials())?;

    Users::new(&mut pool_conn).record_login(user.id).await?;

    let token = session::create_session_token(&CurrentUser::from(&user), &state.config)?;
    let user = Users::new(&mut pool_conn).get_by_id(user.id).await?.unwrap_or(user);

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.auth.security.jwt_expiry.as_secs() as i64,
        user: UserResponse::from(user),
    }))
}

/// The authenticated user, with the tenant the request acts in
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    summary = "Current user",
    responses(
        (status = 200, description = "The caller", body = CurrentUser),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(current_user: CurrentUser) -> Result<Json<CurrentUser>> {
    Ok(Json(current_user))
}
