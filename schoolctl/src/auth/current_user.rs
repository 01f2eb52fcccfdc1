//! The [`CurrentUser`] extractor: bearer token authentication and tenant resolution.
//!
//! Every request reloads the user so that deactivation, role changes and tenant suspension take
//! effect without waiting for tokens to expire. The token only proves who the caller is.

use crate::{
    AppState,
    api::models::{tenants::TenantStatus, users::CurrentUser},
    auth::session,
    db::{
        errors::DbError,
        handlers::{Repository, Tenants, Users},
        models::users::UserDBResponse,
    },
    errors::{Error, Result},
    types::{Operation, Permission, TenantId, abbrev_uuid},
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header, request::Parts},
};
use sqlx::PgConnection;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

/// Pull the bearer token out of the Authorization header.
/// Returns:
/// - None: no Authorization header, or not a Bearer credential
/// - Some(Ok(token)): a token to verify
/// - Some(Err(error)): header present but not valid UTF-8
fn bearer_token(parts: &Parts) -> Option<Result<&str>> {
    let auth_header = parts.headers.get(header::AUTHORIZATION)?;
    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };
    auth_str.strip_prefix("Bearer ").map(|token| Ok(token.trim()))
}

/// Decide which tenant a request acts in.
///
/// Tenant users always act in their home tenant; naming any other tenant is forbidden. Platform
/// administrators act in whichever tenant the header names, or none.
pub fn resolve_tenant(home: &CurrentUser, header_value: Option<&HeaderValue>) -> Result<Option<TenantId>> {
    let requested = match header_value {
        None => None,
        Some(value) => {
            let parsed = value
                .to_str()
                .ok()
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
                .ok_or_else(|| Error::BadRequest {
                    message: "Tenant header must be a UUID".to_string(),
                })?;
            Some(parsed)
        }
    };

    if home.is_platform_admin() {
        return Ok(requested);
    }

    match (home.tenant_id, requested) {
        (Some(own), Some(other)) if own != other => Err(Error::InsufficientPermissions {
            required: Permission::TenantScope,
            action: Operation::ReadAll,
            resource: format!("tenant {other}"),
        }),
        (own, _) => Ok(own),
    }
}

/// Reject users that are deactivated or whose tenant is suspended.
///
/// Login and per-request authentication share this so both fail the same way.
#[instrument(skip(conn, user), fields(user_id = %abbrev_uuid(&user.id)), err)]
pub async fn ensure_account_usable(conn: &mut PgConnection, user: &UserDBResponse) -> Result<()> {
    if !user.is_active {
        trace!("User is deactivated");
        return Err(Error::Unauthenticated { message: None });
    }
    if let Some(tenant_id) = user.tenant_id {
        let tenant = Tenants::new(conn).get_by_id(tenant_id).await?;
        if tenant.is_none_or(|t| t.status == TenantStatus::Suspended) {
            trace!(tenant_id = %abbrev_uuid(&tenant_id), "Tenant is missing or suspended");
            return Err(Error::Unauthenticated { message: None });
        }
    }
    Ok(())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if !state.config.auth.native.enabled {
            return Err(Error::Unauthenticated {
                message: Some("Authentication is disabled".to_string()),
            });
        }

        let token = match bearer_token(parts) {
            Some(token) => token?,
            None => {
                trace!("No bearer token in request");
                return Err(Error::Unauthenticated { message: None });
            }
        };
        let claimed = session::verify_session_token(token, &state.config)?;

        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        let user = Users::new(&mut conn)
            .get_by_id(claimed.id)
            .await?
            .ok_or(Error::Unauthenticated { message: None })?;
        ensure_account_usable(&mut conn, &user).await?;

        let mut current = CurrentUser::from(&user);
        let header_value = parts.headers.get(state.config.auth.tenant_header.as_str());
        current.tenant_id = resolve_tenant(&current, header_value)?;

        if current.is_platform_admin()
            && let Some(tenant_id) = current.tenant_id
            && Tenants::new(&mut conn).get_by_id(tenant_id).await?.is_none()
        {
            return Err(Error::NotFound {
                resource: "Tenant".to_string(),
                id: tenant_id.to_string(),
            });
        }

        debug!(user_id = %abbrev_uuid(&current.id), tenant_id = ?current.tenant_id, "Authenticated request");
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::tenants::TenantUpdate;
    use crate::api::models::users::Role;
    use crate::db::models::tenants::TenantUpdateDBRequest;
    use crate::test_utils::{create_test_config, create_test_tenant, create_test_user};
    use axum::extract::FromRequestParts as _;
    use sqlx::PgPool;

    fn home_user(tenant_id: Option<TenantId>, roles: Vec<Role>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            tenant_id,
            branch_id: None,
            email: "user@school.example".to_string(),
            roles,
        }
    }

    fn parts_with(headers: &[(&str, String)]) -> Parts {
        let mut builder = axum::http::Request::builder().uri("http://localhost/api/v1/branches");
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        let (parts, _body) = builder.body(()).unwrap().into_parts();
        parts
    }

    fn state(pool: PgPool) -> AppState {
        AppState::builder().db(pool).config(create_test_config()).build()
    }

    fn bearer(user: &CurrentUser) -> (&'static str, String) {
        let token = session::create_session_token(user, &create_test_config()).unwrap();
        ("authorization", format!("Bearer {token}"))
    }

    #[test]
    fn test_resolve_tenant_for_tenant_user() {
        let own = Uuid::new_v4();
        let user = home_user(Some(own), vec![Role::Teacher]);

        assert_eq!(resolve_tenant(&user, None).unwrap(), Some(own));
        let same = HeaderValue::from_str(&own.to_string()).unwrap();
        assert_eq!(resolve_tenant(&user, Some(&same)).unwrap(), Some(own));

        let other = HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap();
        assert!(matches!(
            resolve_tenant(&user, Some(&other)),
            Err(Error::InsufficientPermissions {
                required: Permission::TenantScope,
                ..
            })
        ));
    }

    #[test]
    fn test_resolve_tenant_for_platform_admin() {
        let admin = home_user(None, vec![Role::PlatformAdmin]);
        assert_eq!(resolve_tenant(&admin, None).unwrap(), None);

        let target = Uuid::new_v4();
        let header = HeaderValue::from_str(&target.to_string()).unwrap();
        assert_eq!(resolve_tenant(&admin, Some(&header)).unwrap(), Some(target));
    }

    #[test]
    fn test_resolve_tenant_rejects_malformed_header() {
        let admin = home_user(None, vec![Role::PlatformAdmin]);
        let header = HeaderValue::from_static("not-a-uuid");
        assert!(matches!(resolve_tenant(&admin, Some(&header)), Err(Error::BadRequest { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_valid_token_extracts_user(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "extract-ok").await;
        let user = create_test_user(&pool, Some(tenant.id), None, Role::Teacher).await;
        let home = home_user(Some(tenant.id), vec![Role::Teacher]);
        let home = CurrentUser { id: user.id, ..home };

        let mut parts = parts_with(&[bearer(&home)]);
        let current = CurrentUser::from_request_parts(&mut parts, &state(pool)).await.unwrap();

        assert_eq!(current.id, user.id);
        assert_eq!(current.tenant_id, Some(tenant.id));
        assert_eq!(current.roles, vec![Role::Teacher]);
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_missing_token_returns_unauthorized(pool: PgPool) {
        let mut parts = parts_with(&[]);
        let result = CurrentUser::from_request_parts(&mut parts, &state(pool)).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_suspended_tenant_cannot_authenticate(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "extract-suspended").await;
        let user = create_test_user(&pool, Some(tenant.id), None, Role::SchoolAdmin).await;
        let home = CurrentUser {
            id: user.id,
            ..home_user(Some(tenant.id), vec![Role::SchoolAdmin])
        };

        let mut conn = pool.acquire().await.unwrap();
        Tenants::new(&mut conn)
            .update(
                tenant.id,
                &TenantUpdateDBRequest::from(TenantUpdate {
                    status: Some(TenantStatus::Suspended),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        let mut parts = parts_with(&[bearer(&home)]);
        let result = CurrentUser::from_request_parts(&mut parts, &state(pool)).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_platform_admin_acts_in_header_tenant(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "extract-admin").await;
        let admin = create_test_user(&pool, None, None, Role::PlatformAdmin).await;
        let home = CurrentUser {
            id: admin.id,
            ..home_user(None, vec![Role::PlatformAdmin])
        };
        let state = state(pool);

        let mut parts = parts_with(&[bearer(&home), ("x-tenant-id", tenant.id.to_string())]);
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current.tenant_id, Some(tenant.id));

        let mut parts = parts_with(&[bearer(&home), ("x-tenant-id", Uuid::new_v4().to_string())]);
        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }
}
