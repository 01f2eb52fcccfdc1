//! # schoolctl: multi-tenant school management backend
//!
//! `schoolctl` serves a REST/JSON API for running schools: tenants (organisations), their
//! branches, staff accounts, class sections, students and the periods of the school day. Its core
//! is student attendance: teachers mark a section's roster for a date and period, may correct
//! their own marks for a bounded time afterwards, and every change lands in an append-only audit
//! trail from which a record's history can be replayed.
//!
//! ## Architecture
//!
//! - **HTTP layer** ([`api`]): Axum handlers and request/response models, nested under `/api/v1`
//! - **Authentication** ([`auth`]): JWT bearer sessions, Argon2id passwords, tenant resolution
//!   and the role permission matrix
//! - **Attendance rules** ([`attendance`]): the edit window, change sets and report tallies
//! - **Database** ([`db`]): repositories over PostgreSQL via `sqlx`
//!
//! Every tenant-owned row carries `tenant_id`, and every repository query filters on it. The
//! tenant a request acts in is resolved once, by the [`api::models::users::CurrentUser`]
//! extractor.
//!
//! ## Quick start
//!
//! ```no_run
//! use schoolctl::{Application, Config};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let app = Application::new(config).await?;
//! app.serve(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Database migrations
//!
//! Migrations are embedded and run by [`Application::new`]. To run them by hand:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! schoolctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    auth::password::{self, Argon2Params},
    config::CorsOrigin,
    db::handlers::{Repository, Users},
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    openapi::ApiDoc,
};
use axum::{
    Router,
    http::{self, HeaderValue},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{AttendanceId, BranchId, SectionId, StudentId, TenantId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder().db(pool).config(config).build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the schoolctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial platform administrator, or refresh its password if it already exists.
///
/// Idempotent; called on every startup when `admin_password` is configured. An existing account
/// with the same email is also (re)granted the platform admin role and reactivated, so the
/// configured credentials always work.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: &str, params: Argon2Params, db: &PgPool) -> errors::Result<UserId> {
    let password_hash = password::hash_password(password.to_string(), params).await?;

    let mut tx = db.begin().await.map_err(db::errors::DbError::from)?;
    let mut users = Users::new(&mut tx);

    let id = match users.get_user_by_email(email).await? {
        Some(existing) => {
            let mut roles = existing.roles.clone();
            if !roles.contains(&Role::PlatformAdmin) {
                roles.push(Role::PlatformAdmin);
            }
            users
                .update(
                    existing.id,
                    &UserUpdateDBRequest {
                        roles: Some(roles),
                        is_active: Some(true),
                        password_hash: Some(password_hash),
                        ..Default::default()
                    },
                )
                .await?;
            debug!("Refreshed initial admin user");
            existing.id
        }
        None => {
            let created = users
                .create(&UserCreateDBRequest {
                    tenant_id: None,
                    branch_id: None,
                    email: email.to_string(),
                    display_name: "Platform Administrator".to_string(),
                    password_hash,
                    roles: vec![Role::PlatformAdmin],
                })
                .await?;
            info!("Created initial admin user");
            created.id
        }
    };

    tx.commit().await.map_err(db::errors::DbError::from)?;
    Ok(id)
}

/// Connect the pool, run migrations and seed the initial admin.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let optional = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(optional(settings.idle_timeout_secs))
        .max_lifetime(optional(settings.max_lifetime_secs))
        .connect(&config.database.url)
        .await?;

    prepare_database(config, &pool).await?;
    Ok(pool)
}

async fn prepare_database(config: &Config, pool: &PgPool) -> anyhow::Result<()> {
    migrator().run(pool).await?;

    match config.admin_password.as_deref() {
        Some(admin_password) => {
            let params = Argon2Params::from(&config.auth.native.password);
            create_initial_admin_user(&config.admin_email, admin_password, params, pool)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;
        }
        None => warn!("admin_password is not set; no platform administrator was seeded"),
    }
    Ok(())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let tenant_header = http::HeaderName::from_bytes(config.auth.tenant_header.as_bytes())?;
    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE, tenant_header])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: the `/api/v1` routes, health check, OpenAPI document and
/// Scalar viewer, optional Prometheus metrics, CORS and request tracing.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{attendance, auth, branches, period_slots, reports, sections, students, tenants, users};

    let api_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Tenants (platform administration)
        .route("/tenants", get(tenants::list_tenants).post(tenants::create_tenant))
        .route(
            "/tenants/{id}",
            get(tenants::get_tenant).patch(tenants::update_tenant).delete(tenants::delete_tenant),
        )
        // Branches
        .route("/branches", get(branches::list_branches).post(branches::create_branch))
        .route(
            "/branches/{id}",
            get(branches::get_branch).patch(branches::update_branch).delete(branches::delete_branch),
        )
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user).patch(users::update_user).delete(users::delete_user),
        )
        // Sections, their rosters and registers
        .route("/sections", get(sections::list_sections).post(sections::create_section))
        .route(
            "/sections/{id}",
            get(sections::get_section).patch(sections::update_section).delete(sections::delete_section),
        )
        .route("/sections/{id}/students", get(sections::list_section_students))
        .route("/sections/{id}/attendance", get(reports::section_register))
        .route("/sections/{id}/attendance/summary", get(reports::section_summary))
        // Students
        .route("/students", get(students::list_students).post(students::create_student))
        .route(
            "/students/{id}",
            get(students::get_student).patch(students::update_student).delete(students::delete_student),
        )
        .route("/students/{id}/attendance/summary", get(reports::student_summary))
        // Period slots
        .route("/period-slots", get(period_slots::list_period_slots).post(period_slots::create_period_slot))
        .route(
            "/period-slots/{id}",
            get(period_slots::get_period_slot)
                .patch(period_slots::update_period_slot)
                .delete(period_slots::delete_period_slot),
        )
        // Attendance
        .route("/attendance", get(attendance::list_attendance).post(attendance::mark_attendance))
        .route(
            "/attendance/{id}",
            get(attendance::get_attendance)
                .patch(attendance::edit_attendance)
                .delete(attendance::delete_attendance),
        )
        .route("/attendance/{id}/edit-window", get(attendance::get_edit_window))
        .route("/attendance/{id}/history", get(attendance::get_attendance_history))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()))
        .route("/api/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The HTTP server and the resources it owns.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations, seeds the
///    initial admin and builds the router
/// 2. **Serve**: [`Application::serve`] binds to the configured address and handles requests
///    until the shutdown future resolves, then closes the pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting schoolctl with configuration: {:#?}", config);
        let pool = setup_database(&config).await?;
        Self::from_parts(config, pool)
    }

    /// Create an application over an existing pool (migrations and seeding still run)
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        prepare_database(&config, &pool).await?;
        Self::from_parts(config, pool)
    }

    fn from_parts(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&state)?;
        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "schoolctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.pool.close().await;
        Ok(())
    }
}
