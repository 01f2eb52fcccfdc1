//! Test utilities: configuration, application and fixture constructors.

use crate::{
    api::models::{
        tenants::TenantCreate,
        users::{CurrentUser, Role, UserResponse},
    },
    auth::{
        password::{self, Argon2Params},
        session,
    },
    config::{Config, PasswordConfig, PoolSettings},
    db::{
        handlers::{Branches, Repository, Sections, Students, Tenants, Users},
        models::{
            branches::{BranchCreateDBRequest, BranchDBResponse},
            sections::{SectionCreateDBRequest, SectionDBResponse},
            students::{StudentCreateDBRequest, StudentDBResponse},
            tenants::{TenantCreateDBRequest, TenantDBResponse},
            users::{UserCreateDBRequest, UserUpdateDBRequest},
        },
    },
    types::{BranchId, SectionId, TenantId, UserId},
};
use axum_test::TestServer;
use sqlx::PgPool;
use uuid::Uuid;

/// Password given to every user built by [`create_test_user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@schoolctl.test".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        enable_metrics: false,
        ..Default::default()
    };
    config.database.pool = PoolSettings {
        max_connections: 2,
        min_connections: 0,
        ..Default::default()
    };
    // Hashing at production cost makes every fixture slow
    config.auth.native.password = PasswordConfig {
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Default::default()
    };
    config
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    crate::Application::new_with_pool(create_test_config(), pool)
        .await
        .expect("Failed to create application")
        .into_test_server()
}

pub async fn create_test_tenant(pool: &PgPool, slug: &str) -> TenantDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let request = TenantCreateDBRequest::from(TenantCreate {
        name: format!("Tenant {slug}"),
        slug: slug.to_string(),
        attendance_edit_window_minutes: None,
    });
    Tenants::new(&mut conn).create(&request).await.expect("Failed to create test tenant")
}

pub async fn create_test_branch(pool: &PgPool, tenant_id: TenantId, code: &str) -> BranchDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let request = BranchCreateDBRequest {
        tenant_id,
        name: format!("Branch {code}"),
        code: code.to_string(),
        address: None,
    };
    Branches::new(&mut conn).create(&request).await.expect("Failed to create test branch")
}

pub async fn create_test_section(pool: &PgPool, tenant_id: TenantId, branch_id: BranchId, name: &str) -> SectionDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let request = SectionCreateDBRequest {
        tenant_id,
        branch_id,
        name: name.to_string(),
        grade_level: "Grade 5".to_string(),
        academic_year: "2025-2026".to_string(),
        class_teacher_id: None,
    };
    Sections::new(&mut conn).create(&request).await.expect("Failed to create test section")
}

pub async fn create_test_student(
    pool: &PgPool,
    tenant_id: TenantId,
    branch_id: BranchId,
    section_id: Option<SectionId>,
    admission_number: &str,
) -> StudentDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let request = StudentCreateDBRequest {
        tenant_id,
        branch_id,
        section_id,
        admission_number: admission_number.to_string(),
        first_name: "Student".to_string(),
        last_name: admission_number.to_string(),
        date_of_birth: None,
    };
    Students::new(&mut conn).create(&request).await.expect("Failed to create test student")
}

/// A user with a single role and [`TEST_PASSWORD`].
pub async fn create_test_user(pool: &PgPool, tenant_id: Option<TenantId>, branch_id: Option<BranchId>, role: Role) -> UserResponse {
    let params = Argon2Params::from(&create_test_config().auth.native.password);
    let password_hash = password::hash_string_with_params(TEST_PASSWORD, Some(params)).expect("Failed to hash test password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let request = UserCreateDBRequest {
        tenant_id,
        branch_id,
        email: format!("user_{}@school.test", Uuid::new_v4().simple()),
        display_name: "Test User".to_string(),
        password_hash,
        roles: vec![role],
    };
    let user = Users::new(&mut conn).create(&request).await.expect("Failed to create test user");
    UserResponse::from(user)
}

pub async fn deactivate_user(pool: &PgPool, user_id: UserId) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .update(
            user_id,
            &UserUpdateDBRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to deactivate test user");
}

/// `Authorization` header for the user, signed with the test config's key.
pub fn auth_header(user: &UserResponse) -> (String, String) {
    let current = CurrentUser {
        id: user.id,
        tenant_id: user.tenant_id,
        branch_id: user.branch_id,
        email: user.email.clone(),
        roles: user.roles.clone(),
    };
    let token = session::create_session_token(&current, &create_test_config()).expect("Failed to create test token");
    ("authorization".to_string(), format!("Bearer {token}"))
}

/// Tenant, branch and section with `size` active students, ready for marking.
pub struct TestSchool {
    pub tenant: TenantDBResponse,
    pub branch: BranchDBResponse,
    pub section: SectionDBResponse,
    pub students: Vec<StudentDBResponse>,
}

pub async fn create_test_school(pool: &PgPool, slug: &str, size: usize) -> TestSchool {
    let tenant = create_test_tenant(pool, slug).await;
    let branch = create_test_branch(pool, tenant.id, "MAIN").await;
    let section = create_test_section(pool, tenant.id, branch.id, "A").await;
    let mut students = Vec::with_capacity(size);
    for i in 0..size {
        students.push(create_test_student(pool, tenant.id, branch.id, Some(section.id), &format!("{slug}-{i:03}")).await);
    }
    TestSchool {
        tenant,
        branch,
        section,
        students,
    }
}
