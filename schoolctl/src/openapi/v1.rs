//! OpenAPI document for the `/api/v1/*` endpoints.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;
use crate::api::models::{attendance, auth, branches, period_slots, reports, sections, students, tenants, users};
use crate::errors::ProblemDetails;

/// Security scheme for the API (bearer session tokens from `/auth/login`).
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `POST /auth/login`. Include it in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```\n\n\
                            Platform administrators select the tenant to act in with the `X-Tenant-Id` header.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "School management API")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::me,
        api::handlers::tenants::list_tenants,
        api::handlers::tenants::create_tenant,
        api::handlers::tenants::get_tenant,
        api::handlers::tenants::update_tenant,
        api::handlers::tenants::delete_tenant,
        api::handlers::branches::list_branches,
        api::handlers::branches::create_branch,
        api::handlers::branches::get_branch,
        api::handlers::branches::update_branch,
        api::handlers::branches::delete_branch,
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::sections::list_sections,
        api::handlers::sections::create_section,
        api::handlers::sections::get_section,
        api::handlers::sections::update_section,
        api::handlers::sections::delete_section,
        api::handlers::sections::list_section_students,
        api::handlers::students::list_students,
        api::handlers::students::create_student,
        api::handlers::students::get_student,
        api::handlers::students::update_student,
        api::handlers::students::delete_student,
        api::handlers::period_slots::list_period_slots,
        api::handlers::period_slots::create_period_slot,
        api::handlers::period_slots::get_period_slot,
        api::handlers::period_slots::update_period_slot,
        api::handlers::period_slots::delete_period_slot,
        api::handlers::attendance::list_attendance,
        api::handlers::attendance::mark_attendance,
        api::handlers::attendance::get_attendance,
        api::handlers::attendance::edit_attendance,
        api::handlers::attendance::delete_attendance,
        api::handlers::attendance::get_edit_window,
        api::handlers::attendance::get_attendance_history,
        api::handlers::reports::section_register,
        api::handlers::reports::section_summary,
        api::handlers::reports::student_summary,
    ),
    components(
        schemas(
            auth::LoginRequest,
            auth::LoginResponse,
            users::CurrentUser,
            users::Role,
            users::UserCreate,
            users::UserUpdate,
            users::UserResponse,
            tenants::TenantCreate,
            tenants::TenantUpdate,
            tenants::TenantResponse,
            tenants::TenantStatus,
            branches::BranchCreate,
            branches::BranchUpdate,
            branches::BranchResponse,
            sections::SectionCreate,
            sections::SectionUpdate,
            sections::SectionResponse,
            students::StudentCreate,
            students::StudentUpdate,
            students::StudentResponse,
            students::StudentStatus,
            period_slots::PeriodSlotCreate,
            period_slots::PeriodSlotUpdate,
            period_slots::PeriodSlotResponse,
            attendance::AttendanceStatus,
            attendance::AuditAction,
            attendance::MarkAttendanceEntry,
            attendance::MarkAttendanceRequest,
            attendance::AttendanceEdit,
            attendance::AttendanceResponse,
            attendance::EditWindowStatusResponse,
            attendance::AuditEntryResponse,
            attendance::AttendanceHistoryResponse,
            reports::RegisterEntry,
            reports::SectionRegisterResponse,
            reports::StudentAttendanceSummary,
            reports::SectionSummaryResponse,
            ProblemDetails,
        )
    ),
    tags(
        (name = "auth", description = "Login and the current session"),
        (name = "tenants", description = "Tenant (school organisation) administration"),
        (name = "branches", description = "Branches (campuses) of a tenant"),
        (name = "users", description = "Staff accounts and roles"),
        (name = "sections", description = "Class sections and their rosters"),
        (name = "students", description = "Student enrolment"),
        (name = "period-slots", description = "Periods of the school day, per branch"),
        (name = "attendance", description = "Marking, editing and auditing student attendance"),
        (name = "reports", description = "Registers and attendance summaries"),
    ),
    info(
        title = "schoolctl API",
        description = "Multi-tenant school management with audited student attendance.",
    )
)]
pub struct ApiDoc;
