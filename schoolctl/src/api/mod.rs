//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! Every route is nested under `/api/v1`:
//!
//! - **Authentication** (`/auth/*`): login and the current session
//! - **Organisation** (`/tenants/*`, `/branches/*`, `/users/*`)
//! - **Academics** (`/sections/*`, `/students/*`, `/period-slots/*`)
//! - **Attendance** (`/attendance/*`): marking, edits, deletes and history
//! - **Reports** (`/sections/{id}/attendance`, `*/attendance/summary`)
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. The document is served at
//! `/api/openapi.json` and rendered at `/api/docs`.

pub mod handlers;
pub mod models;
