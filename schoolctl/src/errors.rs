//! Service error type and its HTTP rendering.
//!
//! Every handler returns [`Result`]. Errors render as RFC 7807 problem documents
//! (`application/problem+json`):
//!
//! ```json
//! {
//!   "type": "/problems/edit-window-expired",
//!   "title": "Edit window expired",
//!   "status": 403,
//!   "detail": "The edit window for this record closed at 2025-03-10T09:00:00Z",
//!   "window_ended_at": "2025-03-10T09:00:00Z"
//! }
//! ```
//!
//! Internal failures are logged with their full context and rendered with a generic detail.

use crate::attendance::AttendanceError;
use crate::db::errors::DbError;
use crate::types::{Operation, Permission, StudentId};
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// User lacks required permissions for the operation
    #[error("Insufficient permissions to {action} {resource}")]
    InsufficientPermissions {
        required: Permission,
        action: Operation,
        resource: String,
    },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Attendance rule violation
    #[error(transparent)]
    Attendance(#[from] AttendanceError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// Conflicting state that isn't a unique constraint violation
    #[error("Conflict: {message}")]
    Conflict { message: String },
}

/// RFC 7807 problem document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    /// Students already marked for the requested date and period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<String>>)]
    pub conflicts: Option<Vec<StudentId>>,
    /// Students rejected by roster validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<String>>)]
    pub invalid_student_ids: Option<Vec<StudentId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_ended_at: Option<DateTime<Utc>>,
}

impl ProblemDetails {
    fn new(slug: &str, title: &str, status: StatusCode, detail: String) -> Self {
        Self {
            problem_type: format!("/problems/{slug}"),
            title: title.to_string(),
            status: status.as_u16(),
            detail,
            conflicts: None,
            invalid_student_ids: None,
            window_ended_at: None,
        }
    }
}

impl AttendanceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::NotFound { .. } => StatusCode::NOT_FOUND,
            AttendanceError::EditWindowExpired { .. } | AttendanceError::NotOriginalMarker => StatusCode::FORBIDDEN,
            AttendanceError::AlreadyMarked { .. } => StatusCode::CONFLICT,
            AttendanceError::FutureDate { .. }
            | AttendanceError::BeyondBackdateLimit { .. }
            | AttendanceError::StudentsNotInSection { .. }
            | AttendanceError::DuplicateStudent { .. }
            | AttendanceError::EmptyRoster
            | AttendanceError::InvalidDateRange { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn problem(&self) -> ProblemDetails {
        let status = self.status_code();
        let (slug, title) = match self {
            AttendanceError::NotFound { .. } => ("attendance-not-found", "Attendance record not found"),
            AttendanceError::EditWindowExpired { .. } => ("edit-window-expired", "Edit window expired"),
            AttendanceError::NotOriginalMarker => ("not-original-marker", "Not the original marker"),
            AttendanceError::AlreadyMarked { .. } => ("attendance-already-marked", "Attendance already marked"),
            AttendanceError::FutureDate { .. } => ("future-date", "Date is in the future"),
            AttendanceError::BeyondBackdateLimit { .. } => ("beyond-backdate-limit", "Date is too far in the past"),
            AttendanceError::StudentsNotInSection { .. } => ("students-not-in-section", "Students not in section"),
            AttendanceError::DuplicateStudent { .. } => ("duplicate-student", "Duplicate student"),
            AttendanceError::EmptyRoster => ("empty-roster", "No attendance entries"),
            AttendanceError::InvalidDateRange { .. } => ("invalid-date-range", "Invalid date range"),
        };
        let mut problem = ProblemDetails::new(slug, title, status, self.to_string());
        match self {
            AttendanceError::AlreadyMarked { student_ids } => problem.conflicts = Some(student_ids.clone()),
            AttendanceError::StudentsNotInSection { student_ids } => problem.invalid_student_ids = Some(student_ids.clone()),
            AttendanceError::DuplicateStudent { student_id } => problem.invalid_student_ids = Some(vec![*student_id]),
            AttendanceError::EditWindowExpired { window_ended_at } => problem.window_ended_at = Some(*window_ended_at),
            _ => {}
        }
        problem
    }
}

/// Friendly message for a named unique constraint.
fn unique_violation_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("tenants_slug_unique") => "A tenant with this slug already exists",
        Some("branches_tenant_code_unique") => "A branch with this code already exists",
        Some("users_email_unique") => "An account with this email address already exists",
        Some("sections_unique_name") => "A section with this name already exists for this grade and academic year",
        Some("students_admission_number_unique") => "A student with this admission number already exists",
        Some("period_slots_branch_number_unique") => "This branch already has a period with that number",
        Some("student_attendance_unique_mark") => "Attendance is already marked for this student, date and period",
        _ => "Resource already exists",
    }
}

fn check_violation_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("period_slots_time_order") => "start_time must be before end_time",
        Some("tenants_slug_format") => "Slug must be 3 to 63 lowercase letters, digits or dashes",
        Some("tenants_edit_window_range") => "Edit window must be between 1 and 10080 minutes",
        _ => "Invalid data provided",
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::ProtectedEntity { .. } => StatusCode::CONFLICT,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Attendance(err) => err.status_code(),
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Conflict { .. } => StatusCode::CONFLICT,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InsufficientPermissions { action, resource, .. } => {
                format!("Insufficient permissions to {action} {resource}")
            }
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, .. } => unique_violation_message(constraint.as_deref()).to_string(),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { constraint, .. } => check_violation_message(constraint.as_deref()).to_string(),
                DbError::ProtectedEntity {
                    operation,
                    entity_type,
                    reason,
                    ..
                } => {
                    format!("Cannot {operation} {entity_type}: {reason}")
                }
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Attendance(err) => err.to_string(),
            Error::Other(_) => "Internal server error".to_string(),
            Error::Conflict { message } => message.clone(),
        }
    }

    /// Render the error as a problem document.
    pub fn problem(&self) -> ProblemDetails {
        let status = self.status_code();
        let (slug, title) = match self {
            Error::Attendance(err) => return err.problem(),
            Error::Unauthenticated { .. } => ("unauthenticated", "Unauthenticated"),
            Error::InsufficientPermissions { .. } => ("forbidden", "Insufficient permissions"),
            Error::BadRequest { .. } => ("bad-request", "Bad request"),
            Error::NotFound { .. } | Error::Database(DbError::NotFound) => ("not-found", "Not found"),
            Error::Conflict { .. } | Error::Database(DbError::UniqueViolation { .. }) => ("conflict", "Conflict"),
            Error::Database(DbError::ProtectedEntity { .. }) => ("protected-entity", "Conflict"),
            Error::Database(DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. }) => ("invalid-data", "Bad request"),
            Error::Internal { .. } | Error::Database(DbError::Other(_)) | Error::Other(_) => ("internal", "Internal server error"),
        };
        ProblemDetails::new(slug, title, status, self.user_message())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Attendance(AttendanceError::EditWindowExpired { .. } | AttendanceError::NotOriginalMarker) => {
                tracing::info!("Attendance edit refused: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::Attendance(_) => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
        }

        let status = self.status_code();
        let mut response = (status, axum::Json(self.problem())).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_CONTENT_TYPE));
        response
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_attendance_status_mapping() {
        let expired = Error::from(AttendanceError::EditWindowExpired {
            window_ended_at: Utc::now(),
        });
        assert_eq!(expired.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Error::from(AttendanceError::NotOriginalMarker).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::from(AttendanceError::AlreadyMarked { student_ids: vec![] }).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(Error::from(AttendanceError::EmptyRoster).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::from(AttendanceError::NotFound { id: Uuid::new_v4() }).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_problem_extension_members() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let problem = Error::from(AttendanceError::AlreadyMarked { student_ids: ids.clone() }).problem();
        assert_eq!(problem.problem_type, "/problems/attendance-already-marked");
        assert_eq!(problem.status, 409);
        assert_eq!(problem.conflicts, Some(ids.clone()));
        assert!(problem.invalid_student_ids.is_none());

        let json = serde_json::to_value(Error::from(AttendanceError::StudentsNotInSection { student_ids: ids }).problem()).unwrap();
        assert_eq!(json["invalid_student_ids"].as_array().unwrap().len(), 2);
        assert!(json.get("conflicts").is_none());
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let err = Error::Other(anyhow::anyhow!("connection refused to 10.0.0.3:5432"));
        let problem = err.problem();
        assert_eq!(problem.status, 500);
        assert_eq!(problem.detail, "Internal server error");
    }

    #[test]
    fn test_unique_violation_messages() {
        let err = Error::Database(DbError::UniqueViolation {
            constraint: Some("students_admission_number_unique".to_string()),
            table: Some("students".to_string()),
            message: "duplicate key value".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.user_message(), "A student with this admission number already exists");
    }

    #[tokio::test]
    async fn test_response_is_problem_json() {
        let response = Error::BadRequest {
            message: "name must not be empty".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], PROBLEM_CONTENT_TYPE);
    }
}
