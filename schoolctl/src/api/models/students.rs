//! API request/response models for students.

use super::pagination::Pagination;
use crate::db::models::students::StudentDBResponse;
use crate::types::{BranchId, SectionId, StudentId, TenantId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "student_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Inactive,
    Graduated,
    Transferred,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentCreate {
    #[schema(value_type = String, format = "uuid")]
    pub branch_id: BranchId,
    /// Must belong to `branch_id`
    #[schema(value_type = Option<String>, format = "uuid")]
    pub section_id: Option<SectionId>,
    /// Unique inside the tenant
    #[schema(example = "2025-0042")]
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StudentUpdate {
    /// Send `null` to remove the student from their section
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub section_id: Option<Option<SectionId>>,
    pub admission_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub status: Option<StudentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: StudentId,
    #[schema(value_type = String, format = "uuid")]
    pub tenant_id: TenantId,
    #[schema(value_type = String, format = "uuid")]
    pub branch_id: BranchId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub section_id: Option<SectionId>,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing students
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListStudentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[param(value_type = Option<String>, format = "uuid")]
    pub section_id: Option<SectionId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub branch_id: Option<BranchId>,
    pub status: Option<StudentStatus>,
    /// Case-insensitive match on name or admission number
    pub search: Option<String>,
}

impl From<StudentDBResponse> for StudentResponse {
    fn from(db: StudentDBResponse) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            branch_id: db.branch_id,
            section_id: db.section_id,
            admission_number: db.admission_number,
            first_name: db.first_name,
            last_name: db.last_name,
            date_of_birth: db.date_of_birth,
            status: db.status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
