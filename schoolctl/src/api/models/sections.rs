//! API request/response models for class sections.

use super::pagination::Pagination;
use crate::db::models::sections::SectionDBResponse;
use crate::types::{BranchId, SectionId, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SectionCreate {
    #[schema(value_type = String, format = "uuid")]
    pub branch_id: BranchId,
    #[schema(example = "A")]
    pub name: String,
    #[schema(example = "Grade 5")]
    pub grade_level: String,
    #[schema(example = "2025-2026")]
    pub academic_year: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub class_teacher_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SectionUpdate {
    pub name: Option<String>,
    pub grade_level: Option<String>,
    pub academic_year: Option<String>,
    /// Send `null` to unassign the class teacher
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub class_teacher_id: Option<Option<UserId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SectionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: SectionId,
    #[schema(value_type = String, format = "uuid")]
    pub tenant_id: TenantId,
    #[schema(value_type = String, format = "uuid")]
    pub branch_id: BranchId,
    pub name: String,
    pub grade_level: String,
    pub academic_year: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub class_teacher_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing sections
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSectionsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[param(value_type = Option<String>, format = "uuid")]
    pub branch_id: Option<BranchId>,
    pub academic_year: Option<String>,
    pub grade_level: Option<String>,
}

impl From<SectionDBResponse> for SectionResponse {
    fn from(db: SectionDBResponse) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            branch_id: db.branch_id,
            name: db.name,
            grade_level: db.grade_level,
            academic_year: db.academic_year,
            class_teacher_id: db.class_teacher_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
