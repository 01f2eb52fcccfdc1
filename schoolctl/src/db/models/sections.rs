//! Database models for class sections.

use crate::api::models::sections::{SectionCreate, SectionUpdate};
use crate::types::{BranchId, SectionId, TenantId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct SectionCreateDBRequest {
    pub tenant_id: TenantId,
    pub branch_id: BranchId,
    pub name: String,
    pub grade_level: String,
    pub academic_year: String,
    pub class_teacher_id: Option<UserId>,
}

impl SectionCreateDBRequest {
    pub fn new(tenant_id: TenantId, create: SectionCreate) -> Self {
        Self {
            tenant_id,
            branch_id: create.branch_id,
            name: create.name.trim().to_string(),
            grade_level: create.grade_level.trim().to_string(),
            academic_year: create.academic_year.trim().to_string(),
            class_teacher_id: create.class_teacher_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SectionUpdateDBRequest {
    pub name: Option<String>,
    pub grade_level: Option<String>,
    pub academic_year: Option<String>,
    pub class_teacher_id: Option<Option<UserId>>,
}

impl From<SectionUpdate> for SectionUpdateDBRequest {
    fn from(api: SectionUpdate) -> Self {
        Self {
            name: api.name.map(|s| s.trim().to_string()),
            grade_level: api.grade_level.map(|s| s.trim().to_string()),
            academic_year: api.academic_year.map(|s| s.trim().to_string()),
            class_teacher_id: api.class_teacher_id,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SectionDBResponse {
    pub id: SectionId,
    pub tenant_id: TenantId,
    pub branch_id: BranchId,
    pub name: String,
    pub grade_level: String,
    pub academic_year: String,
    pub class_teacher_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
