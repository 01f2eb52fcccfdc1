//! Database models for students.

use crate::api::models::students::{StudentCreate, StudentStatus, StudentUpdate};
use crate::types::{BranchId, SectionId, StudentId, TenantId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct StudentCreateDBRequest {
    pub tenant_id: TenantId,
    pub branch_id: BranchId,
    pub section_id: Option<SectionId>,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
}

impl StudentCreateDBRequest {
    pub fn new(tenant_id: TenantId, create: StudentCreate) -> Self {
        Self {
            tenant_id,
            branch_id: create.branch_id,
            section_id: create.section_id,
            admission_number: create.admission_number.trim().to_string(),
            first_name: create.first_name.trim().to_string(),
            last_name: create.last_name.trim().to_string(),
            date_of_birth: create.date_of_birth,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StudentUpdateDBRequest {
    pub section_id: Option<Option<SectionId>>,
    pub admission_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub status: Option<StudentStatus>,
}

impl From<StudentUpdate> for StudentUpdateDBRequest {
    fn from(api: StudentUpdate) -> Self {
        Self {
            section_id: api.section_id,
            admission_number: api.admission_number.map(|s| s.trim().to_string()),
            first_name: api.first_name.map(|s| s.trim().to_string()),
            last_name: api.last_name.map(|s| s.trim().to_string()),
            date_of_birth: api.date_of_birth,
            status: api.status,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StudentDBResponse {
    pub id: StudentId,
    pub tenant_id: TenantId,
    pub branch_id: BranchId,
    pub section_id: Option<SectionId>,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
