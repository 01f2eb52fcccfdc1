//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (TenantId, StudentId, etc.)
//! - Permission and authorization types
//! - Resource and operation enums for access control
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`TenantId`]: Organisation boundary for data isolation
//! - [`BranchId`]: A campus or branch inside a tenant
//! - [`UserId`]: User account identifier
//! - [`SectionId`]: Class-section (cohort) identifier
//! - [`StudentId`]: Student identifier
//! - [`PeriodSlotId`]: Period slot in a branch's day
//! - [`AttendanceId`]: Student attendance record
//! - [`AuditEntryId`]: Attendance audit entry
//!
//! # Permission System
//!
//! - [`Resource`]: What entity type is being accessed
//! - [`Operation`]: What action is being performed
//! - [`Permission`]: Authorization requirement combining resource and operation
//!
//! Operations come in two flavors:
//! - **All**: Unrestricted access to all entities inside the effective tenant
//! - **Own**: Restricted to entities the user owns (their own profile, records they marked)

use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

pub type TenantId = Uuid;
pub type BranchId = Uuid;
pub type UserId = Uuid;
pub type SectionId = Uuid;
pub type StudentId = Uuid;
pub type PeriodSlotId = Uuid;
pub type AttendanceId = Uuid;
pub type AuditEntryId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub enum CurrentKeyword {
    #[serde(rename = "me")]
    Me,
}

/// Allows routes like /users/me and /users/{user_id} to hit the same handler.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserIdOrMe {
    Me(CurrentKeyword),
    Id(UserId),
}

// *-All means unrestricted access inside the tenant, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Tenants,
    Branches,
    Users,
    Sections,
    Students,
    PeriodSlots,
    Attendance,
    AttendanceAudit,
    Reports,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Caller must act inside a tenant they belong to
    TenantScope,
    /// Caller must be assigned to the branch that owns the resource
    BranchScope,
    /// Logical combinator
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Tenants => "tenants",
            Resource::Branches => "branches",
            Resource::Users => "users",
            Resource::Sections => "sections",
            Resource::Students => "students",
            Resource::PeriodSlots => "period slots",
            Resource::Attendance => "attendance",
            Resource::AttendanceAudit => "attendance audit",
            Resource::Reports => "reports",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_user_id_or_me_deserialize() {
        let me: UserIdOrMe = serde_json::from_str("\"me\"").unwrap();
        assert!(matches!(me, UserIdOrMe::Me(_)));

        let id: UserIdOrMe = serde_json::from_str("\"550e8400-e29b-41d4-a716-446655440000\"").unwrap();
        assert!(matches!(id, UserIdOrMe::Id(_)));
    }
}
