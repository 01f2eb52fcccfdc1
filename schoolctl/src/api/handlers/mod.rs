//! HTTP request handlers for the `/api/v1` endpoints.
//!
//! Handlers are Axum functions organized by resource. Each one resolves the caller (and the tenant
//! they act in) through its permission extractor, loads rows through the repositories in
//! [`crate::db::handlers`] and converts them into response models.
//!
//! # Handler Modules
//!
//! - [`auth`]: login and the current session
//! - [`tenants`]: tenant administration (platform admins)
//! - [`branches`]: branches of a tenant
//! - [`users`]: staff accounts and role assignment
//! - [`sections`]: class sections and their rosters
//! - [`students`]: student enrolment
//! - [`period_slots`]: periods of the school day
//! - [`attendance`]: marking, editing, deleting and auditing attendance
//! - [`reports`]: registers and attendance summaries
//!
//! # Tenant scoping
//!
//! A row that belongs to another tenant is reported as missing (404). A row in the caller's tenant
//! but outside their branch is forbidden (403). Helpers for both live in [`scope`].
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which renders as an RFC 7807 problem document with
//! the matching status code.

pub mod attendance;
pub mod auth;
pub mod branches;
pub mod period_slots;
pub mod reports;
pub mod scope;
pub mod sections;
pub mod students;
pub mod tenants;
pub mod users;
