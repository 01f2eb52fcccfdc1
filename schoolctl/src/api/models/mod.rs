//! API request and response data models.
//!
//! These structures define the public JSON contract. They are kept separate from the database
//! records in [`crate::db::models`] and converted with `From` impls, so storage and API shapes can
//! change independently. Every model is annotated for `utoipa` so it appears in the OpenAPI
//! document.
//!
//! - [`tenants`], [`branches`], [`users`]: organisation structure and accounts
//! - [`sections`], [`students`], [`period_slots`]: the school day and its cohorts
//! - [`attendance`]: marking, editing and audit history of student attendance
//! - [`reports`]: registers and attendance summaries
//! - [`auth`]: login payloads
//! - [`pagination`]: shared `skip` / `limit` parameters

pub mod attendance;
pub mod auth;
pub mod branches;
pub mod pagination;
pub mod period_slots;
pub mod reports;
pub mod sections;
pub mod students;
pub mod tenants;
pub mod users;
