//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open transaction) and
//! exposes strongly-typed operations returning rows from [`crate::db::models`]. CRUD-shaped
//! entities implement [`Repository`]; attendance, its audit trail and reports have bespoke
//! operations instead.
//!
//! ```ignore
//! use schoolctl::db::handlers::{Repository, Students};
//!
//! let mut tx = pool.begin().await?;
//! let student = Students::new(&mut tx).create(&request).await?;
//! tx.commit().await?;
//! ```
//!
//! Tenant scoping is the caller's job: `get_by_id` looks up by primary key only, and API handlers
//! compare the row's `tenant_id` with the caller's before using it.

pub mod attendance;
pub mod attendance_audit;
pub mod branches;
pub mod period_slots;
pub mod reports;
pub mod repository;
pub mod sections;
pub mod students;
pub mod tenants;
pub mod users;

pub use attendance::Attendance;
pub use attendance_audit::AttendanceAudit;
pub use branches::Branches;
pub use period_slots::PeriodSlots;
pub use reports::Reports;
pub use repository::Repository;
pub use sections::Sections;
pub use students::Students;
pub use tenants::Tenants;
pub use users::Users;
