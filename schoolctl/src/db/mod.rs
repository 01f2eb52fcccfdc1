//! Database layer for data persistence and access.
//!
//! ```text
//! API handlers ──> db::handlers (repositories) ──> db::models (rows) ──> PostgreSQL
//! ```
//!
//! - [`handlers`]: repositories, one per table or concern
//! - [`models`]: request structs and `FromRow` rows
//! - [`errors`]: [`errors::DbError`], the categorised sqlx error the API layer maps to statuses
//!
//! Multi-step writes (marking a roster, editing a record and appending its audit entry) open a
//! transaction with `pool.begin()` and build every repository they need from it. Single reads
//! use a pooled connection from `pool.acquire()`.
//!
//! Migrations live in `migrations/` and run through [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
