//! Database record models matching table schemas.
//!
//! Each module holds the request structs a repository accepts (`*CreateDBRequest`,
//! `*UpdateDBRequest`) and the row it returns (`*DBResponse`). Rows derive `sqlx::FromRow` and
//! convert into API models through `From` impls in [`crate::api::models`].

pub mod attendance;
pub mod branches;
pub mod period_slots;
pub mod reports;
pub mod sections;
pub mod students;
pub mod tenants;
pub mod users;
