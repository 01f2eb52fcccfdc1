//! Authentication and authorization.
//!
//! Users log in with email and password at `POST /api/v1/auth/login` and receive an HS256 JWT.
//! Every other route expects it in `Authorization: Bearer <token>`.
//!
//! Authorization has three layers:
//! - **Roles** grant (resource, operation) pairs; see [`permissions`].
//! - **Tenant scope**: a tenant user only ever acts in their own tenant. Platform administrators
//!   pick a tenant per request with the tenant header (`X-Tenant-ID` by default).
//! - **Branch scope**: users bound to a branch only touch that branch's sections and records.
//!
//! # Modules
//!
//! - [`current_user`]: the [`CurrentUser`](crate::api::models::users::CurrentUser) extractor
//! - [`password`]: Argon2id hashing and length rules
//! - [`permissions`]: the role matrix and the `RequiresPermission` extractor
//! - [`session`]: JWT creation and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use schoolctl::auth::permissions::{operation, resource, RequiresPermission};
//!
//! async fn list_sections(
//!     State(state): State<AppState>,
//!     current_user: RequiresPermission<resource::Sections, operation::ReadAll>,
//! ) -> Result<Json<Vec<SectionResponse>>> {
//!     let tenant_id = current_user.require_tenant()?;
//!     // ...
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
