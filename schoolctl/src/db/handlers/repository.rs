//! The repository trait for CRUD-shaped tables.

use crate::db::errors::Result;
use crate::db::models::{
    branches::BranchDBResponse, period_slots::PeriodSlotDBResponse, sections::SectionDBResponse, students::StudentDBResponse,
};
use crate::types::TenantId;

/// Rows owned by exactly one tenant.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

macro_rules! tenant_scoped {
    ($($row:ty),* $(,)?) => {
        $(impl TenantScoped for $row {
            fn tenant_id(&self) -> TenantId {
                self.tenant_id
            }
        })*
    };
}

tenant_scoped!(BranchDBResponse, SectionDBResponse, StudentDBResponse, PeriodSlotDBResponse);

/// CRUD operations shared by the tenant, branch, user, section, student and period slot tables.
///
/// Create and update take separate request types; `Response` is the `FromRow` row. Repositories
/// with extra operations (counts, lookups by natural key) add them as inherent methods.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The request type for updating entities
    type UpdateRequest;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Get an entity by ID, treating rows of any other tenant as missing
    async fn get_in_tenant(&mut self, id: Self::Id, tenant_id: TenantId) -> Result<Option<Self::Response>>
    where
        Self: Send,
        Self::Response: TenantScoped + Send,
    {
        Ok(self.get_by_id(id).await?.filter(|row| row.tenant_id() == tenant_id))
    }

    /// List entities with filtering and pagination
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Delete an entity by ID
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Update an entity by ID
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
