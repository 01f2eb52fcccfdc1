//! Database repository for users.

use crate::types::{Operation, TenantId, UserId, abbrev_uuid};
use crate::{
    api::models::users::Role,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
    /// `None` lists users across every tenant (platform administrators only)
    pub tenant_id: Option<TenantId>,
    pub search: Option<String>,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            tenant_id: None,
            search: None,
        }
    }

    pub fn in_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.trim().is_empty()).map(|s| format!("%{}%", s.trim()));
        self
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub branch_id: Option<Uuid>,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct UserRole {
    user_id: UserId,
    role: Role,
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl From<(Vec<Role>, User)> for UserDBResponse {
    fn from((roles, user): (Vec<Role>, User)) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            branch_id: user.branch_id,
            email: user.email,
            display_name: user.display_name,
            roles,
            is_active: user.is_active,
            password_hash: user.password_hash,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Roles in a stable order, without duplicates
fn normalize_roles(roles: &[Role]) -> Vec<Role> {
    let mut out: Vec<Role> = Vec::with_capacity(roles.len());
    for role in roles {
        if !out.contains(role) {
            out.push(*role);
        }
    }
    out
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user_id = Uuid::new_v4();
        let roles = normalize_roles(&request.roles);

        let mut tx = self.db.begin().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, tenant_id, branch_id, email, display_name, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.tenant_id)
        .bind(request.branch_id)
        .bind(request.email.trim().to_lowercase())
        .bind(&request.display_name)
        .bind(&request.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        for role in &roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(user_id)
                .bind(role)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(UserDBResponse::from((roles, user)))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match user {
            Some(user) => {
                let roles = self.roles_for(&[user.id]).await?.remove(&user.id).unwrap_or_default();
                Ok(Some(UserDBResponse::from((roles, user))))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::UUID IS NULL OR tenant_id = $1)
              AND ($2::TEXT IS NULL OR email ILIKE $2 OR display_name ILIKE $2)
            ORDER BY created_at DESC, id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.tenant_id)
        .bind(&filter.search)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        self.attach_roles(users).await
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let has_marked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM student_attendance WHERE marked_by = $1 OR last_edited_by = $1)",
        )
        .bind(id)
        .fetch_one(&mut *self.db)
        .await?;
        if has_marked {
            return Err(DbError::ProtectedEntity {
                operation: Operation::DeleteAll,
                reason: "user has marked attendance; deactivate the account instead".to_string(),
                entity_type: "user".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // This update touches multiple tables, so regardless of the connection passed in, we still need a transaction.
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                branch_id = COALESCE($3, branch_id),
                is_active = COALESCE($4, is_active),
                password_hash = COALESCE($5, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.display_name)
        .bind(request.branch_id)
        .bind(request.is_active)
        .bind(&request.password_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(roles) = &request.roles {
            sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for role in normalize_roles(roles) {
                sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                    .bind(id)
                    .bind(role)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;

        let roles = self.roles_for(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(UserDBResponse::from((roles, user)))
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn roles_for(&mut self, ids: &[UserId]) -> Result<HashMap<UserId, Vec<Role>>> {
        let rows = sqlx::query_as::<_, UserRole>("SELECT user_id, role FROM user_roles WHERE user_id = ANY($1) ORDER BY role")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        let mut roles: HashMap<UserId, Vec<Role>> = HashMap::new();
        for row in rows {
            roles.entry(row.user_id).or_default().push(row.role);
        }
        Ok(roles)
    }

    async fn attach_roles(&mut self, users: Vec<User>) -> Result<Vec<UserDBResponse>> {
        let ids: Vec<UserId> = users.iter().map(|u| u.id).collect();
        let mut roles = self.roles_for(&ids).await?;
        Ok(users
            .into_iter()
            .map(|user| {
                let user_roles = roles.remove(&user.id).unwrap_or_default();
                UserDBResponse::from((user_roles, user))
            })
            .collect())
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &UserFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::UUID IS NULL OR tenant_id = $1)
              AND ($2::TEXT IS NULL OR email ILIKE $2 OR display_name ILIKE $2)
            "#,
        )
        .bind(filter.tenant_id)
        .bind(&filter.search)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&mut *self.db)
            .await?;

        match user {
            Some(user) => {
                let roles = self.roles_for(&[user.id]).await?.remove(&user.id).unwrap_or_default();
                Ok(Some(UserDBResponse::from((roles, user))))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn record_login(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}
