use crate::{
    AppState,
    api::{
        handlers::scope::{branch_filter, not_found, referenced_branch, require_text, require_text_if_set},
        models::{
            pagination::PaginatedResponse,
            period_slots::{ListPeriodSlotsQuery, PeriodSlotCreate, PeriodSlotResponse, PeriodSlotUpdate},
            users::CurrentUser,
        },
    },
    auth::permissions::{RequiresPermission, operation, require_branch_access, resource},
    db::{
        handlers::{PeriodSlots, Repository, period_slots::PeriodSlotFilter},
        models::period_slots::{PeriodSlotCreateDBRequest, PeriodSlotDBResponse, PeriodSlotUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Operation, PeriodSlotId, Resource, TenantId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveTime;
use sqlx::PgConnection;

fn validate_slot(period_number: i32, start_time: NaiveTime, end_time: NaiveTime) -> Result<()> {
    if period_number < 1 {
        return Err(Error::BadRequest {
            message: "period_number must be at least 1".to_string(),
        });
    }
    if start_time >= end_time {
        return Err(Error::BadRequest {
            message: "start_time must be before end_time".to_string(),
        });
    }
    Ok(())
}

async fn slot_for(
    conn: &mut PgConnection,
    user: &CurrentUser,
    tenant_id: TenantId,
    id: PeriodSlotId,
    action: Operation,
) -> Result<PeriodSlotDBResponse> {
    let slot = PeriodSlots::new(conn)
        .get_in_tenant(id, tenant_id)
        .await?
        .ok_or_else(|| not_found("Period slot", id))?;
    require_branch_access(user, slot.branch_id, action, Resource::PeriodSlots)?;
    Ok(slot)
}

#[utoipa::path(
    get,
    path = "/period-slots",
    tag = "period-slots",
    summary = "List period slots",
    params(ListPeriodSlotsQuery),
    responses(
        (status = 200, description = "Paginated list of period slots, in period order", body = PaginatedResponse<PeriodSlotResponse>),
        (status = 400, description = "No tenant selected"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_period_slots(
    State(state): State<AppState>,
    Query(query): Query<ListPeriodSlotsQuery>,
    current_user: RequiresPermission<resource::PeriodSlots, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<PeriodSlotResponse>>> {
    let tenant_id = current_user.require_tenant()?;
    let (skip, limit) = query.pagination.params();
    let filter = PeriodSlotFilter {
        branch_id: branch_filter(&current_user, query.branch_id, Resource::PeriodSlots)?,
        ..PeriodSlotFilter::new(tenant_id, skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = PeriodSlots::new(&mut conn);
    let slots = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        slots.into_iter().map(PeriodSlotResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/period-slots",
    tag = "period-slots",
    summary = "Create a period slot",
    request_body = PeriodSlotCreate,
    responses(
        (status = 201, description = "Period slot created", body = PeriodSlotResponse),
        (status = 400, description = "Invalid times or unknown branch"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Period number already used in this branch"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_period_slot(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::PeriodSlots, operation::CreateAll>,
    Json(create): Json<PeriodSlotCreate>,
) -> Result<(StatusCode, Json<PeriodSlotResponse>)> {
    let tenant_id = current_user.require_tenant()?;
    require_text("name", &create.name)?;
    validate_slot(create.period_number, create.start_time, create.end_time)?;
    require_branch_access(&current_user, create.branch_id, Operation::CreateAll, Resource::PeriodSlots)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    referenced_branch(&mut tx, tenant_id, create.branch_id).await?;
    let slot = PeriodSlots::new(&mut tx)
        .create(&PeriodSlotCreateDBRequest::new(tenant_id, create))
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(PeriodSlotResponse::from(slot))))
}

#[utoipa::path(
    get,
    path = "/period-slots/{id}",
    tag = "period-slots",
    summary = "Get a period slot",
    params(("id" = String, Path, description = "Period slot ID")),
    responses(
        (status = 200, description = "The period slot", body = PeriodSlotResponse),
        (status = 404, description = "Period slot not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_period_slot(
    State(state): State<AppState>,
    Path(id): Path<PeriodSlotId>,
    current_user: RequiresPermission<resource::PeriodSlots, operation::ReadAll>,
) -> Result<Json<PeriodSlotResponse>> {
    let tenant_id = current_user.require_tenant()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let slot = slot_for(&mut conn, &current_user, tenant_id, id, Operation::ReadAll).await?;
    Ok(Json(PeriodSlotResponse::from(slot)))
}

#[utoipa::path(
    patch,
    path = "/period-slots/{id}",
    tag = "period-slots",
    summary = "Update a period slot",
    params(("id" = String, Path, description = "Period slot ID")),
    request_body = PeriodSlotUpdate,
    responses(
        (status = 200, description = "Period slot updated", body = PeriodSlotResponse),
        (status = 400, description = "Invalid times"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Period slot not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_period_slot(
    State(state): State<AppState>,
    Path(id): Path<PeriodSlotId>,
    current_user: RequiresPermission<resource::PeriodSlots, operation::UpdateAll>,
    Json(update): Json<PeriodSlotUpdate>,
) -> Result<Json<PeriodSlotResponse>> {
    let tenant_id = current_user.require_tenant()?;
    require_text_if_set("name", update.name.as_deref())?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let existing = slot_for(&mut tx, &current_user, tenant_id, id, Operation::UpdateAll).await?;
    validate_slot(
        update.period_number.unwrap_or(existing.period_number),
        update.start_time.unwrap_or(existing.start_time),
        update.end_time.unwrap_or(existing.end_time),
    )?;
    let slot = PeriodSlots::new(&mut tx).update(id, &PeriodSlotUpdateDBRequest::from(update)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(PeriodSlotResponse::from(slot)))
}

#[utoipa::path(
    delete,
    path = "/period-slots/{id}",
    tag = "period-slots",
    summary = "Delete a period slot",
    description = "Slots referenced by attendance records cannot be deleted.",
    params(("id" = String, Path, description = "Period slot ID")),
    responses(
        (status = 204, description = "Period slot deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Period slot not found in this tenant"),
        (status = 409, description = "Period slot is in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_period_slot(
    State(state): State<AppState>,
    Path(id): Path<PeriodSlotId>,
    current_user: RequiresPermission<resource::PeriodSlots, operation::DeleteAll>,
) -> Result<StatusCode> {
    let tenant_id = current_user.require_tenant()?;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    slot_for(&mut tx, &current_user, tenant_id, id, Operation::DeleteAll).await?;
    PeriodSlots::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::validate_slot;
    use crate::{
        api::models::{period_slots::PeriodSlotResponse, users::Role},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use chrono::NaiveTime;
    use serde_json::json;
    use sqlx::PgPool;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_validate_slot() {
        assert!(validate_slot(1, at(8, 0), at(8, 45)).is_ok());
        assert!(validate_slot(0, at(8, 0), at(8, 45)).is_err());
        assert!(validate_slot(2, at(9, 0), at(9, 0)).is_err());
        assert!(validate_slot(2, at(10, 0), at(9, 0)).is_err());
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_period_slot_lifecycle(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "slots-crud").await;
        let branch = create_test_branch(&pool, tenant.id, "MAIN").await;
        let admin = create_test_user(&pool, Some(tenant.id), None, Role::SchoolAdmin).await;
        let (name, value) = auth_header(&admin);

        let response = app
            .post("/api/v1/period-slots")
            .add_header(&name, &value)
            .json(&json!({
                "branch_id": branch.id,
                "name": "Period 1",
                "period_number": 1,
                "start_time": "08:00:00",
                "end_time": "08:45:00",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let slot: PeriodSlotResponse = response.json();
        assert_eq!(slot.start_time, at(8, 0));

        app.post("/api/v1/period-slots")
            .add_header(&name, &value)
            .json(&json!({
                "branch_id": branch.id,
                "name": "Period 1 again",
                "period_number": 1,
                "start_time": "09:00:00",
                "end_time": "09:45:00",
            }))
            .await
            .assert_status(StatusCode::CONFLICT);

        // Moving the start past the existing end is rejected
        app.patch(&format!("/api/v1/period-slots/{}", slot.id))
            .add_header(&name, &value)
            .json(&json!({"start_time": "09:00:00"}))
            .await
            .assert_status_bad_request();

        let response = app
            .patch(&format!("/api/v1/period-slots/{}", slot.id))
            .add_header(&name, &value)
            .json(&json!({"start_time": "08:05:00", "name": "Homeroom"}))
            .await;
        response.assert_status_ok();
        let updated: PeriodSlotResponse = response.json();
        assert_eq!(updated.name, "Homeroom");
        assert_eq!(updated.end_time, at(8, 45));

        app.delete(&format!("/api/v1/period-slots/{}", slot.id))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_teacher_reads_but_cannot_write_slots(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let tenant = create_test_tenant(&pool, "slots-teacher").await;
        let branch = create_test_branch(&pool, tenant.id, "MAIN").await;
        let teacher = create_test_user(&pool, Some(tenant.id), Some(branch.id), Role::Teacher).await;
        let (name, value) = auth_header(&teacher);

        app.get("/api/v1/period-slots").add_header(&name, &value).await.assert_status_ok();
        app.post("/api/v1/period-slots")
            .add_header(&name, &value)
            .json(&json!({
                "branch_id": branch.id,
                "name": "Extra",
                "period_number": 9,
                "start_time": "15:00:00",
                "end_time": "15:45:00",
            }))
            .await
            .assert_status_forbidden();
    }
}
