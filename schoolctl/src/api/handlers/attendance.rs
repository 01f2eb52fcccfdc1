//! Student attendance: marking, edits inside the edit window, soft deletes and audit history.
//!
//! Every mutation runs in one transaction with its audit entry, so a record and its trail never
//! disagree. Edits and deletes lock the row first; two concurrent editors are serialized and the
//! second sees the first one's result when computing its change set.

use std::collections::HashSet;

use crate::{
    AppState,
    api::{
        handlers::scope::{branch_filter, not_found, section_for},
        models::{
            attendance::{
                AttendanceEdit, AttendanceHistoryResponse, AttendanceResponse, AuditAction, AuditEntryResponse,
                DeleteAttendanceQuery, EditWindowStatusResponse, ListAttendanceQuery, MarkAttendanceRequest,
            },
            pagination::PaginatedResponse,
            users::CurrentUser,
        },
    },
    attendance::{
        AttendanceError,
        audit::{TrailEntry, field_timelines, replay},
        policy::{EditGrant, EditWindow, EditWindowReason, effective_window, validate_marking_date},
        summary::validate_range,
    },
    auth::permissions::{RequiresPermission, operation, require_branch_access, resource},
    db::{
        handlers::{
            Attendance, AttendanceAudit, PeriodSlots, Repository, Students, Tenants, attendance::AttendanceFilter,
        },
        models::attendance::{
            AttendanceDBResponse, AttendanceEditDBRequest, AttendanceMarkDBRequest, AttendanceMarkEntry,
            AuditEntryCreateDBRequest,
        },
    },
    errors::{Error, Result},
    types::{AttendanceId, Operation, Resource, TenantId, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sqlx::PgConnection;
use tracing::info;

/// Trimmed free text, with blanks treated as absent.
fn optional_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Load a live record of the tenant, optionally locking it, and check branch access.
async fn record_for(
    conn: &mut PgConnection,
    user: &CurrentUser,
    tenant_id: TenantId,
    id: AttendanceId,
    lock: bool,
    action: Operation,
) -> Result<AttendanceDBResponse> {
    let mut repo = Attendance::new(conn);
    let record = if lock { repo.get_for_update(id).await? } else { repo.get_by_id(id).await? };
    let record = record
        .filter(|r| r.tenant_id == tenant_id)
        .ok_or(AttendanceError::NotFound { id })?;
    require_branch_access(user, record.branch_id, action, Resource::Attendance)?;
    Ok(record)
}

/// The edit window of a record, using the tenant's override when it has one.
async fn window_for(conn: &mut PgConnection, state: &AppState, record: &AttendanceDBResponse) -> Result<EditWindow> {
    let tenant = Tenants::new(conn)
        .get_by_id(record.tenant_id)
        .await?
        .ok_or_else(|| not_found("Tenant", record.tenant_id))?;
    let length = effective_window(state.config.attendance.edit_window, tenant.attendance_edit_window_minutes);
    Ok(EditWindow::new(record.marked_at, length))
}

#[utoipa::path(
    get,
    path = "/attendance",
    tag = "attendance",
    summary = "List attendance records",
    description = "Live records of the tenant, newest date first. Branch-bound staff only see their own branch.",
    params(ListAttendanceQuery),
    responses(
        (status = 200, description = "Paginated list of records", body = PaginatedResponse<AttendanceResponse>),
        (status = 400, description = "Invalid date range or no tenant selected"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_attendance(
    State(state): State<AppState>,
    Query(query): Query<ListAttendanceQuery>,
    current_user: RequiresPermission<resource::Attendance, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<AttendanceResponse>>> {
    let tenant_id = current_user.require_tenant()?;
    if let (Some(from), Some(to)) = (query.from, query.to) {
        validate_range(from, to)?;
    }
    let (skip, limit) = query.pagination.params();
    let filter = AttendanceFilter {
        branch_id: branch_filter(&current_user, None, Resource::Attendance)?,
        section_id: query.section_id,
        student_id: query.student_id,
        period_slot_id: query.period_slot_id,
        status: query.status,
        from: query.from,
        to: query.to,
        ..AttendanceFilter::new(tenant_id, skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Attendance::new(&mut conn);
    let records = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        records.into_iter().map(AttendanceResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/attendance",
    tag = "attendance",
    summary = "Mark attendance",
    description = "Marks a section for one date and period. The whole batch is rejected if any student \
                   is outside the section, listed twice, or already marked for that date and period.",
    request_body = MarkAttendanceRequest,
    responses(
        (status = 201, description = "Records created", body = Vec<AttendanceResponse>),
        (status = 400, description = "Invalid date, roster or period slot"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Section not found in this tenant"),
        (status = 409, description = "Some students are already marked"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_attendance(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Attendance, operation::CreateAll>,
    Json(request): Json<MarkAttendanceRequest>,
) -> Result<(StatusCode, Json<Vec<AttendanceResponse>>)> {
    let tenant_id = current_user.require_tenant()?;
    if request.entries.is_empty() {
        return Err(AttendanceError::EmptyRoster.into());
    }
    let mut seen = HashSet::with_capacity(request.entries.len());
    for entry in &request.entries {
        if !seen.insert(entry.student_id) {
            return Err(AttendanceError::DuplicateStudent {
                student_id: entry.student_id,
            }
            .into());
        }
    }
    let now = Utc::now();
    validate_marking_date(
        request.attendance_date,
        now.date_naive(),
        state.config.attendance.max_backdate_days,
        current_user.is_admin(),
    )?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let section = section_for(&mut tx, &current_user, tenant_id, request.section_id, Operation::CreateAll).await?;

    if let Some(slot_id) = request.period_slot_id {
        match PeriodSlots::new(&mut tx).get_in_tenant(slot_id, tenant_id).await? {
            Some(slot) if slot.branch_id == section.branch_id => {}
            _ => {
                return Err(Error::BadRequest {
                    message: format!("Period slot {slot_id} does not belong to the section's branch"),
                });
            }
        }
    }

    let student_ids: Vec<_> = request.entries.iter().map(|e| e.student_id).collect();
    let outsiders = Students::new(&mut tx).non_members(section.id, &student_ids).await?;
    if !outsiders.is_empty() {
        return Err(AttendanceError::StudentsNotInSection { student_ids: outsiders }.into());
    }
    let marked = Attendance::new(&mut tx)
        .already_marked(tenant_id, &student_ids, request.attendance_date, request.period_slot_id)
        .await?;
    if !marked.is_empty() {
        return Err(AttendanceError::AlreadyMarked { student_ids: marked }.into());
    }

    let records = Attendance::new(&mut tx)
        .insert_batch(&AttendanceMarkDBRequest {
            tenant_id,
            branch_id: section.branch_id,
            section_id: section.id,
            attendance_date: request.attendance_date,
            period_slot_id: request.period_slot_id,
            marked_by: current_user.id,
            marked_at: now,
            entries: request
                .entries
                .into_iter()
                .map(|e| AttendanceMarkEntry {
                    student_id: e.student_id,
                    status: e.status,
                    remarks: optional_text(e.remarks),
                })
                .collect(),
        })
        .await?;

    let mut audit = AttendanceAudit::new(&mut tx);
    for record in &records {
        audit
            .append(&AuditEntryCreateDBRequest {
                tenant_id,
                attendance_id: record.id,
                action: AuditAction::Created,
                changed_by: current_user.id,
                changed_at: now,
                changes: record.snapshot().creation_changes(),
                previous: None,
                reason: None,
                override_applied: false,
            })
            .await?;
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(
        section_id = %abbrev_uuid(&section.id),
        date = %request.attendance_date,
        count = records.len(),
        "Marked attendance"
    );
    Ok((StatusCode::CREATED, Json(records.into_iter().map(AttendanceResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/attendance/{id}",
    tag = "attendance",
    summary = "Get an attendance record",
    params(("id" = String, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "The record", body = AttendanceResponse),
        (status = 404, description = "Record not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_attendance(
    State(state): State<AppState>,
    Path(id): Path<AttendanceId>,
    current_user: RequiresPermission<resource::Attendance, operation::ReadAll>,
) -> Result<Json<AttendanceResponse>> {
    let tenant_id = current_user.require_tenant()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let record = record_for(&mut conn, &current_user, tenant_id, id, false, Operation::ReadAll).await?;
    Ok(Json(AttendanceResponse::from(record)))
}

#[utoipa::path(
    patch,
    path = "/attendance/{id}",
    tag = "attendance",
    summary = "Edit an attendance record",
    description = "The user who marked a record may edit it until its edit window closes. Admins may \
                   edit any record at any time; such edits are flagged as overrides in the audit trail. \
                   An edit that changes nothing returns the record without writing an audit entry.",
    params(("id" = String, Path, description = "Attendance record ID")),
    request_body = AttendanceEdit,
    responses(
        (status = 200, description = "The record after the edit", body = AttendanceResponse),
        (status = 403, description = "Edit window closed, or caller is not the original marker"),
        (status = 404, description = "Record not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn edit_attendance(
    State(state): State<AppState>,
    Path(id): Path<AttendanceId>,
    current_user: RequiresPermission<resource::Attendance, operation::UpdateOwn>,
    Json(edit): Json<AttendanceEdit>,
) -> Result<Json<AttendanceResponse>> {
    let tenant_id = current_user.require_tenant()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let record = record_for(&mut tx, &current_user, tenant_id, id, true, Operation::UpdateOwn).await?;
    // Read the clock only once the row lock is held.
    let now = Utc::now();
    let window = window_for(&mut tx, &state, &record).await?;
    let grant = window.authorize(record.marked_by, current_user.editor(), now)?;

    let previous = record.snapshot();
    let next = previous.apply(edit.status, edit.remarks.as_deref());
    let changes = previous.changes_to(&next);
    if changes.is_empty() {
        return Ok(Json(AttendanceResponse::from(record)));
    }

    let updated = Attendance::new(&mut tx)
        .apply_edit(
            id,
            &AttendanceEditDBRequest {
                next,
                edited_by: current_user.id,
                edited_at: now,
            },
        )
        .await?;
    AttendanceAudit::new(&mut tx)
        .append(&AuditEntryCreateDBRequest {
            tenant_id,
            attendance_id: id,
            action: AuditAction::Updated,
            changed_by: current_user.id,
            changed_at: now,
            changes,
            previous: Some(previous),
            reason: optional_text(edit.reason),
            override_applied: grant.is_override(),
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    if grant == EditGrant::AdminOverride {
        info!(attendance_id = %abbrev_uuid(&id), editor = %abbrev_uuid(&current_user.id), "Attendance edited with admin override");
    }
    Ok(Json(AttendanceResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/attendance/{id}",
    tag = "attendance",
    summary = "Delete an attendance record",
    description = "Soft-deletes the record and appends a `deleted` audit entry. The student can then be marked again.",
    params(
        ("id" = String, Path, description = "Attendance record ID"),
        DeleteAttendanceQuery,
    ),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 403, description = "Forbidden - admins only"),
        (status = 404, description = "Record not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_attendance(
    State(state): State<AppState>,
    Path(id): Path<AttendanceId>,
    Query(query): Query<DeleteAttendanceQuery>,
    current_user: RequiresPermission<resource::Attendance, operation::DeleteAll>,
) -> Result<StatusCode> {
    let tenant_id = current_user.require_tenant()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let record = record_for(&mut tx, &current_user, tenant_id, id, true, Operation::DeleteAll).await?;
    // Read the clock only once the row lock is held.
    let now = Utc::now();
    let window = window_for(&mut tx, &state, &record).await?;
    let grant = window.authorize(record.marked_by, current_user.editor(), now)?;

    if !Attendance::new(&mut tx).soft_delete(id, now).await? {
        return Err(AttendanceError::NotFound { id }.into());
    }
    let previous = record.snapshot();
    AttendanceAudit::new(&mut tx)
        .append(&AuditEntryCreateDBRequest {
            tenant_id,
            attendance_id: id,
            action: AuditAction::Deleted,
            changed_by: current_user.id,
            changed_at: now,
            changes: previous.deletion_changes(),
            previous: Some(previous),
            reason: optional_text(query.reason),
            override_applied: grant.is_override(),
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(attendance_id = %abbrev_uuid(&id), "Attendance record deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/attendance/{id}/edit-window",
    tag = "attendance",
    summary = "Edit-window status",
    description = "Whether the caller may edit the record right now, and why.",
    params(("id" = String, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Edit-window status for the caller", body = EditWindowStatusResponse),
        (status = 404, description = "Record not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_edit_window(
    State(state): State<AppState>,
    Path(id): Path<AttendanceId>,
    current_user: RequiresPermission<resource::Attendance, operation::ReadAll>,
) -> Result<Json<EditWindowStatusResponse>> {
    let tenant_id = current_user.require_tenant()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let record = record_for(&mut conn, &current_user, tenant_id, id, false, Operation::ReadAll).await?;
    let window = window_for(&mut conn, &state, &record).await?;

    let reason = window.reason(record.marked_by, current_user.editor(), Utc::now());
    Ok(Json(EditWindowStatusResponse {
        attendance_id: id,
        editable: matches!(reason, EditWindowReason::WithinWindow | EditWindowReason::AdminOverride),
        window_ends_at: window.ends_at(),
        window_minutes: window.length.num_minutes(),
        reason,
    }))
}

#[utoipa::path(
    get,
    path = "/attendance/{id}/history",
    tag = "attendance",
    summary = "Attendance record history",
    description = "Audit entries oldest first, per-field timelines rebuilt from them, and the state the \
                   entries replay to (`null` once the record is deleted). Deleted records keep their history.",
    params(("id" = String, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "The record's history", body = AttendanceHistoryResponse),
        (status = 403, description = "Forbidden, including records of another branch"),
        (status = 404, description = "No history for this record in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_attendance_history(
    State(state): State<AppState>,
    Path(id): Path<AttendanceId>,
    current_user: RequiresPermission<resource::AttendanceAudit, operation::ReadAll>,
) -> Result<Json<AttendanceHistoryResponse>> {
    let tenant_id = current_user.require_tenant()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let record = Attendance::new(&mut conn)
        .get_including_deleted(id)
        .await?
        .filter(|r| r.tenant_id == tenant_id)
        .ok_or(AttendanceError::NotFound { id })?;
    require_branch_access(&current_user, record.branch_id, Operation::ReadAll, Resource::AttendanceAudit)?;

    let entries = AttendanceAudit::new(&mut conn).list_for_record(id).await?;
    if entries.is_empty() {
        return Err(AttendanceError::NotFound { id }.into());
    }

    let trail: Vec<TrailEntry> = entries.iter().map(TrailEntry::from).collect();
    Ok(Json(AttendanceHistoryResponse {
        attendance_id: id,
        fields: field_timelines(&trail),
        current: replay(&trail),
        entries: entries.into_iter().map(AuditEntryResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            attendance::{AttendanceResponse, AttendanceStatus, AuditAction},
            users::{Role, UserResponse},
        },
        db::{
            handlers::{Attendance, AttendanceAudit},
            models::attendance::{AttendanceEditDBRequest, AuditEntryCreateDBRequest},
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use serde_json::{Value, json};
    use sqlx::PgPool;
    use uuid::Uuid;

    fn today() -> String {
        Utc::now().date_naive().to_string()
    }

    async fn mark(app: &TestServer, user: &UserResponse, school: &TestSchool, date: &str) -> Vec<AttendanceResponse> {
        let (name, value) = auth_header(user);
        let entries: Vec<Value> = school
            .students
            .iter()
            .map(|s| json!({"student_id": s.id, "status": "present"}))
            .collect();
        let response = app
            .post("/api/v1/attendance")
            .add_header(&name, &value)
            .json(&json!({"section_id": school.section.id, "attendance_date": date, "entries": entries}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    /// Move a record's marking time into the past so its window has closed.
    async fn age_record(pool: &PgPool, id: Uuid, minutes: i64) {
        sqlx::query("UPDATE student_attendance SET marked_at = marked_at - make_interval(mins => $2::int) WHERE id = $1")
            .bind(id)
            .bind(minutes as i32)
            .execute(pool)
            .await
            .unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_mark_attendance_creates_records_and_audit(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "mark-ok", 3).await;
        let teacher = create_test_user(&pool, Some(school.tenant.id), Some(school.branch.id), Role::Teacher).await;

        let records = mark(&app, &teacher, &school, &today()).await;
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.marked_by == teacher.id && r.status == AttendanceStatus::Present));

        let (name, value) = auth_header(&teacher);
        let response = app
            .get(&format!("/api/v1/attendance/{}/history", records[0].id))
            .add_header(&name, &value)
            .await;
        response.assert_status_ok();
        let history: Value = response.json();
        assert_eq!(history["entries"].as_array().unwrap().len(), 1);
        assert_eq!(history["entries"][0]["action"], "created");
        assert_eq!(history["current"], json!({"status": "present", "remarks": null}));
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_mark_rejects_double_marking(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "mark-twice", 2).await;
        let teacher = create_test_user(&pool, Some(school.tenant.id), None, Role::Teacher).await;
        mark(&app, &teacher, &school, &today()).await;

        let (name, value) = auth_header(&teacher);
        let response = app
            .post("/api/v1/attendance")
            .add_header(&name, &value)
            .json(&json!({
                "section_id": school.section.id,
                "attendance_date": today(),
                "entries": [{"student_id": school.students[1].id, "status": "absent"}],
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["conflicts"], json!([school.students[1].id]));
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_mark_validation(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "mark-invalid", 1).await;
        let stranger = create_test_student(&pool, school.tenant.id, school.branch.id, None, "LOOSE-1").await;
        let teacher = create_test_user(&pool, Some(school.tenant.id), None, Role::Teacher).await;
        let (name, value) = auth_header(&teacher);
        let student = school.students[0].id;
        let tomorrow = (Utc::now().date_naive() + Duration::days(1)).to_string();
        let long_ago = (Utc::now().date_naive() - Duration::days(30)).to_string();

        for body in [
            json!({"section_id": school.section.id, "attendance_date": today(), "entries": []}),
            json!({"section_id": school.section.id, "attendance_date": tomorrow, "entries": [{"student_id": student, "status": "present"}]}),
            json!({"section_id": school.section.id, "attendance_date": long_ago, "entries": [{"student_id": student, "status": "present"}]}),
            json!({"section_id": school.section.id, "attendance_date": today(), "entries": [
                {"student_id": student, "status": "present"},
                {"student_id": student, "status": "absent"},
            ]}),
            json!({"section_id": school.section.id, "attendance_date": today(), "entries": [{"student_id": stranger.id, "status": "present"}]}),
        ] {
            app.post("/api/v1/attendance")
                .add_header(&name, &value)
                .json(&body)
                .await
                .assert_status_bad_request();
        }
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_admin_may_backdate_beyond_limit(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "mark-backdate", 1).await;
        let admin = create_test_user(&pool, Some(school.tenant.id), None, Role::SchoolAdmin).await;
        let long_ago = (Utc::now().date_naive() - Duration::days(30)).to_string();

        let records = mark(&app, &admin, &school, &long_ago).await;
        assert_eq!(records[0].attendance_date.to_string(), long_ago);
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_marker_edits_within_window(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "edit-window", 1).await;
        let teacher = create_test_user(&pool, Some(school.tenant.id), None, Role::Teacher).await;
        let record = mark(&app, &teacher, &school, &today()).await.remove(0);
        let (name, value) = auth_header(&teacher);

        let response = app
            .patch(&format!("/api/v1/attendance/{}", record.id))
            .add_header(&name, &value)
            .json(&json!({"status": "late", "remarks": "Bus delayed", "reason": "Arrived 09:10"}))
            .await;
        response.assert_status_ok();
        let edited: AttendanceResponse = response.json();
        assert_eq!(edited.status, AttendanceStatus::Late);
        assert_eq!(edited.last_edited_by, Some(teacher.id));

        // Same values again: no change, no audit entry
        app.patch(&format!("/api/v1/attendance/{}", record.id))
            .add_header(&name, &value)
            .json(&json!({"status": "late"}))
            .await
            .assert_status_ok();

        let response = app
            .get(&format!("/api/v1/attendance/{}/history", record.id))
            .add_header(&name, &value)
            .await;
        let history: Value = response.json();
        assert_eq!(history["entries"].as_array().unwrap().len(), 2);
        let update = &history["entries"][1];
        assert_eq!(update["action"], "updated");
        assert_eq!(update["override_applied"], false);
        assert_eq!(update["reason"], "Arrived 09:10");
        assert_eq!(update["previous"]["status"], "present");
        assert_eq!(history["current"], json!({"status": "late", "remarks": "Bus delayed"}));
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_edit_policy(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "edit-policy", 1).await;
        let marker = create_test_user(&pool, Some(school.tenant.id), None, Role::Teacher).await;
        let colleague = create_test_user(&pool, Some(school.tenant.id), None, Role::Teacher).await;
        let admin = create_test_user(&pool, Some(school.tenant.id), None, Role::SchoolAdmin).await;
        let record = mark(&app, &marker, &school, &today()).await.remove(0);
        let url = format!("/api/v1/attendance/{}", record.id);

        let (name, value) = auth_header(&colleague);
        let response = app.patch(&url).add_header(&name, &value).json(&json!({"status": "absent"})).await;
        response.assert_status_forbidden();
        assert_eq!(response.json::<Value>()["type"], "/problems/not-original-marker");

        // Default window is an hour
        age_record(&pool, record.id, 90).await;

        let (name, value) = auth_header(&marker);
        let response = app.patch(&url).add_header(&name, &value).json(&json!({"status": "absent"})).await;
        response.assert_status_forbidden();
        assert_eq!(response.json::<Value>()["type"], "/problems/edit-window-expired");

        let response = app
            .get(&format!("{url}/edit-window"))
            .add_header(&name, &value)
            .await;
        let status: Value = response.json();
        assert_eq!(status["editable"], false);
        assert_eq!(status["reason"], "window_expired");

        let (name, value) = auth_header(&admin);
        let response = app
            .get(&format!("{url}/edit-window"))
            .add_header(&name, &value)
            .await;
        let status: Value = response.json();
        assert_eq!(status["editable"], true);
        assert_eq!(status["reason"], "admin_override");

        app.patch(&url)
            .add_header(&name, &value)
            .json(&json!({"status": "excused", "reason": "Medical note"}))
            .await
            .assert_status_ok();
        let history: Value = app.get(&format!("{url}/history")).add_header(&name, &value).await.json();
        assert_eq!(history["entries"][1]["override_applied"], true);
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_tenant_edit_window_override(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "edit-override", 1).await;
        let operator = create_test_user(&pool, None, None, Role::PlatformAdmin).await;
        let teacher = create_test_user(&pool, Some(school.tenant.id), None, Role::Teacher).await;

        let (name, value) = auth_header(&operator);
        app.patch(&format!("/api/v1/tenants/{}", school.tenant.id))
            .add_header(&name, &value)
            .json(&json!({"attendance_edit_window_minutes": 5}))
            .await
            .assert_status_ok();

        let record = mark(&app, &teacher, &school, &today()).await.remove(0);
        let url = format!("/api/v1/attendance/{}", record.id);
        let (name, value) = auth_header(&teacher);

        let status: Value = app.get(&format!("{url}/edit-window")).add_header(&name, &value).await.json();
        assert_eq!(status["window_minutes"], 5);
        assert_eq!(status["reason"], "within_window");

        // Still inside the configured hour, but past the tenant's five minutes
        age_record(&pool, record.id, 10).await;

        let status: Value = app.get(&format!("{url}/edit-window")).add_header(&name, &value).await.json();
        assert_eq!(status["editable"], false);
        assert_eq!(status["reason"], "window_expired");
        assert_eq!(status["window_minutes"], 5);

        let response = app.patch(&url).add_header(&name, &value).json(&json!({"status": "late"})).await;
        response.assert_status_forbidden();
        assert_eq!(response.json::<Value>()["type"], "/problems/edit-window-expired");
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_concurrent_edits_replay_to_stored_record(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "edit-concurrent", 1).await;
        let teacher = create_test_user(&pool, Some(school.tenant.id), None, Role::Teacher).await;
        let admin = create_test_user(&pool, Some(school.tenant.id), None, Role::SchoolAdmin).await;
        let record = mark(&app, &teacher, &school, &today()).await.remove(0);
        let url = format!("/api/v1/attendance/{}", record.id);
        let (tenant_id, record_id, admin_id) = (school.tenant.id, record.id, admin.id);

        // Another editor holds the row while the request comes in, then commits its own change
        let mut other = pool.begin().await.unwrap();
        let locked = Attendance::new(&mut other).get_for_update(record_id).await.unwrap().unwrap();
        let other_edit = async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            let previous = locked.snapshot();
            let next = previous.apply(Some(AttendanceStatus::Absent), None);
            let changed_at = Utc::now();
            Attendance::new(&mut other)
                .apply_edit(
                    record_id,
                    &AttendanceEditDBRequest {
                        next: next.clone(),
                        edited_by: admin_id,
                        edited_at: changed_at,
                    },
                )
                .await
                .unwrap();
            AttendanceAudit::new(&mut other)
                .append(&AuditEntryCreateDBRequest {
                    tenant_id,
                    attendance_id: record_id,
                    action: AuditAction::Updated,
                    changed_by: admin_id,
                    changed_at,
                    changes: previous.changes_to(&next),
                    previous: Some(previous),
                    reason: None,
                    override_applied: true,
                })
                .await
                .unwrap();
            other.commit().await.unwrap();
        };

        let (name, value) = auth_header(&teacher);
        let request = app.patch(&url).add_header(&name, &value).json(&json!({"status": "late"}));
        let (response, ()) = tokio::join!(async { request.await }, other_edit);
        response.assert_status_ok();

        let stored: AttendanceResponse = app.get(&url).add_header(&name, &value).await.json();
        assert_eq!(stored.status, AttendanceStatus::Late);

        let history: Value = app.get(&format!("{url}/history")).add_header(&name, &value).await.json();
        let entries = history["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1]["changed_by"], json!(admin_id));
        assert_eq!(entries[2]["changed_by"], json!(teacher.id));
        assert_eq!(entries[2]["previous"]["status"], "absent");
        assert_eq!(history["current"], json!({"status": "late", "remarks": null}));
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_history_is_branch_scoped(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "history-branch", 1).await;
        let east = create_test_branch(&pool, school.tenant.id, "EAST").await;
        let marker = create_test_user(&pool, Some(school.tenant.id), Some(school.branch.id), Role::Teacher).await;
        let elsewhere = create_test_user(&pool, Some(school.tenant.id), Some(east.id), Role::Teacher).await;
        let admin = create_test_user(&pool, Some(school.tenant.id), None, Role::SchoolAdmin).await;
        let record = mark(&app, &marker, &school, &today()).await.remove(0);
        let url = format!("/api/v1/attendance/{}", record.id);

        let (name, value) = auth_header(&elsewhere);
        for path in ["", "/history"] {
            app.get(&format!("{url}{path}"))
                .add_header(&name, &value)
                .await
                .assert_status_forbidden();
        }

        let (name, value) = auth_header(&marker);
        app.get(&format!("{url}/history")).add_header(&name, &value).await.assert_status_ok();

        // Deleted records keep their branch
        let (name, value) = auth_header(&admin);
        app.delete(&url).add_header(&name, &value).await.assert_status(StatusCode::NO_CONTENT);
        app.get(&format!("{url}/history")).add_header(&name, &value).await.assert_status_ok();

        let (name, value) = auth_header(&elsewhere);
        app.get(&format!("{url}/history"))
            .add_header(&name, &value)
            .await
            .assert_status_forbidden();
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_delete_then_remark(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "delete-remark", 1).await;
        let teacher = create_test_user(&pool, Some(school.tenant.id), None, Role::Teacher).await;
        let admin = create_test_user(&pool, Some(school.tenant.id), None, Role::SchoolAdmin).await;
        let record = mark(&app, &teacher, &school, &today()).await.remove(0);
        let url = format!("/api/v1/attendance/{}", record.id);

        let (name, value) = auth_header(&teacher);
        app.delete(&url).add_header(&name, &value).await.assert_status_forbidden();

        let (name, value) = auth_header(&admin);
        app.delete(&format!("{url}?reason=Marked%20wrong%20section"))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.get(&url).add_header(&name, &value).await.assert_status_not_found();

        let history: Value = app.get(&format!("{url}/history")).add_header(&name, &value).await.json();
        assert_eq!(history["entries"].as_array().unwrap().len(), 2);
        assert_eq!(history["entries"][1]["action"], "deleted");
        assert_eq!(history["entries"][1]["reason"], "Marked wrong section");
        assert_eq!(history["current"], Value::Null);

        // The slot is free again
        mark(&app, &teacher, &school, &today()).await;
    }

    #[sqlx::test]
    #[test_log::test]
    #[cfg_attr(not(feature = "db-tests"), ignore = "requires DATABASE_URL")]
    async fn test_attendance_is_tenant_isolated(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let school = create_test_school(&pool, "iso-attendance", 1).await;
        let other = create_test_school(&pool, "iso-attendance-other", 1).await;
        let teacher = create_test_user(&pool, Some(school.tenant.id), None, Role::Teacher).await;
        let outsider = create_test_user(&pool, Some(other.tenant.id), None, Role::SchoolAdmin).await;
        let record = mark(&app, &teacher, &school, &today()).await.remove(0);

        let (name, value) = auth_header(&outsider);
        for path in ["", "/edit-window", "/history"] {
            app.get(&format!("/api/v1/attendance/{}{path}", record.id))
                .add_header(&name, &value)
                .await
                .assert_status_not_found();
        }
        app.patch(&format!("/api/v1/attendance/{}", record.id))
            .add_header(&name, &value)
            .json(&json!({"status": "absent"}))
            .await
            .assert_status_not_found();

        // Marking into another tenant's section is a 404 too
        app.post("/api/v1/attendance")
            .add_header(&name, &value)
            .json(&json!({
                "section_id": school.section.id,
                "attendance_date": today(),
                "entries": [{"student_id": school.students[0].id, "status": "present"}],
            }))
            .await
            .assert_status_not_found();

        let response = app.get("/api/v1/attendance").add_header(&name, &value).await;
        assert_eq!(response.json::<Value>()["total_count"], 0);
    }
}
