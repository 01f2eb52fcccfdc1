//! Attendance reports: the daily register of a section and attendance summaries over a date range.

use std::collections::HashMap;

use crate::{
    AppState,
    api::{
        handlers::scope::{section_for, student_for},
        models::reports::{
            RegisterEntry, SectionRegisterQuery, SectionRegisterResponse, SectionSummaryResponse, StudentAttendanceSummary,
            SummaryRangeQuery,
        },
    },
    attendance::summary::{StatusCounts, validate_range},
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Reports, Students},
        models::{reports::StatusCountRow, students::StudentDBResponse},
    },
    errors::{Error, Result},
    types::{Operation, SectionId, StudentId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::NaiveDate;

fn summarize(student: StudentDBResponse, from: NaiveDate, to: NaiveDate, counts: StatusCounts) -> StudentAttendanceSummary {
    StudentAttendanceSummary {
        student_id: student.id,
        admission_number: student.admission_number,
        first_name: student.first_name,
        last_name: student.last_name,
        from,
        to,
        total_marked: counts.total(),
        attendance_percentage: counts.attendance_percentage(),
        counts,
    }
}

/// Fold per-status rows into one tally per student.
fn counts_by_student(rows: Vec<StatusCountRow>) -> HashMap<StudentId, StatusCounts> {
    let mut by_student: HashMap<StudentId, StatusCounts> = HashMap::new();
    for row in rows {
        by_student.entry(row.student_id).or_default().add(row.status, row.count);
    }
    by_student
}

#[utoipa::path(
    get,
    path = "/sections/{id}/attendance",
    tag = "reports",
    summary = "Daily register",
    description = "Every active student of the section with their record for the date and period, \
                   if one exists. Unmarked students have null attendance fields.",
    params(
        ("id" = String, Path, description = "Section ID"),
        SectionRegisterQuery,
    ),
    responses(
        (status = 200, description = "The register", body = SectionRegisterResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Section not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn section_register(
    State(state): State<AppState>,
    Path(id): Path<SectionId>,
    Query(query): Query<SectionRegisterQuery>,
    current_user: RequiresPermission<resource::Reports, operation::ReadAll>,
) -> Result<Json<SectionRegisterResponse>> {
    let tenant_id = current_user.require_tenant()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let section = section_for(&mut conn, &current_user, tenant_id, id, Operation::ReadAll).await?;

    let rows = Reports::new(&mut conn)
        .section_register(section.id, query.date, query.period_slot_id)
        .await?;
    let entries: Vec<RegisterEntry> = rows.into_iter().map(RegisterEntry::from).collect();
    let totals: StatusCounts = entries.iter().filter_map(|e| e.status).map(|s| (s, 1)).collect();
    let unmarked = entries.iter().filter(|e| e.status.is_none()).count() as i64;

    Ok(Json(SectionRegisterResponse {
        section_id: section.id,
        date: query.date,
        period_slot_id: query.period_slot_id,
        entries,
        totals,
        unmarked,
    }))
}

#[utoipa::path(
    get,
    path = "/sections/{id}/attendance/summary",
    tag = "reports",
    summary = "Section attendance summary",
    description = "Per-student tallies for the section's active roster over an inclusive date range. \
                   Only records taken in this section are counted.",
    params(
        ("id" = String, Path, description = "Section ID"),
        SummaryRangeQuery,
    ),
    responses(
        (status = 200, description = "The summary", body = SectionSummaryResponse),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Section not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn section_summary(
    State(state): State<AppState>,
    Path(id): Path<SectionId>,
    Query(range): Query<SummaryRangeQuery>,
    current_user: RequiresPermission<resource::Reports, operation::ReadAll>,
) -> Result<Json<SectionSummaryResponse>> {
    let tenant_id = current_user.require_tenant()?;
    validate_range(range.from, range.to)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let section = section_for(&mut conn, &current_user, tenant_id, id, Operation::ReadAll).await?;

    let roster = Students::new(&mut conn).active_roster(section.id).await?;
    let ids: Vec<StudentId> = roster.iter().map(|s| s.id).collect();
    let rows = Reports::new(&mut conn)
        .status_counts(tenant_id, &ids, range.from, range.to, Some(section.id))
        .await?;
    let mut by_student = counts_by_student(rows);

    let students = roster
        .into_iter()
        .map(|student| {
            let counts = by_student.remove(&student.id).unwrap_or_default();
            summarize(student, range.from, range.to, counts)
        })
        .collect();

    Ok(Json(SectionSummaryResponse {
        section_id: section.id,
        from: range.from,
        to: range.to,
        students,
    }))
}

#[utoipa::path(
    get,
    path = "/students/{id}/attendance/summary",
    tag = "reports",
    summary = "Student attendance summary",
    description = "Tallies over an inclusive date range across every section the student attended. \
                   Excused records are left out of the percentage.",
    params(
        ("id" = String, Path, description = "Student ID"),
        SummaryRangeQuery,
    ),
    responses(
        (status = 200, description = "The summary", body = StudentAttendanceSummary),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Student not found in this tenant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn student_summary(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
    Query(range): Query<SummaryRangeQuery>,
    current_user: RequiresPermission<resource::Reports, operation::ReadAll>,
) -> Result<Json<StudentAttendanceSummary>> {
    let tenant_id = current_user.require_tenant()?;
    validate_range(range.from, range.to)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let student = student_for(&mut conn, &current_user, tenant_id, id, Operation::ReadAll).await?;

    let rows = Reports::new(&mut conn)
        .status_counts(tenant_id, &[student.id], range.from, range.to, None)
        .await?;
    let counts: StatusCounts = rows.into_iter().map(|r| (r.status, r.count)).collect();

    Ok(Json(summarize(student, range.from, range.to, counts)))
}
