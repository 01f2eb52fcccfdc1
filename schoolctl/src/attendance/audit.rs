//! Field-level change sets and history reconstruction for attendance records.
//!
//! Every mutation of an attendance record appends an audit entry holding the list of fields that
//! changed (old and new values, as JSON) and, for updates and deletes, a snapshot of the record as
//! it was before. Creation entries carry every field with `old = null`, so replaying the entries in
//! order reproduces the current state of the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::api::models::attendance::{AttendanceStatus, AuditAction};
use crate::types::UserId;

pub const FIELD_STATUS: &str = "status";
pub const FIELD_REMARKS: &str = "remarks";

/// The mutable fields of an attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceSnapshot {
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

/// One field's transition inside an audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

impl AttendanceSnapshot {
    /// Apply an edit. `None` leaves a field alone; blank remarks clear them.
    pub fn apply(&self, status: Option<AttendanceStatus>, remarks: Option<&str>) -> Self {
        let remarks = match remarks {
            Some(r) if r.trim().is_empty() => None,
            Some(r) => Some(r.trim().to_string()),
            None => self.remarks.clone(),
        };
        Self {
            status: status.unwrap_or(self.status),
            remarks,
        }
    }

    fn fields(&self) -> [(&'static str, Value); 2] {
        [
            (FIELD_STATUS, serde_json::to_value(self.status).unwrap_or(Value::Null)),
            (
                FIELD_REMARKS,
                self.remarks.as_ref().map(|r| Value::String(r.clone())).unwrap_or(Value::Null),
            ),
        ]
    }

    /// Fields that differ between `self` and `next`, in a stable order.
    pub fn changes_to(&self, next: &Self) -> Vec<FieldChange> {
        self.fields()
            .into_iter()
            .zip(next.fields())
            .filter(|((_, old), (_, new))| old != new)
            .map(|((field, old), (_, new))| FieldChange {
                field: field.to_string(),
                old,
                new,
            })
            .collect()
    }

    /// Change set recorded when the record is first marked.
    pub fn creation_changes(&self) -> Vec<FieldChange> {
        self.fields()
            .into_iter()
            .map(|(field, new)| FieldChange {
                field: field.to_string(),
                old: Value::Null,
                new,
            })
            .collect()
    }

    /// Change set recorded when the record is soft deleted.
    pub fn deletion_changes(&self) -> Vec<FieldChange> {
        self.fields()
            .into_iter()
            .map(|(field, old)| FieldChange {
                field: field.to_string(),
                old,
                new: Value::Null,
            })
            .collect()
    }
}

/// The parts of an audit entry needed to replay history.
#[derive(Debug, Clone)]
pub struct TrailEntry {
    pub action: AuditAction,
    pub changed_at: DateTime<Utc>,
    pub changed_by: UserId,
    pub changes: Vec<FieldChange>,
}

/// A value a field held from `set_at` until the next entry for that field.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldValueAt {
    pub value: Value,
    pub set_at: DateTime<Utc>,
    #[schema(value_type = String, format = "uuid")]
    pub set_by: UserId,
    pub action: AuditAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldTimeline {
    pub field: String,
    pub values: Vec<FieldValueAt>,
}

/// Replay entries (oldest first) into the record state they describe.
///
/// Returns `None` if the trail is empty, does not start with a creation, or ends in a deletion.
pub fn replay(entries: &[TrailEntry]) -> Option<AttendanceSnapshot> {
    let mut state: Option<Map<String, Value>> = None;

    for entry in entries {
        match entry.action {
            AuditAction::Created => {
                let mut fields = Map::new();
                for change in &entry.changes {
                    fields.insert(change.field.clone(), change.new.clone());
                }
                state = Some(fields);
            }
            AuditAction::Updated => {
                let fields = state.as_mut()?;
                for change in &entry.changes {
                    fields.insert(change.field.clone(), change.new.clone());
                }
            }
            AuditAction::Deleted => state = None,
        }
    }

    state.and_then(|fields| serde_json::from_value(Value::Object(fields)).ok())
}

/// Per-field history, fields ordered by first appearance and values oldest first.
pub fn field_timelines(entries: &[TrailEntry]) -> Vec<FieldTimeline> {
    let mut timelines: Vec<FieldTimeline> = Vec::new();

    for entry in entries {
        for change in &entry.changes {
            let value = FieldValueAt {
                value: change.new.clone(),
                set_at: entry.changed_at,
                set_by: entry.changed_by,
                action: entry.action,
            };
            match timelines.iter_mut().find(|t| t.field == change.field) {
                Some(timeline) => timeline.values.push(value),
                None => timelines.push(FieldTimeline {
                    field: change.field.clone(),
                    values: vec![value],
                }),
            }
        }
    }

    timelines
}
