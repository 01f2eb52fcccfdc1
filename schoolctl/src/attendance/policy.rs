//! Edit-window policy and marking date rules.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::AttendanceError;
use crate::types::UserId;

/// Smallest and largest per-tenant edit window override, in minutes (1 minute to 7 days).
pub const MIN_EDIT_WINDOW_MINUTES: i32 = 1;
pub const MAX_EDIT_WINDOW_MINUTES: i32 = 7 * 24 * 60;

/// The user attempting an edit.
#[derive(Debug, Clone, Copy)]
pub struct Editor {
    pub user_id: UserId,
    pub is_admin: bool,
}

/// Why an edit was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditGrant {
    /// Original marker (or an admin who is the marker) editing inside the window
    WithinWindow,
    /// Admin editing someone else's record, or any record after the window closed
    AdminOverride,
}

impl EditGrant {
    pub fn is_override(self) -> bool {
        matches!(self, EditGrant::AdminOverride)
    }
}

/// Reason reported by the edit-window status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EditWindowReason {
    WithinWindow,
    AdminOverride,
    WindowExpired,
    NotOriginalMarker,
}

/// Edit window anchored at the time a record was marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditWindow {
    pub marked_at: DateTime<Utc>,
    pub length: Duration,
}

impl EditWindow {
    pub fn new(marked_at: DateTime<Utc>, length: Duration) -> Self {
        Self { marked_at, length }
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.marked_at + self.length
    }

    /// The window is half-open: an edit at exactly `ends_at` is too late.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.ends_at()
    }

    /// Decide whether `editor` may change a record marked by `marked_by`.
    pub fn authorize(&self, marked_by: UserId, editor: Editor, now: DateTime<Utc>) -> Result<EditGrant, AttendanceError> {
        let is_marker = editor.user_id == marked_by;
        let open = self.is_open(now);

        if editor.is_admin {
            return Ok(if is_marker && open {
                EditGrant::WithinWindow
            } else {
                EditGrant::AdminOverride
            });
        }
        if !is_marker {
            return Err(AttendanceError::NotOriginalMarker);
        }
        if open {
            Ok(EditGrant::WithinWindow)
        } else {
            Err(AttendanceError::EditWindowExpired {
                window_ended_at: self.ends_at(),
            })
        }
    }

    /// Same decision as [`EditWindow::authorize`], flattened for reporting.
    pub fn reason(&self, marked_by: UserId, editor: Editor, now: DateTime<Utc>) -> EditWindowReason {
        match self.authorize(marked_by, editor, now) {
            Ok(EditGrant::WithinWindow) => EditWindowReason::WithinWindow,
            Ok(EditGrant::AdminOverride) => EditWindowReason::AdminOverride,
            Err(AttendanceError::NotOriginalMarker) => EditWindowReason::NotOriginalMarker,
            Err(_) => EditWindowReason::WindowExpired,
        }
    }
}

/// Resolve the window length for a tenant: its own override when set, else the configured default.
pub fn effective_window(default: std::time::Duration, tenant_override_minutes: Option<i32>) -> Duration {
    match tenant_override_minutes {
        Some(minutes) => Duration::minutes(i64::from(minutes.clamp(MIN_EDIT_WINDOW_MINUTES, MAX_EDIT_WINDOW_MINUTES))),
        None => Duration::from_std(default).unwrap_or_else(|_| Duration::minutes(i64::from(MAX_EDIT_WINDOW_MINUTES))),
    }
}

/// Check the date a batch of attendance is being marked for.
///
/// Future dates are always rejected. Dates older than `max_backdate_days` may only be marked by
/// admins.
pub fn validate_marking_date(date: NaiveDate, today: NaiveDate, max_backdate_days: u32, is_admin: bool) -> Result<(), AttendanceError> {
    if date > today {
        return Err(AttendanceError::FutureDate { date });
    }
    let age = (today - date).num_days();
    if !is_admin && age > i64::from(max_backdate_days) {
        return Err(AttendanceError::BeyondBackdateLimit {
            date,
            max_days: max_backdate_days,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn marked_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
    }

    fn window() -> EditWindow {
        EditWindow::new(marked_at(), Duration::minutes(30))
    }

    #[test]
    fn test_marker_can_edit_inside_window() {
        let marker = Uuid::new_v4();
        let editor = Editor {
            user_id: marker,
            is_admin: false,
        };
        let grant = window().authorize(marker, editor, marked_at() + Duration::minutes(29)).unwrap();
        assert_eq!(grant, EditGrant::WithinWindow);
    }

    #[test]
    fn test_window_closes_after_configured_minutes() {
        let marker = Uuid::new_v4();
        let editor = Editor {
            user_id: marker,
            is_admin: false,
        };

        // Exactly at the end of the window is already too late
        let err = window().authorize(marker, editor, marked_at() + Duration::minutes(30)).unwrap_err();
        assert_eq!(
            err,
            AttendanceError::EditWindowExpired {
                window_ended_at: marked_at() + Duration::minutes(30)
            }
        );

        let just_before = marked_at() + Duration::minutes(30) - Duration::seconds(1);
        assert!(window().authorize(marker, editor, just_before).is_ok());
    }

    #[test]
    fn test_other_teacher_cannot_edit_even_inside_window() {
        let marker = Uuid::new_v4();
        let editor = Editor {
            user_id: Uuid::new_v4(),
            is_admin: false,
        };
        let err = window().authorize(marker, editor, marked_at()).unwrap_err();
        assert_eq!(err, AttendanceError::NotOriginalMarker);
    }

    #[test]
    fn test_admin_can_always_edit() {
        let marker = Uuid::new_v4();
        let admin = Editor {
            user_id: Uuid::new_v4(),
            is_admin: true,
        };
        let much_later = marked_at() + Duration::days(90);
        assert_eq!(window().authorize(marker, admin, much_later).unwrap(), EditGrant::AdminOverride);
        assert_eq!(window().authorize(marker, admin, marked_at()).unwrap(), EditGrant::AdminOverride);
    }

    #[test]
    fn test_admin_marker_inside_window_is_not_an_override() {
        let admin_id = Uuid::new_v4();
        let admin = Editor {
            user_id: admin_id,
            is_admin: true,
        };
        let grant = window().authorize(admin_id, admin, marked_at() + Duration::minutes(5)).unwrap();
        assert!(!grant.is_override());

        let grant = window().authorize(admin_id, admin, marked_at() + Duration::hours(5)).unwrap();
        assert!(grant.is_override());
    }

    #[test]
    fn test_reason_reporting() {
        let marker = Uuid::new_v4();
        let teacher = Editor {
            user_id: marker,
            is_admin: false,
        };
        let stranger = Editor {
            user_id: Uuid::new_v4(),
            is_admin: false,
        };
        let late = marked_at() + Duration::hours(1);

        assert_eq!(window().reason(marker, teacher, marked_at()), EditWindowReason::WithinWindow);
        assert_eq!(window().reason(marker, teacher, late), EditWindowReason::WindowExpired);
        assert_eq!(window().reason(marker, stranger, marked_at()), EditWindowReason::NotOriginalMarker);
    }

    #[test]
    fn test_effective_window_prefers_tenant_override() {
        let default = std::time::Duration::from_secs(60 * 60);
        assert_eq!(effective_window(default, None), Duration::minutes(60));
        assert_eq!(effective_window(default, Some(15)), Duration::minutes(15));
        // Out of range overrides are clamped
        assert_eq!(effective_window(default, Some(0)), Duration::minutes(1));
        assert_eq!(effective_window(default, Some(100_000)), Duration::minutes(i64::from(MAX_EDIT_WINDOW_MINUTES)));
    }

    #[test]
    fn test_marking_date_rules() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        assert!(validate_marking_date(today, today, 7, false).is_ok());
        assert!(validate_marking_date(today - Duration::days(7), today, 7, false).is_ok());

        let tomorrow = today + Duration::days(1);
        assert_eq!(
            validate_marking_date(tomorrow, today, 7, true),
            Err(AttendanceError::FutureDate { date: tomorrow })
        );

        let old = today - Duration::days(8);
        assert_eq!(
            validate_marking_date(old, today, 7, false),
            Err(AttendanceError::BeyondBackdateLimit { date: old, max_days: 7 })
        );
        assert!(validate_marking_date(old, today, 7, true).is_ok());
    }
}
