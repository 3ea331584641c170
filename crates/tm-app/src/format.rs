//! Display helpers shared by the list and thread views.

use chrono::{DateTime, Utc};
use tm_core::models::RescueStatus;

/// "Just now", "5m ago", "3h ago", "2d ago". Future timestamps read as "Just now".
pub fn relative_time(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else {
        format!("{}d ago", elapsed.num_days())
    }
}

/// Capitalised status for badges.
pub fn status_label(status: RescueStatus) -> &'static str {
    match status {
        RescueStatus::Pending => "Pending",
        RescueStatus::Accepted => "Accepted",
        RescueStatus::Completed => "Completed",
    }
}

/// "No comments", "1 comment", "4 comments".
pub fn comment_count_label(count: usize) -> String {
    match count {
        0 => "No comments".to_string(),
        1 => "1 comment".to_string(),
        n => format!("{n} comments"),
    }
}
