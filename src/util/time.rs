use chrono::{DateTime, Utc};

/// Format a timestamp relative to now ("5m ago", "3d ago").
pub fn relative_time(dt: &DateTime<Utc>) -> String {
    relative_time_from(dt, Utc::now())
}

/// Same as [`relative_time`] against an explicit reference instant.
pub fn relative_time_from(dt: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(dt).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }

    let days = hours / 24;
    match days {
        0..30 => format!("{days}d ago"),
        30..365 => format!("{}mo ago", days / 30),
        _ => format!("{}y ago", days / 365),
    }
}
