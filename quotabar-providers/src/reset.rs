//! Human-readable reset countdowns.

use chrono::{DateTime, Utc};

/// Formats the time until `resets_at` (Unix seconds).
///
/// `"Resets in 3d 4h"`, `"Resets in 2h 5m"`, `"Resets in 12m"` or
/// `"Resets now"` once the instant has passed.
pub fn describe_reset(resets_at: i64, now: DateTime<Utc>) -> String {
    let remaining = resets_at - now.timestamp();
    if remaining <= 0 {
        return "Resets now".to_string();
    }

    let days = remaining / 86_400;
    let hours = (remaining % 86_400) / 3_600;
    let minutes = (remaining % 3_600) / 60;

    if days > 0 {
        format!("Resets in {days}d {hours}h")
    } else if hours > 0 {
        format!("Resets in {hours}h {minutes}m")
    } else {
        format!("Resets in {}m", minutes.max(1))
    }
}
