//! SMS message texts

use crate::models::{AlertTier, EntryKind, Reading};

/// Text for an alert of `tier` about `reading`, or `None` when nothing is due
pub fn alert_message(reading: &Reading, tier: AlertTier) -> Option<String> {
    let level = reading.level;
    let text = match (reading.kind, tier) {
        (_, AlertTier::None) | (EntryKind::Morning, _) => return None,
        (EntryKind::Container, AlertTier::Urgent) => {
            format!("ALERT: Litter Robot is almost full at {level:.1}%. Please replace ASAP.")
        }
        (EntryKind::Container, AlertTier::Advisory) => {
            format!("Hey, Litter Robot is at {level:.1}%! Please consider emptying soon.")
        }
        (EntryKind::Litter, AlertTier::Urgent) => {
            format!("ALERT: Litter needs refill URGENTLY: current level is {level:.1}%")
        }
        (EntryKind::Litter, AlertTier::Advisory) => {
            format!("Litter needs refill: current level is {level:.1}%")
        }
    };
    Some(text)
}

/// Join alert texts so a cycle sends at most one SMS
pub fn combine(robot_name: &str, parts: &[String]) -> Option<String> {
    match parts {
        [] => None,
        [single] => Some(single.clone()),
        many => Some(format!(
            "Litter Robot update for {robot_name}:\n{}",
            many.join("\n")
        )),
    }
}

/// Warning sent when the SMS balance runs low.
///
/// Sending the warning itself uses one credit, which the count reflects.
pub fn low_quota_message(remaining: i64) -> String {
    format!(
        "Just a heads up, you're running low on text tokens. There are currently {} tokens.",
        remaining - 1
    )
}
