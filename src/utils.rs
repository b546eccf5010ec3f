use crate::models::tado::HomePresence;
use std::time::Duration;

/// Wire name of a presence value, as the API and the logs spell it.
pub fn presence_name(presence: HomePresence) -> &'static str {
    match presence {
        HomePresence::Home => "HOME",
        HomePresence::Away => "AWAY",
    }
}

/// Seconds without a trailing `.0` for whole values (`30`, `2.5`).
pub fn seconds(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", d.as_secs())
    } else {
        format!("{}", secs)
    }
}
