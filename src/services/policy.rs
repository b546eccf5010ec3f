//! Per-cycle decisions. Everything here is a pure function of freshly fetched
//! state, so running a decision twice on unchanged state yields no new action.

use crate::models::tado::HomePresence;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WindowAction {
    Activate,
    Deactivate,
}

/// Open-window pause transition for one zone.
pub fn window_action(detected: bool, activated: bool) -> Option<WindowAction> {
    match (detected, activated) {
        (true, false) => Some(WindowAction::Activate),
        (false, true) => Some(WindowAction::Deactivate),
        _ => None,
    }
}

/// Inclusive setpoint bounds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TemperatureLimits {
    min: f64,
    max: f64,
}

impl TemperatureLimits {
    pub fn new(min: f64, max: f64) -> Result<Self, String> {
        if !min.is_finite() || !max.is_finite() {
            return Err(format!("MIN_TEMP ({min}) and MAX_TEMP ({max}) must be finite"));
        }
        if min > max {
            return Err(format!("MIN_TEMP ({min}) must not exceed MAX_TEMP ({max})"));
        }
        Ok(TemperatureLimits { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// New setpoint to write, or `None` when `setpoint` is already within bounds.
    pub fn clamp(&self, setpoint: f64) -> Option<f64> {
        if setpoint > self.max {
            Some(self.max)
        } else if setpoint < self.min {
            Some(self.min)
        } else {
            None
        }
    }
}

/// Presence-relevant view of a mobile device.
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePresence {
    pub name: String,
    pub geo_tracking: bool,
    pub at_home: bool,
}

/// HOME if any geo-tracked device is at home, AWAY otherwise.
/// `None` when no device has geo-tracking enabled.
pub fn derive_presence(devices: &[DevicePresence]) -> Option<HomePresence> {
    let mut tracked = devices.iter().filter(|d| d.geo_tracking).peekable();
    tracked.peek()?;
    if tracked.any(|d| d.at_home) {
        Some(HomePresence::Home)
    } else {
        Some(HomePresence::Away)
    }
}

/// Presence to write, if the derived value differs from the reported one.
pub fn presence_change(current: Option<HomePresence>, devices: &[DevicePresence]) -> Option<HomePresence> {
    derive_presence(devices).filter(|derived| current != Some(*derived))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(geo_tracking: bool, at_home: bool) -> DevicePresence {
        DevicePresence {
            name: format!("dev-{geo_tracking}-{at_home}"),
            geo_tracking,
            at_home,
        }
    }

    #[test]
    fn window_transitions() {
        assert_eq!(window_action(true, false), Some(WindowAction::Activate));
        assert_eq!(window_action(false, true), Some(WindowAction::Deactivate));
        assert_eq!(window_action(true, true), None);
        assert_eq!(window_action(false, false), None);
    }

    #[test]
    fn clamp_against_default_bounds() {
        let limits = TemperatureLimits::new(5.0, 20.0).unwrap();
        assert_eq!(limits.clamp(4.5), Some(5.0));
        assert_eq!(limits.clamp(-3.0), Some(5.0));
        assert_eq!(limits.clamp(20.5), Some(20.0));
        assert_eq!(limits.clamp(25.0), Some(20.0));
        for s in [5.0, 12.3, 19.9, 20.0] {
            assert_eq!(limits.clamp(s), None, "{s}");
        }
    }

    #[test]
    fn limits_reject_inverted_bounds() {
        assert!(TemperatureLimits::new(21.0, 20.0).is_err());
        assert!(TemperatureLimits::new(f64::NAN, 20.0).is_err());
        assert!(TemperatureLimits::new(18.0, 18.0).is_ok());
    }

    #[test]
    fn single_tracked_device_at_home() {
        let devices = [device(true, true)];
        assert_eq!(derive_presence(&devices), Some(HomePresence::Home));
        assert_eq!(presence_change(Some(HomePresence::Away), &devices), Some(HomePresence::Home));
        assert_eq!(presence_change(Some(HomePresence::Home), &devices), None);
    }

    #[test]
    fn untracked_devices_are_ignored() {
        let devices = [device(true, false), device(false, true)];
        assert_eq!(derive_presence(&devices), Some(HomePresence::Away));
        assert_eq!(presence_change(Some(HomePresence::Away), &devices), None);
        assert_eq!(presence_change(Some(HomePresence::Home), &devices), Some(HomePresence::Away));
    }

    #[test]
    fn no_tracked_devices_never_forces_presence() {
        for current in [Some(HomePresence::Home), Some(HomePresence::Away), None] {
            assert_eq!(presence_change(current, &[]), None);
            assert_eq!(presence_change(current, &[device(false, true)]), None);
        }
    }

    #[test]
    fn unknown_current_presence_is_written() {
        assert_eq!(presence_change(None, &[device(true, false)]), Some(HomePresence::Away));
    }
}
