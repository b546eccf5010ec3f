//! Models for the subset of the Tado API this service reads and writes.
//!
//! Notes
//! - Response objects keep every field optional; the API omits fields freely.
//! - Request bodies (`*Input`) skip `None` fields so the API never sees explicit nulls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HomeId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MobileDeviceId(pub i64);

// =====================
// Core enums
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HomePresence {
    Home,
    Away,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Power {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneType {
    AirConditioning,
    Heating,
    HotWater,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayTerminationType {
    Manual,
    TadoMode,
    Timer,
    NextTimeBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Temperature {
    pub celsius: Option<f64>,
    pub fahrenheit: Option<f64>,
}

// =====================
// Account
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HomeBase {
    pub id: Option<HomeId>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub homes: Option<Vec<HomeBase>>,
}

// =====================
// Home presence/state
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HomeState {
    pub presence: Option<HomePresence>,
    pub presence_locked: Option<bool>,
    pub show_home_presence_switch_button: Option<bool>,
}

// =====================
// Mobile devices
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MobileDeviceSettings {
    pub geo_tracking_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MobileDeviceLocation {
    pub stale: Option<bool>,
    pub at_home: Option<bool>,
    pub relative_distance_from_home_fence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MobileDevice {
    pub id: Option<MobileDeviceId>,
    pub name: Option<String>,
    pub settings: Option<MobileDeviceSettings>,
    pub location: Option<MobileDeviceLocation>,
}

impl MobileDevice {
    pub fn geo_tracking_enabled(&self) -> bool {
        self.settings
            .as_ref()
            .and_then(|s| s.geo_tracking_enabled)
            .unwrap_or(false)
    }

    /// A device without a location fix counts as away.
    pub fn at_home(&self) -> bool {
        self.location.as_ref().and_then(|l| l.at_home).unwrap_or(false)
    }
}

// =====================
// Zones
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOpenWindowDetection {
    pub supported: Option<bool>,
    pub enabled: Option<bool>,
    pub timeout_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: Option<ZoneId>,
    pub name: Option<String>,
    pub r#type: Option<ZoneType>,
    pub date_created: Option<DateTime<Utc>>,
    pub open_window_detection: Option<ZoneOpenWindowDetection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSetting {
    pub r#type: Option<ZoneType>,
    pub power: Option<Power>,
    pub temperature: Option<Temperature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOpenWindow {
    pub detected_time: Option<DateTime<Utc>>,
    pub duration_in_seconds: Option<i64>,
    pub expiry: Option<DateTime<Utc>>,
    pub remaining_time_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOverlayTermination {
    pub r#type: Option<OverlayTerminationType>,
    pub type_skill_based_app: Option<OverlayTerminationType>,
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOverlay {
    pub r#type: Option<String>,
    pub setting: Option<ZoneSetting>,
    pub termination: Option<ZoneOverlayTermination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneState {
    pub tado_mode: Option<HomePresence>,
    pub setting: Option<ZoneSetting>,
    pub overlay: Option<ZoneOverlay>,
    /// Set by the API once the window sensor heuristic fires.
    pub open_window_detected: Option<bool>,
    /// Present only while the open-window pause is active.
    pub open_window: Option<ZoneOpenWindow>,
}

impl ZoneOpenWindow {
    /// The API drops `openWindowDetected` once the pause starts, so a pause with
    /// time left still counts as an open window. Unknown remaining time counts as running.
    pub fn is_running(&self) -> bool {
        self.remaining_time_in_seconds.is_none_or(|secs| secs > 0)
    }
}

impl ZoneState {
    /// Window reported open by the sensor heuristic, or an open-window pause still running.
    pub fn open_window_detected(&self) -> bool {
        self.open_window_detected.unwrap_or(false)
            || self.open_window.as_ref().is_some_and(ZoneOpenWindow::is_running)
    }

    pub fn open_window_activated(&self) -> bool {
        self.open_window.is_some()
    }

    /// Target temperature of a heating zone that is switched on.
    pub fn heating_setpoint(&self) -> Option<f64> {
        let setting = self.setting.as_ref()?;
        if setting.r#type != Some(ZoneType::Heating) || setting.power != Some(Power::On) {
            return None;
        }
        setting.temperature.as_ref()?.celsius
    }
}

// =====================
// Write inputs
// =====================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureInput {
    pub celsius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSettingInput {
    pub r#type: ZoneType,
    pub power: Power,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<TemperatureInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayTerminationInput {
    pub type_skill_based_app: OverlayTerminationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOverlayInput {
    pub setting: ZoneSettingInput,
    pub termination: OverlayTerminationInput,
}

impl ZoneOverlayInput {
    /// Manual heating overlay holding `celsius` until changed by hand.
    pub fn manual_heating(celsius: f64) -> Self {
        ZoneOverlayInput {
            setting: ZoneSettingInput {
                r#type: ZoneType::Heating,
                power: Power::On,
                temperature: Some(TemperatureInput { celsius }),
            },
            termination: OverlayTerminationInput {
                type_skill_based_app: OverlayTerminationType::Manual,
                duration_in_seconds: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceLockInput {
    pub home_presence: HomePresence,
}
