use crate::config::Config;
use crate::models::tado::{HomePresence, ZoneId};
use crate::services::policy::{self, DevicePresence, TemperatureLimits, WindowAction};
use crate::session::HomeApi;
use crate::shutdown::Pause;
use crate::utils::{presence_name, seconds};
use log::{debug, error, info};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub checking_interval: Duration,
    pub error_retry_interval: Duration,
    pub temperature_limits: TemperatureLimits,
    pub enable_temp_limit: bool,
    pub enable_presence_sync: bool,
}

impl From<&Config> for MonitorSettings {
    fn from(cfg: &Config) -> Self {
        MonitorSettings {
            checking_interval: cfg.checking_interval,
            error_retry_interval: cfg.error_retry_interval,
            temperature_limits: cfg.temperature_limits,
            enable_temp_limit: cfg.enable_temp_limit,
            enable_presence_sync: cfg.enable_presence_sync,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSnapshot {
    pub id: ZoneId,
    pub name: String,
    /// Only heating zones that are switched on carry a setpoint.
    pub setpoint: Option<f64>,
    pub open_window_detected: bool,
    pub open_window_activated: bool,
}

/// Everything one cycle decides on, fetched before any write.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub presence: Option<HomePresence>,
    pub zones: Vec<ZoneSnapshot>,
    /// `None` when presence sync is disabled.
    pub devices: Option<Vec<DevicePresence>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub windows_activated: usize,
    pub windows_deactivated: usize,
    pub setpoints_clamped: usize,
    pub presence_changed: Option<HomePresence>,
}

pub fn fetch_snapshot<A: HomeApi + ?Sized>(api: &A, include_devices: bool) -> Result<Snapshot, String> {
    let presence = api
        .home_state()
        .map_err(|e| format!("get_home_state failed: {}", e))?
        .presence;

    let mut zones = Vec::new();
    for zone in api.zones().map_err(|e| format!("get_zones failed: {}", e))? {
        let Some(zone_id) = zone.id else {
            debug!("Skipping zone without id ({:?})", zone.name);
            continue;
        };
        let state = api
            .zone_state(zone_id)
            .map_err(|e| format!("get_zone_state({}) failed: {}", zone_id.0, e))?;
        zones.push(ZoneSnapshot {
            id: zone_id,
            name: zone.name.unwrap_or_else(|| format!("zone {}", zone_id.0)),
            setpoint: state.heating_setpoint(),
            open_window_detected: state.open_window_detected(),
            open_window_activated: state.open_window_activated(),
        });
    }

    let devices = if include_devices {
        let devices = api
            .mobile_devices()
            .map_err(|e| format!("get_mobile_devices failed: {}", e))?
            .into_iter()
            .map(|d| DevicePresence {
                geo_tracking: d.geo_tracking_enabled(),
                at_home: d.at_home(),
                name: d
                    .name
                    .or_else(|| d.id.map(|id| format!("device {}", id.0)))
                    .unwrap_or_else(|| "unnamed device".to_string()),
            })
            .collect();
        Some(devices)
    } else {
        None
    };

    Ok(Snapshot {
        presence,
        zones,
        devices,
    })
}

fn apply_window_policy<A: HomeApi + ?Sized>(
    api: &A,
    zones: &[ZoneSnapshot],
    report: &mut CycleReport,
) -> Result<(), String> {
    for zone in zones {
        match policy::window_action(zone.open_window_detected, zone.open_window_activated) {
            Some(WindowAction::Activate) => {
                info!("{}: Open window detected. Activating OpenWindow mode.", zone.name);
                api.set_open_window(zone.id, true)
                    .map_err(|e| format!("activating open window in {} failed: {}", zone.name, e))?;
                report.windows_activated += 1;
            }
            Some(WindowAction::Deactivate) => {
                info!("{}: Window closed. Deactivating OpenWindow mode.", zone.name);
                api.set_open_window(zone.id, false)
                    .map_err(|e| format!("deactivating open window in {} failed: {}", zone.name, e))?;
                report.windows_deactivated += 1;
            }
            None => {}
        }
    }
    Ok(())
}

fn apply_temperature_policy<A: HomeApi + ?Sized>(
    api: &A,
    zones: &[ZoneSnapshot],
    limits: &TemperatureLimits,
    report: &mut CycleReport,
) -> Result<(), String> {
    for zone in zones {
        let Some(current) = zone.setpoint else { continue };
        let Some(target) = limits.clamp(current) else { continue };
        api.set_zone_setpoint(zone.id, target)
            .map_err(|e| format!("setting {} to {}°C failed: {}", zone.name, target, e))?;
        if target < current {
            info!("{}: Temp {}°C > max {}°C. Lowering.", zone.name, current, target);
        } else {
            info!("{}: Temp {}°C < min {}°C. Raising.", zone.name, current, target);
        }
        report.setpoints_clamped += 1;
    }
    Ok(())
}

fn apply_presence_policy<A: HomeApi + ?Sized>(
    api: &A,
    current: Option<HomePresence>,
    devices: &[DevicePresence],
    report: &mut CycleReport,
) -> Result<(), String> {
    let Some(target) = policy::presence_change(current, devices) else {
        return Ok(());
    };
    api.set_presence(target)
        .map_err(|e| format!("set_presence({}) failed: {}", presence_name(target), e))?;
    match target {
        HomePresence::Home => {
            let at_home = devices
                .iter()
                .filter(|d| d.geo_tracking && d.at_home)
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            info!(
                "Devices at home: {}. Switched {} -> {}.",
                at_home,
                current.map(presence_name).unwrap_or("UNKNOWN"),
                presence_name(target)
            );
        }
        HomePresence::Away => info!(
            "No devices at home. Switched {} -> {}.",
            current.map(presence_name).unwrap_or("UNKNOWN"),
            presence_name(target)
        ),
    }
    report.presence_changed = Some(target);
    Ok(())
}

/// One fetch + decide + write pass. The first failing call aborts the rest of the cycle.
pub fn run_cycle<A: HomeApi + ?Sized>(api: &A, settings: &MonitorSettings) -> Result<CycleReport, String> {
    let snapshot = fetch_snapshot(api, settings.enable_presence_sync)?;
    let mut report = CycleReport::default();

    apply_window_policy(api, &snapshot.zones, &mut report)?;
    if settings.enable_temp_limit {
        apply_temperature_policy(api, &snapshot.zones, &settings.temperature_limits, &mut report)?;
    }
    if let Some(devices) = snapshot.devices.as_deref() {
        apply_presence_policy(api, snapshot.presence, devices, &mut report)?;
    }
    Ok(report)
}

/// Run cycles until `pause` reports a shutdown request.
pub fn run_loop<A: HomeApi + ?Sized, P: Pause>(api: &A, settings: &MonitorSettings, pause: &mut P) {
    info!("Monitoring zones for window status and temperature limits...");
    loop {
        let wait = match run_cycle(api, settings) {
            Ok(report) => {
                debug!("Cycle complete: {:?}", report);
                settings.checking_interval
            }
            Err(e) => {
                error!(
                    "Monitoring error: {}. Retrying in {} seconds...",
                    e,
                    seconds(settings.error_retry_interval)
                );
                settings.error_retry_interval
            }
        };
        if pause.pause(wait).is_stop() {
            info!("Monitoring interrupted by user.");
            return;
        }
    }
}
