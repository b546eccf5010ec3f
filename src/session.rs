//! The authenticated session for the one managed home.

use crate::client::{TadoClient, TadoClientError};
use crate::config::Config;
use crate::models::tado::*;
use crate::shutdown::Pause;
use crate::utils::seconds;
use log::{error, info, warn};
use std::time::Duration;

/// Operations the monitor needs from the Tado API, bound to a single home.
pub trait HomeApi {
    fn home_state(&self) -> Result<HomeState, TadoClientError>;
    fn zones(&self) -> Result<Vec<Zone>, TadoClientError>;
    fn zone_state(&self, zone_id: ZoneId) -> Result<ZoneState, TadoClientError>;
    fn mobile_devices(&self) -> Result<Vec<MobileDevice>, TadoClientError>;
    fn set_open_window(&self, zone_id: ZoneId, activated: bool) -> Result<(), TadoClientError>;
    fn set_zone_setpoint(&self, zone_id: ZoneId, celsius: f64) -> Result<(), TadoClientError>;
    fn set_presence(&self, presence: HomePresence) -> Result<(), TadoClientError>;
}

pub struct Session {
    client: TadoClient,
    home_id: HomeId,
}

impl Session {
    pub fn home_id(&self) -> HomeId {
        self.home_id
    }

    /// Log in and resolve the home, retrying transient failures every
    /// `ERROR_RETRY_INTERVAL`. `Ok(None)` means shutdown was requested.
    pub fn establish<P: Pause>(cfg: &Config, pause: &mut P) -> Result<Option<Session>, String> {
        if let Err(e) = std::fs::create_dir_all(&cfg.token_folder) {
            return Err(format!(
                "creating token folder {} failed: {}",
                cfg.token_folder.display(),
                e
            ));
        }
        retry_startup(cfg.error_retry_interval, pause, |pause| Self::try_establish(cfg, pause))
    }

    fn try_establish<P: Pause>(cfg: &Config, pause: &mut P) -> Result<Option<Session>, TadoClientError> {
        let Some(client) = TadoClient::connect(&cfg.token_file(), cfg.http_timeout, pause)? else {
            return Ok(None);
        };
        let me = client.get_me()?;
        let home_id = select_home(&me, cfg.home_id)?;
        info!("Managing home {}", home_id.0);
        Ok(Some(Session { client, home_id }))
    }
}

/// Run `attempt` until it succeeds, fails for good, or shutdown is requested.
///
/// Transient failures are logged and retried after `retry_interval`; anything
/// else ends startup with an error. `Ok(None)` means shutdown was requested,
/// either by `attempt` itself or during a retry pause.
pub fn retry_startup<T, P, F>(retry_interval: Duration, pause: &mut P, mut attempt: F) -> Result<Option<T>, String>
where
    P: Pause,
    F: FnMut(&mut P) -> Result<Option<T>, TadoClientError>,
{
    loop {
        match attempt(pause) {
            Ok(done) => return Ok(done),
            Err(e) if e.is_transient() => {
                error!(
                    "Login error: {}. Retrying in {} seconds...",
                    e,
                    seconds(retry_interval)
                );
                if pause.pause(retry_interval).is_stop() {
                    return Ok(None);
                }
            }
            Err(e) => return Err(format!("Tado login failed: {}", e)),
        }
    }
}

/// Pick the configured home, or the account's first one.
pub fn select_home(me: &User, pinned: Option<HomeId>) -> Result<HomeId, TadoClientError> {
    let homes = me
        .homes
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(|h| h.id)
        .collect::<Vec<_>>();

    match pinned {
        Some(id) if homes.contains(&id) => Ok(id),
        Some(id) => Err(TadoClientError::Account(format!(
            "home {} is not accessible with this account",
            id.0
        ))),
        None => {
            let first = *homes
                .first()
                .ok_or_else(|| TadoClientError::Account("no homes found; ensure the account has a home".into()))?;
            if homes.len() > 1 {
                warn!(
                    "Account has {} homes; managing {} (set TADO_HOME_ID to choose another)",
                    homes.len(),
                    first.0
                );
            }
            Ok(first)
        }
    }
}

impl HomeApi for Session {
    fn home_state(&self) -> Result<HomeState, TadoClientError> {
        self.client.get_home_state(self.home_id)
    }

    fn zones(&self) -> Result<Vec<Zone>, TadoClientError> {
        self.client.get_zones(self.home_id)
    }

    fn zone_state(&self, zone_id: ZoneId) -> Result<ZoneState, TadoClientError> {
        self.client.get_zone_state(self.home_id, zone_id)
    }

    fn mobile_devices(&self) -> Result<Vec<MobileDevice>, TadoClientError> {
        self.client.get_mobile_devices(self.home_id)
    }

    fn set_open_window(&self, zone_id: ZoneId, activated: bool) -> Result<(), TadoClientError> {
        if activated {
            self.client.activate_open_window(self.home_id, zone_id)
        } else {
            self.client.deactivate_open_window(self.home_id, zone_id)
        }
    }

    fn set_zone_setpoint(&self, zone_id: ZoneId, celsius: f64) -> Result<(), TadoClientError> {
        self.client
            .set_zone_overlay(self.home_id, zone_id, &ZoneOverlayInput::manual_heating(celsius))
    }

    fn set_presence(&self, presence: HomePresence) -> Result<(), TadoClientError> {
        self.client.set_presence_lock(self.home_id, presence)
    }
}
