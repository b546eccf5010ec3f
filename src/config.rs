//! Runtime configuration, read once from the environment at startup.
//! Every variable is optional; defaults match a plain `docker run` without any `-e` flags.

use crate::models::tado::HomeId;
use crate::services::policy::TemperatureLimits;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CHECKING_INTERVAL_SECS: f64 = 10.0;
pub const DEFAULT_ERROR_RETRY_INTERVAL_SECS: f64 = 30.0;
pub const DEFAULT_HTTP_TIMEOUT_SECS: f64 = 30.0;
pub const DEFAULT_MIN_TEMP: f64 = 5.0;
pub const DEFAULT_MAX_TEMP: f64 = 20.0;
pub const DEFAULT_LOG_FILE: &str = "logfile.log";
pub const DEFAULT_MAX_LOG_LINES: usize = 50;
pub const DEFAULT_TOKEN_FOLDER: &str = "./token";

#[derive(Debug, Clone)]
pub struct Config {
    /// Pause between two successful cycles.
    pub checking_interval: Duration,
    /// Pause after a failed cycle (and between startup login attempts).
    pub error_retry_interval: Duration,
    /// Setpoint bounds; `min <= max` is guaranteed.
    pub temperature_limits: TemperatureLimits,
    pub enable_temp_limit: bool,
    pub enable_presence_sync: bool,
    pub save_log: bool,
    pub log_file: PathBuf,
    /// Lines kept in `log_file`; 0 keeps everything.
    pub max_log_lines: usize,
    /// Folder holding the persisted refresh token.
    pub token_folder: PathBuf,
    /// Pin the managed home instead of taking the account's first one.
    pub home_id: Option<HomeId>,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let checking_interval = parse_interval("CHECKING_INTERVAL", get("CHECKING_INTERVAL"), DEFAULT_CHECKING_INTERVAL_SECS)?;
        let error_retry_interval = parse_interval(
            "ERROR_RETRY_INTERVAL",
            get("ERROR_RETRY_INTERVAL"),
            DEFAULT_ERROR_RETRY_INTERVAL_SECS,
        )?;
        let http_timeout = parse_interval("HTTP_TIMEOUT", get("HTTP_TIMEOUT"), DEFAULT_HTTP_TIMEOUT_SECS)?;

        let min_temp = parse_number::<f64>("MIN_TEMP", get("MIN_TEMP"))?.unwrap_or(DEFAULT_MIN_TEMP);
        let max_temp = parse_number::<f64>("MAX_TEMP", get("MAX_TEMP"))?.unwrap_or(DEFAULT_MAX_TEMP);
        let temperature_limits = TemperatureLimits::new(min_temp, max_temp)?;

        let home_id = parse_number::<i64>("TADO_HOME_ID", get("TADO_HOME_ID"))?.map(HomeId);

        Ok(Config {
            checking_interval,
            error_retry_interval,
            temperature_limits,
            enable_temp_limit: get("ENABLE_TEMP_LIMIT").map(|s| parse_bool(&s)).unwrap_or(true),
            enable_presence_sync: get("ENABLE_PRESENCE_SYNC").map(|s| parse_bool(&s)).unwrap_or(true),
            save_log: get("SAVE_LOG").map(|s| parse_bool(&s)).unwrap_or(false),
            log_file: PathBuf::from(get("LOG_FILE").unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())),
            max_log_lines: parse_number::<usize>("MAX_LOG_LINES", get("MAX_LOG_LINES"))?
                .unwrap_or(DEFAULT_MAX_LOG_LINES),
            token_folder: PathBuf::from(get("TOKEN_FOLDER").unwrap_or_else(|| DEFAULT_TOKEN_FOLDER.to_string())),
            home_id,
            http_timeout,
        })
    }

    pub fn token_file(&self) -> PathBuf {
        self.token_folder.join("token")
    }
}

/// `true`, `1` and `yes` (any case) enable a flag; everything else disables it.
pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, String> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{name} must be a number, got {s:?}")),
    }
}

/// Seconds as a `Duration`; zero, negative and non-finite values are rejected.
fn parse_interval(name: &str, raw: Option<String>, default_secs: f64) -> Result<Duration, String> {
    let secs = parse_number::<f64>(name, raw)?.unwrap_or(default_secs);
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(format!("{name} must be a positive number of seconds, got {secs}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, String> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.checking_interval, Duration::from_secs(10));
        assert_eq!(cfg.error_retry_interval, Duration::from_secs(30));
        assert_eq!(cfg.temperature_limits.min(), 5.0);
        assert_eq!(cfg.temperature_limits.max(), 20.0);
        assert!(cfg.enable_temp_limit);
        assert!(cfg.enable_presence_sync);
        assert!(!cfg.save_log);
        assert_eq!(cfg.log_file, PathBuf::from("logfile.log"));
        assert_eq!(cfg.max_log_lines, 50);
        assert_eq!(cfg.token_file(), PathBuf::from("./token").join("token"));
        assert_eq!(cfg.home_id, None);
    }

    #[test]
    fn fractional_intervals_are_accepted() {
        let cfg = config_from(&[("CHECKING_INTERVAL", "2.5"), ("ERROR_RETRY_INTERVAL", " 0.25 ")]).unwrap();
        assert_eq!(cfg.checking_interval, Duration::from_millis(2500));
        assert_eq!(cfg.error_retry_interval, Duration::from_millis(250));
    }

    #[test]
    fn negative_or_garbage_intervals_are_rejected() {
        let err = config_from(&[("CHECKING_INTERVAL", "-1")]).unwrap_err();
        assert!(err.contains("CHECKING_INTERVAL"), "{err}");
        let err = config_from(&[("ERROR_RETRY_INTERVAL", "soon")]).unwrap_err();
        assert!(err.contains("ERROR_RETRY_INTERVAL"), "{err}");
    }

    #[test]
    fn zero_intervals_are_rejected() {
        for name in ["CHECKING_INTERVAL", "ERROR_RETRY_INTERVAL", "HTTP_TIMEOUT"] {
            for zero in ["0", "0.0", "-0"] {
                let err = config_from(&[(name, zero)]).unwrap_err();
                assert!(err.contains(name), "{name}={zero}: {err}");
            }
        }
        let cfg = config_from(&[("HTTP_TIMEOUT", "0.5")]).unwrap();
        assert_eq!(cfg.http_timeout, Duration::from_millis(500));
    }

    #[test]
    fn inverted_temperature_bounds_are_rejected() {
        let err = config_from(&[("MIN_TEMP", "22"), ("MAX_TEMP", "18")]).unwrap_err();
        assert!(err.contains("MIN_TEMP"), "{err}");
    }

    #[test]
    fn equal_temperature_bounds_are_allowed() {
        let cfg = config_from(&[("MIN_TEMP", "19"), ("MAX_TEMP", "19")]).unwrap();
        assert_eq!(cfg.temperature_limits.clamp(25.0), Some(19.0));
    }

    #[test]
    fn boolean_flags_follow_truthy_words() {
        for truthy in ["true", "TRUE", "1", "yes", "Yes"] {
            assert!(parse_bool(truthy), "{truthy}");
        }
        for falsy in ["false", "0", "no", "on", "enabled"] {
            assert!(!parse_bool(falsy), "{falsy}");
        }
        let cfg = config_from(&[("ENABLE_TEMP_LIMIT", "no"), ("SAVE_LOG", "yes")]).unwrap();
        assert!(!cfg.enable_temp_limit);
        assert!(cfg.save_log);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config_from(&[("MAX_TEMP", "  "), ("TOKEN_FOLDER", "")]).unwrap();
        assert_eq!(cfg.temperature_limits.max(), 20.0);
        assert_eq!(cfg.token_folder, PathBuf::from("./token"));
    }

    #[test]
    fn home_id_pin_is_parsed() {
        let cfg = config_from(&[("TADO_HOME_ID", "1234567")]).unwrap();
        assert_eq!(cfg.home_id, Some(HomeId(1234567)));
        assert!(config_from(&[("TADO_HOME_ID", "flat")]).is_err());
    }
}
