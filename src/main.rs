pub mod models {
    pub mod tado;
}

pub mod auth;
pub mod client;
pub mod config;
pub mod logging;
pub mod session;
pub mod shutdown;
pub mod utils;
pub mod services {
    pub mod monitor;
    pub mod policy;
}

use crate::config::Config;
use crate::services::monitor::{self, MonitorSettings};
use crate::session::Session;
use crate::shutdown::Shutdown;
use crate::utils::seconds;
use log::{error, info};

pub fn run(cfg: &Config) -> Result<(), String> {
    // 1) Signal watcher, before anything blocks
    let mut shutdown = Shutdown::install()?;

    // 2) Authenticate and resolve the home
    let Some(session) = Session::establish(cfg, &mut shutdown)? else {
        info!("Authentication interrupted by user.");
        return Ok(());
    };
    info!("Authenticated to Tado API (home {})", session.home_id().0);

    // 3) Monitor until interrupted
    let settings = MonitorSettings::from(cfg);
    monitor::run_loop(&session, &settings, &mut shutdown);
    Ok(())
}

fn main() {
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    let log_target = cfg.save_log.then(|| (cfg.log_file.as_path(), cfg.max_log_lines));
    if let Err(err) = logging::init(log_target) {
        eprintln!("fatal: {}", err);
        std::process::exit(1);
    }

    info!(
        "tado-autoassist {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    info!(
        "Config loaded (checking_interval={}s, error_retry_interval={}s, temp_limit={}, min_temp={}, max_temp={}, presence_sync={}, save_log={}, log_file={}, max_log_lines={}, token_folder={}, home_id={})",
        seconds(cfg.checking_interval),
        seconds(cfg.error_retry_interval),
        cfg.enable_temp_limit,
        cfg.temperature_limits.min(),
        cfg.temperature_limits.max(),
        cfg.enable_presence_sync,
        cfg.save_log,
        cfg.log_file.display(),
        cfg.max_log_lines,
        cfg.token_folder.display(),
        cfg.home_id
            .map(|h| h.0.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );

    if let Err(e) = run(&cfg) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
