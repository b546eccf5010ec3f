//! OAuth2 against Tado's login service.
//!
//! - Device authorization grant for the first run (user opens a URL once).
//! - Refresh grant afterwards; Tado rotates refresh tokens on every use, so
//!   each new one is written back through [`TokenStore`].

use crate::client::TadoClientError;
use crate::shutdown::Pause;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const DEVICE_AUTHORIZE_URL: &str = "https://login.tado.com/oauth2/device_authorize";
const OAUTH_TOKEN_URL: &str = "https://login.tado.com/oauth2/token";
const OAUTH_CLIENT_ID: &str = "1bb50063-6b0c-4d11-bd99-387f4a91cc46";
const OAUTH_SCOPE: &str = "offline_access";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_at: Instant,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub interval: Option<u64>,
}

impl DeviceAuthorization {
    /// URL to show the user; the complete variant already embeds the user code.
    pub fn url(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .unwrap_or(self.verification_uri.as_str())
    }
}

/// Outcome of one poll of the token endpoint during device authorization.
#[derive(Debug)]
enum DevicePoll {
    Granted(OAuthToken),
    Pending,
    SlowDown,
}

/// Refresh token persisted on disk between runs.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

/// What [`TokenStore::load`] found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRefresh {
    Missing,
    Token(String),
    /// File exists but holds no usable token; the reason is kept for the log.
    Invalid(String),
}

#[derive(Serialize, Deserialize)]
struct StoredToken {
    refresh_token: String,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored refresh token. Only a failed read is an error; content that is not
    /// a token comes back as [`StoredRefresh::Invalid`].
    pub fn load(&self) -> Result<StoredRefresh, TadoClientError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoredRefresh::Missing),
            Err(e) => return Err(TadoClientError::Io(format!("reading {} failed: {}", self.path.display(), e))),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(StoredRefresh::Missing);
        }
        // plain-text files holding only the token are accepted too
        Ok(match serde_json::from_str::<StoredToken>(trimmed) {
            Ok(stored) if !stored.refresh_token.trim().is_empty() => StoredRefresh::Token(stored.refresh_token),
            Ok(_) => StoredRefresh::Invalid("empty refresh_token".to_string()),
            Err(_) if !trimmed.starts_with('{') => StoredRefresh::Token(trimmed.to_string()),
            Err(e) => StoredRefresh::Invalid(e.to_string()),
        })
    }

    /// Write through a sibling temp file so a crash never leaves a truncated token.
    pub fn save(&self, refresh_token: &str) -> Result<(), TadoClientError> {
        let io_err = |e: std::io::Error| TadoClientError::Io(format!("writing {} failed: {}", self.path.display(), e));
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string(&StoredToken {
            refresh_token: refresh_token.to_string(),
        })
        .map_err(|e| TadoClientError::Io(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!("Refresh token persisted to {}", self.path.display());
        Ok(())
    }
}

fn post_form(agent: &ureq::Agent, url: &str, form: &[(&str, &str)]) -> Result<(u16, String), TadoClientError> {
    let mut res = agent
        .post(url)
        .header("Accept", "application/json")
        .send_form(form.iter().copied())
        .map_err(|e| TadoClientError::Transport(e.to_string()))?;
    let status = res.status().as_u16();
    let body = res
        .body_mut()
        .read_to_string()
        .map_err(|e| TadoClientError::Transport(e.to_string()))?;
    Ok((status, body))
}

fn oauth_error_code(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct E {
        error: String,
    }
    serde_json::from_str::<E>(body).ok().map(|e| e.error)
}

fn parse_token_response(status: u16, body: &str) -> Result<OAuthToken, TadoClientError> {
    #[derive(Deserialize)]
    struct R {
        access_token: String,
        expires_in: u64,
        #[serde(default)]
        refresh_token: Option<String>,
    }
    if !(200..300).contains(&status) {
        return Err(TadoClientError::Auth(format!("http {}: {}", status, body)));
    }
    let de = &mut serde_json::Deserializer::from_str(body);
    let R {
        access_token,
        expires_in,
        refresh_token,
    } = serde_path_to_error::deserialize(de).map_err(TadoClientError::Json)?;
    Ok(OAuthToken {
        access_token,
        expires_at: Instant::now() + Duration::from_secs(expires_in),
        refresh_token,
    })
}

fn parse_device_poll(status: u16, body: &str) -> Result<DevicePoll, TadoClientError> {
    if (200..300).contains(&status) {
        return parse_token_response(status, body).map(DevicePoll::Granted);
    }
    match oauth_error_code(body).as_deref() {
        Some("authorization_pending") => Ok(DevicePoll::Pending),
        Some("slow_down") => Ok(DevicePoll::SlowDown),
        Some("expired_token") => Err(TadoClientError::Auth(
            "device code expired before the login was confirmed".to_string(),
        )),
        Some("access_denied") => Err(TadoClientError::Auth("login was denied".to_string())),
        _ if status >= 500 => Err(TadoClientError::Http {
            status,
            message: body.to_string(),
        }),
        _ => Err(TadoClientError::Auth(format!("http {}: {}", status, body))),
    }
}

/// Exchange a refresh token for a fresh access token.
pub fn refresh_grant(agent: &ureq::Agent, refresh: &str) -> Result<OAuthToken, TadoClientError> {
    let (status, body) = post_form(
        agent,
        OAUTH_TOKEN_URL,
        &[
            ("client_id", OAUTH_CLIENT_ID),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
        ],
    )?;
    if status >= 500 {
        return Err(TadoClientError::Http { status, message: body });
    }
    parse_token_response(status, &body)
}

pub fn request_device_authorization(agent: &ureq::Agent) -> Result<DeviceAuthorization, TadoClientError> {
    let (status, body) = post_form(
        agent,
        DEVICE_AUTHORIZE_URL,
        &[("client_id", OAUTH_CLIENT_ID), ("scope", OAUTH_SCOPE)],
    )?;
    if !(200..300).contains(&status) {
        return Err(TadoClientError::Http { status, message: body });
    }
    let de = &mut serde_json::Deserializer::from_str(&body);
    serde_path_to_error::deserialize(de).map_err(TadoClientError::Json)
}

/// Poll the token endpoint until the user confirms the login.
///
/// Returns `Ok(None)` when a shutdown was requested while waiting.
pub fn poll_device_token<P: Pause>(
    agent: &ureq::Agent,
    authorization: &DeviceAuthorization,
    pause: &mut P,
) -> Result<Option<OAuthToken>, TadoClientError> {
    let mut interval = Duration::from_secs(authorization.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS).max(1));
    let deadline = Instant::now() + Duration::from_secs(authorization.expires_in);

    loop {
        if pause.pause(interval).is_stop() {
            return Ok(None);
        }
        if Instant::now() >= deadline {
            return Err(TadoClientError::Auth(
                "device code expired before the login was confirmed".to_string(),
            ));
        }
        let (status, body) = post_form(
            agent,
            OAUTH_TOKEN_URL,
            &[
                ("client_id", OAUTH_CLIENT_ID),
                ("device_code", authorization.device_code.as_str()),
                ("grant_type", DEVICE_CODE_GRANT),
            ],
        )?;
        match parse_device_poll(status, &body)? {
            DevicePoll::Granted(token) => return Ok(Some(token)),
            DevicePoll::Pending => debug!("Device authorization pending"),
            DevicePoll::SlowDown => {
                interval += SLOW_DOWN_STEP;
                debug!("Device authorization asked to slow down; polling every {}s", interval.as_secs());
            }
        }
    }
}

/// Full first-run flow: request a code, show the URL, wait for confirmation.
pub fn authorize_device<P: Pause>(agent: &ureq::Agent, pause: &mut P) -> Result<Option<OAuthToken>, TadoClientError> {
    let authorization = request_device_authorization(agent)?;
    info!(
        "Device authorization required (code {}, valid for {}s)",
        authorization.user_code, authorization.expires_in
    );
    println!("Please visit the following URL to authenticate:");
    println!("{}", authorization.url());
    poll_device_token(agent, &authorization, pause)
}
