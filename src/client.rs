//! Blocking HTTP client for the Tado API endpoints used by the monitor.
//!
//! - Blocking client using `ureq` (no async).
//! - Uses the models in `crate::models::tado`.
//!
//! Authentication
//! - Resumes from the persisted refresh token, falls back to device authorization.
//! - Refreshes the access token shortly before expiry and once more on HTTP 401.

use http::{Method, StatusCode};
use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::auth::{self, OAuthToken, StoredRefresh, TokenStore};
use crate::models::tado::*;
use crate::shutdown::Pause;

const BASE_URL: &str = "https://my.tado.com/api/v2";
const REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum TadoClientError {
    MissingAuth,
    Transport(String),
    Http { status: u16, message: String },
    Json(serde_path_to_error::Error<serde_json::Error>),
    Auth(String),
    Io(String),
    Account(String),
}

impl TadoClientError {
    /// Worth retrying later: network trouble or a server-side failure.
    pub fn is_transient(&self) -> bool {
        match self {
            TadoClientError::Transport(_) => true,
            TadoClientError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl core::fmt::Display for TadoClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TadoClientError::MissingAuth => write!(f, "missing bearer token for authenticated endpoint"),
            TadoClientError::Transport(s) => write!(f, "transport error: {}", s),
            TadoClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            TadoClientError::Json(e) => write!(f, "json error at {}: {}", e.path(), e.inner()),
            TadoClientError::Auth(e) => write!(f, "auth error: {}", e),
            TadoClientError::Io(e) => write!(f, "token file error: {}", e),
            TadoClientError::Account(e) => write!(f, "account error: {}", e),
        }
    }
}

impl std::error::Error for TadoClientError {}

impl From<serde_path_to_error::Error<serde_json::Error>> for TadoClientError {
    fn from(value: serde_path_to_error::Error<serde_json::Error>) -> Self {
        TadoClientError::Json(value)
    }
}

#[derive(Debug)]
struct OAuthState {
    token: Option<OAuthToken>,
    store: TokenStore,
}

impl OAuthState {
    /// Install a token from a successful refresh grant, then persist its rotated
    /// refresh token. A failed write is logged and does not fail the request.
    fn accept_refreshed(&mut self, mut token: OAuthToken, previous: String) {
        let rotated = match token.refresh_token.clone() {
            Some(rotated) => Some(rotated),
            None => {
                // server did not rotate; the old one stays valid
                token.refresh_token = Some(previous);
                None
            }
        };
        self.token = Some(token);
        if let Some(rotated) = rotated
            && let Err(e) = self.store.save(&rotated)
        {
            warn!("Could not persist rotated refresh token: {}", e);
        }
    }
}

/// Token to start the session with: the stored refresh token when it still works,
/// device authorization otherwise. A missing, unusable or rejected stored token
/// all lead to device authorization; transport trouble is returned for a retry.
///
/// Returns `Ok(None)` if a shutdown was requested during device authorization.
fn initial_token<P, R, D>(
    store: &TokenStore,
    pause: &mut P,
    refresh: R,
    authorize: D,
) -> Result<Option<OAuthToken>, TadoClientError>
where
    P: Pause,
    R: FnOnce(&str) -> Result<OAuthToken, TadoClientError>,
    D: FnOnce(&mut P) -> Result<Option<OAuthToken>, TadoClientError>,
{
    let resumed = match store.load()? {
        StoredRefresh::Token(stored) => match refresh(&stored) {
            Ok(token) => {
                info!("Resumed session from {}", store.path().display());
                Some(token)
            }
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                warn!("Stored token was rejected ({}). Starting authentication process...", e);
                None
            }
        },
        StoredRefresh::Invalid(reason) => {
            warn!(
                "Token file {} is unusable ({}). Starting authentication process...",
                store.path().display(),
                reason
            );
            None
        }
        StoredRefresh::Missing => {
            info!("No token file found. Starting authentication process...");
            None
        }
    };

    let token = match resumed {
        Some(token) => token,
        None => match authorize(pause)? {
            Some(token) => token,
            None => return Ok(None),
        },
    };
    if let Some(refresh) = token.refresh_token.as_deref() {
        store.save(refresh)?;
    }
    Ok(Some(token))
}

fn with_headers<B>(req: ureq::RequestBuilder<B>, authorization: &str) -> ureq::RequestBuilder<B> {
    req.header("Accept", "application/json")
        .header("Authorization", authorization)
}

pub struct TadoClient {
    agent: ureq::Agent,
    oauth: RefCell<OAuthState>,
}

impl TadoClient {
    /// Authenticate, resuming from `token_file` when possible.
    ///
    /// Returns `Ok(None)` if a shutdown was requested during device authorization.
    pub fn connect<P: Pause>(
        token_file: &Path,
        timeout: Duration,
        pause: &mut P,
    ) -> Result<Option<Self>, TadoClientError> {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        let agent: ureq::Agent = config.into();
        let store = TokenStore::new(token_file);

        let Some(token) = initial_token(
            &store,
            pause,
            |refresh| auth::refresh_grant(&agent, refresh),
            |pause| auth::authorize_device(&agent, pause),
        )?
        else {
            return Ok(None);
        };
        info!("Login successful.");

        Ok(Some(TadoClient {
            agent,
            oauth: RefCell::new(OAuthState {
                token: Some(token),
                store,
            }),
        }))
    }

    fn url(path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", BASE_URL, path)
        } else {
            format!("{}/{}", BASE_URL, path)
        }
    }

    fn refresh(&self, state: &mut OAuthState) -> Result<(), TadoClientError> {
        let refresh = state
            .token
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or(TadoClientError::MissingAuth)?;
        let token = auth::refresh_grant(&self.agent, &refresh)?;
        state.accept_refreshed(token, refresh);
        Ok(())
    }

    fn get_bearer(&self) -> Result<String, TadoClientError> {
        let mut s = self.oauth.borrow_mut();
        let needs_refresh = match &s.token {
            None => true,
            Some(t) => Instant::now() + REFRESH_MARGIN >= t.expires_at,
        };
        if needs_refresh {
            self.refresh(&mut s)?;
        }
        s.token
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(TadoClientError::MissingAuth)
    }

    fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
        bearer: &str,
    ) -> Result<(StatusCode, String), TadoClientError> {
        let authorization = format!("Bearer {}", bearer);
        let result = match (method.as_str(), body) {
            ("GET", _) => with_headers(self.agent.get(url), &authorization).call(),
            ("DELETE", _) => with_headers(self.agent.delete(url), &authorization).call(),
            ("PUT", Some(b)) => with_headers(self.agent.put(url), &authorization).send_json(b),
            ("PUT", None) => with_headers(self.agent.put(url), &authorization).send_empty(),
            ("POST", Some(b)) => with_headers(self.agent.post(url), &authorization).send_json(b),
            ("POST", None) => with_headers(self.agent.post(url), &authorization).send_empty(),
            _ => return Err(TadoClientError::Transport(format!("unsupported method {}", method))),
        };

        let mut res = result.map_err(|e| TadoClientError::Transport(e.to_string()))?;
        let status = res.status();
        let text = res
            .body_mut()
            .read_to_string()
            .map_err(|e| TadoClientError::Transport(e.to_string()))?;
        Ok((status, text))
    }

    fn request(&self, method: Method, path: &str, body: Option<&serde_json::Value>) -> Result<String, TadoClientError> {
        let url = Self::url(path);
        let token = self.get_bearer()?;
        let (mut status, mut text) = self.send(&method, &url, body, &token)?;

        // Call, retry once on 401 after forcing refresh
        if status == StatusCode::UNAUTHORIZED {
            self.refresh(&mut self.oauth.borrow_mut())?;
            let token = self.get_bearer()?;
            (status, text) = self.send(&method, &url, body, &token)?;
        }

        if status.is_success() {
            Ok(text)
        } else {
            Err(TadoClientError::Http {
                status: status.as_u16(),
                message: if text.is_empty() { String::from("<no body>") } else { text },
            })
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TadoClientError> {
        let text = self.request(Method::GET, path, None)?;
        decode(&text)
    }

    fn write_json<B: Serialize>(&self, method: Method, path: &str, body: &B) -> Result<(), TadoClientError> {
        let value = serde_json::to_value(body).map_err(|e| TadoClientError::Transport(format!("encoding body: {}", e)))?;
        self.request(method, path, Some(&value)).map(|_| ())
    }

    pub fn get_me(&self) -> Result<User, TadoClientError> {
        self.get_json("/me")
    }

    pub fn get_home_state(&self, home_id: HomeId) -> Result<HomeState, TadoClientError> {
        self.get_json(&format!("/homes/{}/state", home_id.0))
    }

    pub fn get_zones(&self, home_id: HomeId) -> Result<Vec<Zone>, TadoClientError> {
        self.get_json(&format!("/homes/{}/zones", home_id.0))
    }

    pub fn get_zone_state(&self, home_id: HomeId, zone_id: ZoneId) -> Result<ZoneState, TadoClientError> {
        self.get_json(&format!("/homes/{}/zones/{}/state", home_id.0, zone_id.0))
    }

    pub fn get_mobile_devices(&self, home_id: HomeId) -> Result<Vec<MobileDevice>, TadoClientError> {
        self.get_json(&format!("/homes/{}/mobileDevices", home_id.0))
    }

    pub fn activate_open_window(&self, home_id: HomeId, zone_id: ZoneId) -> Result<(), TadoClientError> {
        let path = format!("/homes/{}/zones/{}/state/openWindow/activate", home_id.0, zone_id.0);
        self.request(Method::POST, &path, None).map(|_| ())
    }

    pub fn deactivate_open_window(&self, home_id: HomeId, zone_id: ZoneId) -> Result<(), TadoClientError> {
        let path = format!("/homes/{}/zones/{}/state/openWindow", home_id.0, zone_id.0);
        self.request(Method::DELETE, &path, None).map(|_| ())
    }

    pub fn set_zone_overlay(
        &self,
        home_id: HomeId,
        zone_id: ZoneId,
        overlay: &ZoneOverlayInput,
    ) -> Result<(), TadoClientError> {
        self.write_json(
            Method::PUT,
            &format!("/homes/{}/zones/{}/overlay", home_id.0, zone_id.0),
            overlay,
        )
    }

    pub fn set_presence_lock(&self, home_id: HomeId, presence: HomePresence) -> Result<(), TadoClientError> {
        self.write_json(
            Method::PUT,
            &format!("/homes/{}/presenceLock", home_id.0),
            &PresenceLockInput {
                home_presence: presence,
            },
        )
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, TadoClientError> {
    let de = &mut serde_json::Deserializer::from_str(text);
    serde_path_to_error::deserialize(de).map_err(TadoClientError::Json)
}
