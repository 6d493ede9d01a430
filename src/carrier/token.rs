use crate::carrier::error::CarrierError;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::{debug, info, warn};

pub const LOGIN_ENDPOINT: &str = "login";
const LOGIN_PATH: &str = "/auth/login";
const LOGIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20);

/// A bearer token and the moment we stop trusting it.
#[derive(Debug, Clone)]
pub struct Credential {
    pub bearer_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Owns the carrier credential. Nothing else mutates it.
///
/// Concurrent refreshes are not serialized; each one stores a valid token and the
/// last writer wins.
pub struct TokenManager {
    client: reqwest::Client,
    login_url: String,
    email: String,
    password: SecretString,
    ttl: Duration,
    credential: RwLock<Option<Credential>>,
    logins: AtomicU64,
}

impl TokenManager {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        email: String,
        password: SecretString,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            login_url: format!("{}{}", base_url.trim_end_matches('/'), LOGIN_PATH),
            email,
            password,
            ttl,
            credential: RwLock::new(None),
            logins: AtomicU64::new(0),
        }
    }

    /// Return the cached token, logging in first when forced or when it has expired.
    pub async fn get_token(&self, force_refresh: bool) -> Result<SecretString, CarrierError> {
        if !force_refresh {
            if let Some(credential) = self.current() {
                if credential.is_valid_at(Utc::now()) {
                    return Ok(credential.bearer_token);
                }
                debug!(expired_at = %credential.expires_at, "Carrier token expired");
            }
        }

        let token = self.login().await?;
        let credential = Credential {
            bearer_token: SecretString::from(token),
            expires_at: Utc::now() + self.ttl,
        };
        info!(expires_at = %credential.expires_at, "Carrier token refreshed");

        let token = credential.bearer_token.clone();
        *self
            .credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(credential);
        Ok(token)
    }

    /// Cached-or-login, with one forced attempt if the first login is rejected.
    /// A second consecutive rejection is returned to the caller.
    pub async fn ensure_valid(&self) -> Result<SecretString, CarrierError> {
        match self.get_token(false).await {
            Err(CarrierError::AuthenticationError(reason)) => {
                warn!(%reason, "Carrier login rejected, forcing one refresh");
                self.get_token(true).await
            }
            other => other,
        }
    }

    /// Drop the cached credential so the next call logs in again.
    pub fn invalidate(&self) {
        *self
            .credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current().map(|c| c.expires_at)
    }

    pub fn has_valid_token(&self) -> bool {
        self.current()
            .map(|c| c.is_valid_at(Utc::now()))
            .unwrap_or(false)
    }

    /// Number of login exchanges performed so far.
    pub fn login_count(&self) -> u64 {
        self.logins.load(Ordering::SeqCst)
    }

    fn current(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn login(&self) -> Result<String, CarrierError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        debug!("Logging in to carrier: {}", self.login_url);

        let response = self
            .client
            .post(&self.login_url)
            .timeout(LOGIN_TIMEOUT)
            .json(&json!({
                "email": self.email,
                "password": self.password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| CarrierError::transport(LOGIN_ENDPOINT, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CarrierError::transport(LOGIN_ENDPOINT, e))?;

        let token = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.get("token").and_then(Value::as_str).map(str::to_string))
            .filter(|token| !token.is_empty());

        match token {
            Some(token) => Ok(token),
            None => {
                warn!(status = status.as_u16(), "Carrier login failed");
                Err(CarrierError::AuthenticationError(format!(
                    "carrier login failed (HTTP {}): {}",
                    status.as_u16(),
                    text
                )))
            }
        }
    }
}
