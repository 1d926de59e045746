use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{ClientConfig, Credentials};
use crate::error::WildtraxError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Trades a username/password pair for a bearer token.
pub trait CredentialExchange: Send + Sync {
    fn exchange(&self, credentials: &Credentials) -> Result<AuthToken, WildtraxError>;
}

#[derive(Clone)]
pub struct HttpCredentialExchange {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(alias = "expiry")]
    expires_in: i64,
}

impl HttpCredentialExchange {
    pub fn new(config: &ClientConfig) -> Result<Self, WildtraxError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&crate::api::user_agent())
                .map_err(|err| WildtraxError::CredentialExchange(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|err| WildtraxError::CredentialExchange(err.to_string()))?;
        Ok(Self {
            client,
            url: config.auth_url(),
        })
    }
}

impl CredentialExchange for HttpCredentialExchange {
    fn exchange(&self, credentials: &Credentials) -> Result<AuthToken, WildtraxError> {
        let body = serde_json::json!({
            "username": credentials.username,
            "password": credentials.password(),
        });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|err| WildtraxError::CredentialExchange(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "credential exchange failed".to_string());
            return Err(WildtraxError::CredentialExchange(format!(
                "status {status}: {message}"
            )));
        }
        let token: TokenResponse = response
            .json()
            .map_err(|err| WildtraxError::CredentialExchange(err.to_string()))?;
        let expires_at = expiry_from(Utc::now(), token.expires_in)?;
        Ok(AuthToken::new(token.access_token, expires_at))
    }
}

/// Deadline `expires_in` seconds after `now`. Non-positive or unrepresentable
/// lifetimes are rejected.
fn expiry_from(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, WildtraxError> {
    if expires_in <= 0 {
        return Err(WildtraxError::CredentialExchange(format!(
            "token lifetime must be positive, got {expires_in}s"
        )));
    }
    TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            WildtraxError::CredentialExchange(format!(
                "token lifetime out of range: {expires_in}s"
            ))
        })
}

/// Cached bearer token plus the credentials needed to renew it.
///
/// Renewal only happens through an explicit [`Session::authenticate`] call;
/// an expired token makes [`Session::bearer`] fail instead of refreshing.
pub struct Session<X: CredentialExchange> {
    exchange: X,
    credentials: Credentials,
    token: Option<AuthToken>,
}

impl<X: CredentialExchange> Session<X> {
    pub fn new(exchange: X, credentials: Credentials) -> Self {
        Self {
            exchange,
            credentials,
            token: None,
        }
    }

    pub fn with_token(exchange: X, credentials: Credentials, token: AuthToken) -> Self {
        Self {
            exchange,
            credentials,
            token: Some(token),
        }
    }

    pub fn authenticate(&mut self, force: bool) -> Result<&AuthToken, WildtraxError> {
        if !force && !self.is_expired() {
            debug!("reusing unexpired token");
        } else {
            let token = self.exchange.exchange(&self.credentials)?;
            info!(
                user = %self.credentials.username,
                expires_at = %token.expires_at,
                "authenticated"
            );
            self.token = Some(token);
        }
        self.token
            .as_ref()
            .ok_or_else(|| WildtraxError::NotAuthenticated("no token issued".to_string()))
    }

    pub fn is_expired(&self) -> bool {
        match &self.token {
            Some(token) => token.is_expired_at(Utc::now()),
            None => true,
        }
    }

    /// Current token value, or an error telling the caller to authenticate.
    pub fn bearer(&self) -> Result<&str, WildtraxError> {
        match &self.token {
            Some(token) if !token.is_expired_at(Utc::now()) => Ok(&token.value),
            Some(token) => Err(WildtraxError::NotAuthenticated(format!(
                "token expired at {}",
                token.expires_at
            ))),
            None => Err(WildtraxError::NotAuthenticated(
                "no token; authenticate first".to_string(),
            )),
        }
    }

    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    pub fn exchange(&self) -> &X {
        &self.exchange
    }
}
