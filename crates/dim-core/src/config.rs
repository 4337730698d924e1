//! Configuration types for the DIM client
//!
//! This module defines the client configuration and the environment
//! variables it can be sourced from.

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{Error, Result};

/// Environment variable holding the DIM endpoint URL
pub const ENV_ENDPOINT: &str = "DIM_ENDPOINT";
/// Environment variable holding a pre-established session token
pub const ENV_TOKEN: &str = "DIM_TOKEN";
/// Environment variable holding the login username
pub const ENV_USERNAME: &str = "DIM_USERNAME";
/// Environment variable holding the login password
pub const ENV_PASSWORD: &str = "DIM_PASSWORD";

/// Client configuration
///
/// Either a non-empty `token`, or both `username` and `password`, must be
/// present. See [`ClientConfig::validate`].
///
/// # Security
///
/// The Debug implementation does NOT expose the password or token.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL, e.g. `https://dim.example.com/dim`
    pub endpoint: String,

    /// Session token; when present no login round-trip occurs
    #[serde(default)]
    pub token: Option<String>,

    /// Login username, ignored if `token` is set
    #[serde(default)]
    pub username: Option<String>,

    /// Login password, ignored if `token` is set
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub password: Option<String>,

    /// Connect/response timeout per request (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// What to do when a call fails because the session is no longer valid
    #[serde(default)]
    pub relogin: ReloginPolicy,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("relogin", &self.relogin)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration for `endpoint` with no credentials
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            relogin: ReloginPolicy::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// Unset variables leave the corresponding field empty; call
    /// [`validate`](Self::validate) before use.
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var(ENV_ENDPOINT).unwrap_or_default(),
            token: env::var(ENV_TOKEN).ok(),
            username: env::var(ENV_USERNAME).ok(),
            password: env::var(ENV_PASSWORD).ok(),
            timeout_secs: default_timeout_secs(),
            relogin: ReloginPolicy::default(),
        }
    }

    /// Override the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the session token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the login credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the re-login policy
    pub fn with_relogin(mut self, relogin: ReloginPolicy) -> Self {
        self.relogin = relogin;
        self
    }

    /// Session token, if one was supplied and is non-empty
    pub fn token(&self) -> Option<&str> {
        non_empty(&self.token)
    }

    /// Login credentials, if both are present and non-empty
    pub fn credentials(&self) -> Option<Credentials> {
        match (non_empty(&self.username), non_empty(&self.password)) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => None,
        }
    }

    /// Endpoint with trailing slashes stripped
    pub fn endpoint(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Validate the configuration
    ///
    /// Fails with [`Error::Config`] for a missing endpoint or zero timeout and
    /// with [`Error::AuthConfig`] when neither a token nor a complete
    /// username/password pair is available. Performs no network access.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint().is_empty() {
            return Err(Error::config(format!(
                "DIM endpoint is missing or empty. Set the endpoint value or use the {ENV_ENDPOINT} environment variable"
            )));
        }

        if self.timeout_secs == 0 {
            return Err(Error::config("Request timeout must be > 0 seconds"));
        }

        if self.token().is_some() {
            return Ok(());
        }

        if non_empty(&self.username).is_none() {
            return Err(Error::auth_config(format!(
                "DIM username must be specified. Use the {ENV_USERNAME} environment variable, \
                 or supply a session token via {ENV_TOKEN}"
            )));
        }

        if non_empty(&self.password).is_none() {
            return Err(Error::auth_config(format!(
                "DIM password must be specified. Use the {ENV_PASSWORD} environment variable, \
                 or supply a session token via {ENV_TOKEN}"
            )));
        }

        Ok(())
    }
}

/// Username and password used to obtain a session
///
/// The Debug implementation does NOT expose the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login username
    pub username: String,
    /// Login password
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Behavior after a call fails because the session is no longer accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloginPolicy {
    /// Surface the failure; the caller must build a new client
    #[default]
    Never,
    /// Log in again once and replay the call (requires credentials)
    Once,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn default_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_stripped() {
        let config = ClientConfig::new("https://dim.example.com/dim//");
        assert_eq!(config.endpoint(), "https://dim.example.com/dim");
    }

    #[test]
    fn test_token_alone_is_enough() {
        let config = ClientConfig::new("https://dim.example.com").with_token("abc");
        assert!(config.validate().is_ok());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_empty_token_and_username_is_auth_config_error() {
        let config = ClientConfig::new("https://dim.example.com")
            .with_token("")
            .with_credentials("", "secret");

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::AuthConfig(_)));
        assert!(err.to_string().contains(ENV_USERNAME));
    }

    #[test]
    fn test_missing_password_is_auth_config_error() {
        let mut config = ClientConfig::new("https://dim.example.com");
        config.username = Some("admin".to_string());

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::AuthConfig(_)));
        assert!(err.to_string().contains(ENV_PASSWORD));
    }

    #[test]
    fn test_empty_endpoint_is_config_error() {
        let config = ClientConfig::new("/").with_token("abc");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_secrets_not_exposed_in_debug() {
        let config = ClientConfig::new("https://dim.example.com")
            .with_token("secret_token_12345")
            .with_credentials("admin", "hunter2");

        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("admin"));

        let creds = config.credentials().unwrap();
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"endpoint": "https://dim.example.com", "token": "t"}"#)
                .unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.relogin, ReloginPolicy::Never);
    }

    #[test]
    fn test_relogin_policy_serde() {
        let policy: ReloginPolicy = serde_json::from_str(r#""once""#).unwrap();
        assert_eq!(policy, ReloginPolicy::Once);
    }
}
