// # DIM JSON-RPC Client
//
// reqwest-based implementation of `dim_core::RpcInvoker`.
//
// ## Behavior
//
// - Configuration is validated before any network access; missing
//   credentials fail with `Error::AuthConfig` and no HTTP request is made
// - Without a token, the client logs in once at construction
// - Every call is one `POST {endpoint}/jsonrpc` with the `session` cookie
// - Per-request timeout from configuration (10 seconds by default)
// - Cancellation aborts the in-flight request and yields
//   `TransportFault::Canceled`
// - No retries. The single exception is `ReloginPolicy::Once`: a call
//   rejected with HTTP 401/403, or answered with a non-JSON body (how an
//   expired session shows up), is replayed once after a fresh login
//
// ## Security Requirements
//
// - Password and token NEVER appear in logs or Debug output
// - Call parameters are logged at debug level by count only
//
// ## API Reference
//
// - Login: POST `{endpoint}/login` (form: username, password)
// - Call: POST `{endpoint}/jsonrpc`

pub mod envelope;
pub mod session;
pub mod transport;

use async_trait::async_trait;
use dim_core::{ClientConfig, Error, ReloginPolicy, Result, RpcInvoker, TransportFault};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use envelope::{RpcRequest, decode_response};
use session::{SESSION_COOKIE, Session};

pub use session::login;

/// DIM JSON-RPC client
///
/// Safe to share across tasks (`Arc<DimClient>`); calls only read the
/// session token.
///
/// # Security
///
/// The Debug implementation does NOT expose the session token.
pub struct DimClient {
    /// HTTP client with the per-request timeout applied
    http: reqwest::Client,

    /// Endpoint and token
    session: Session,

    /// What to do when the session is rejected mid-call
    relogin: ReloginPolicy,
}

impl std::fmt::Debug for DimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DimClient")
            .field("session", &self.session)
            .field("relogin", &self.relogin)
            .finish()
    }
}

impl DimClient {
    /// Create a client, logging in if no token is configured
    ///
    /// # Errors
    ///
    /// - `Error::Config` / `Error::AuthConfig`: invalid configuration (no
    ///   network access has happened)
    /// - `Error::Transport { fault: TransportFault::NoSession(..), .. }`:
    ///   the login response carried no session cookie
    /// - `Error::Transport { .. }`: the login request itself failed
    pub async fn new(config: ClientConfig) -> Result<Self> {
        Self::connect(config, &CancellationToken::new()).await
    }

    /// Like [`DimClient::new`], with the login abortable through `cancel`
    pub async fn connect(config: ClientConfig, cancel: &CancellationToken) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("could not build HTTP client: {}", e)))?;

        let session = Session::establish(&http, &config, cancel).await?;
        tracing::debug!("DIM client ready for {}", session.endpoint());

        Ok(Self {
            http,
            session,
            relogin: config.relogin,
        })
    }

    /// Base URL the client talks to
    pub fn endpoint(&self) -> &str {
        self.session.endpoint()
    }

    /// Current session token
    ///
    /// ⚠️ Treat as a secret.
    pub async fn token(&self) -> String {
        self.session.token().await
    }

    async fn call_once(
        &self,
        method: &str,
        params: &[Value],
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let url = format!("{}/jsonrpc", self.session.endpoint());
        let request = self
            .http
            .post(&url)
            .header(reqwest::header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
            .json(&RpcRequest::new(method, params));

        let body = transport::send(request, cancel)
            .await
            .map_err(|fault| Error::transport(method, fault))?;
        decode_response(method, &body)
    }

    fn should_relogin(&self, err: &Error) -> bool {
        if self.relogin != ReloginPolicy::Once || !self.session.can_relogin() {
            return false;
        }
        matches!(
            err,
            Error::Decode { .. }
                | Error::Transport {
                    fault: TransportFault::Status {
                        status: 401 | 403,
                        ..
                    },
                    ..
                }
        )
    }
}

#[async_trait]
impl RpcInvoker for DimClient {
    async fn invoke(
        &self,
        method: &str,
        params: Vec<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        tracing::debug!("exec dim call {} with {} arg(s)", method, params.len());

        let token = self.session.token().await;
        match self.call_once(method, &params, &token, cancel).await {
            Err(e) if self.should_relogin(&e) => {
                tracing::warn!("{} rejected ({}), retrying once with a new session", method, e);
                let fresh = self.session.refresh(&self.http, &token, cancel).await?;
                self.call_once(method, &params, &fresh, cancel).await
            }
            outcome => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_fail_before_network() {
        // Port 9 (discard) is never contacted: validation fails first
        let config = ClientConfig::new("http://127.0.0.1:9/dim");
        let err = DimClient::new(config).await.unwrap_err();
        assert!(matches!(err, Error::AuthConfig(_)));
    }

    #[tokio::test]
    async fn test_empty_token_and_username_is_auth_config() {
        let config = ClientConfig::new("http://127.0.0.1:9/dim")
            .with_token("")
            .with_credentials("", "secret");
        let err = DimClient::new(config).await.unwrap_err();
        assert!(matches!(err, Error::AuthConfig(_)));
        assert!(err.to_string().contains("username"));
    }

    #[tokio::test]
    async fn test_token_not_exposed_in_debug() {
        let config = ClientConfig::new("http://127.0.0.1:9/dim/").with_token("secret_token_12345");
        let client = DimClient::new(config).await.unwrap();

        let debug_str = format!("{:?}", client);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("DimClient"));
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/dim");
    }

    #[tokio::test]
    async fn test_zero_timeout_is_config_error() {
        let config = ClientConfig::new("http://127.0.0.1:9/dim")
            .with_token("t")
            .with_timeout_secs(0);
        assert!(matches!(DimClient::new(config).await, Err(Error::Config(_))));
    }
}
