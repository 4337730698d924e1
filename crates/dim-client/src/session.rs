// # Session Manager
//
// Holds the DIM session token and obtains it by logging in when none was
// supplied.
//
// ## Login
//
// ```http
// POST {endpoint}/login
// Content-Type: application/x-www-form-urlencoded
//
// username=...&password=...
// ```
//
// Success is signaled by a `session` cookie in the response; the body is
// not inspected.
//
// ## Concurrency
//
// The token sits behind a `tokio::sync::RwLock`. Calls clone it under the
// read lock; a refresh takes the write lock and only logs in again if the
// token is still the one that failed, so concurrent failures cause a single
// login.

use dim_core::config::Credentials;
use dim_core::{ClientConfig, Error, Result, TransportFault};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::transport::{map_send_error, race};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Method name reported by login failures
const LOGIN: &str = "login";

/// Authenticated DIM session
///
/// # Security
///
/// The Debug implementation does NOT expose the token or password.
pub struct Session {
    endpoint: String,
    credentials: Option<Credentials>,
    token: RwLock<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl Session {
    /// Establish a session from validated configuration
    ///
    /// Uses the configured token as-is, or logs in with the credentials.
    /// The configuration must already have passed
    /// [`ClientConfig::validate`].
    pub async fn establish(
        http: &reqwest::Client,
        config: &ClientConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let endpoint = config.endpoint().to_string();
        let credentials = config.credentials();

        let token = match (config.token(), &credentials) {
            (Some(token), _) => {
                tracing::debug!("Using supplied DIM session token");
                token.to_string()
            }
            (None, Some(credentials)) => login(http, &endpoint, credentials, cancel).await?,
            (None, None) => {
                return Err(Error::auth_config(
                    "define username and password, or a session token",
                ));
            }
        };

        Ok(Self {
            endpoint,
            credentials,
            token: RwLock::new(token),
        })
    }

    /// Base URL, trailing slashes stripped
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether a fresh login is possible
    pub fn can_relogin(&self) -> bool {
        self.credentials.is_some()
    }

    /// Current token
    pub async fn token(&self) -> String {
        self.token.read().await.clone()
    }

    /// Replace `stale` with a freshly obtained token
    ///
    /// If another caller already replaced `stale`, its token is returned
    /// without logging in again.
    pub async fn refresh(
        &self,
        http: &reqwest::Client,
        stale: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let Some(credentials) = &self.credentials else {
            return Err(Error::auth_config(
                "session expired and no username/password is configured to log in again",
            ));
        };

        let mut guard = self.token.write().await;
        if *guard != stale {
            tracing::debug!("DIM session already refreshed by a concurrent call");
            return Ok(guard.clone());
        }

        tracing::warn!("DIM session rejected, logging in again as {}", credentials.username);
        let fresh = login(http, &self.endpoint, credentials, cancel).await?;
        *guard = fresh.clone();
        Ok(fresh)
    }
}

/// Obtain a session token by posting the login form
pub async fn login(
    http: &reqwest::Client,
    endpoint: &str,
    credentials: &Credentials,
    cancel: &CancellationToken,
) -> Result<String> {
    let url = format!("{}/login", endpoint);
    tracing::debug!("Logging in to {} as {}", url, credentials.username);

    let request = http.post(&url).form(&[
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
    ]);
    let response = race(request.send(), cancel)
        .await
        .and_then(|sent| sent.map_err(map_send_error))
        .map_err(|fault| Error::transport(LOGIN, fault))?;

    let token = response
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());

    match token {
        Some(token) => {
            tracing::info!("Logged in to DIM as {}", credentials.username);
            Ok(token)
        }
        None => Err(Error::transport(
            LOGIN,
            TransportFault::NoSession(format!(
                "login to {} returned status {} without a '{}' cookie",
                url,
                response.status().as_u16(),
                SESSION_COOKIE
            )),
        )),
    }
}
