//! Session establishment
//!
//! A session is created once per run: fetch the account landing page, pull
//! the anti-forgery token out of it, and sign in with the account
//! credentials. The resulting [`Session`] is shared read-only by the listing
//! and enrichment stages. Nothing here is retried; any failure ends the run.

use crate::config::{CredentialsConfig, PlatformConfig};
use crate::crawler::endpoints::Endpoints;
use crate::crawler::fetcher::{Fetcher, RequestError};
use crate::crawler::parser::extract_token;
use crate::crawler::wire::SignInRequest;
use crate::{AuthError, ConfigError};
use std::fmt;

/// Account credentials read from the environment
#[derive(Clone)]
pub struct Credentials {
    pub login_name: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
            password: password.into(),
        }
    }

    /// Reads the credentials from the environment variables named in `config`
    pub fn from_env(config: &CredentialsConfig) -> Result<Self, ConfigError> {
        let read = |name: &str| match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::MissingEnv(name.to_string())),
        };

        Ok(Self {
            login_name: read(config.login_name_env.as_str())?,
            password: read(config.password_env.as_str())?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login_name", &self.login_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated session: the anti-forgery token plus the cookie-carrying
/// transport that received it
#[derive(Debug, Clone)]
pub struct Session {
    fetcher: Fetcher,
}

impl Session {
    pub fn csrf_token(&self) -> &str {
        self.fetcher.csrf_token().unwrap_or_default()
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }
}

/// Runs the landing page and sign-in exchange
pub struct Authenticator<'a> {
    fetcher: &'a Fetcher,
    endpoints: &'a Endpoints,
    signin_params: &'a str,
}

impl<'a> Authenticator<'a> {
    pub fn new(fetcher: &'a Fetcher, endpoints: &'a Endpoints, platform: &'a PlatformConfig) -> Self {
        Self {
            fetcher,
            endpoints,
            signin_params: &platform.signin_params,
        }
    }

    /// Fetches the account landing page
    pub async fn fetch_landing(&self) -> Result<String, AuthError> {
        let url = self.endpoints.landing();
        self.fetcher
            .get_page(&url)
            .await
            .map_err(AuthError::LandingUnavailable)
    }

    /// Signs in with `token` and returns the authenticated session
    pub async fn sign_in(
        &self,
        token: &str,
        credentials: &Credentials,
    ) -> Result<Session, AuthError> {
        let url = self.endpoints.sign_in();
        let fetcher = self.fetcher.clone().with_csrf_token(token);

        let request = SignInRequest::new(
            &credentials.login_name,
            &credentials.password,
            self.signin_params,
        );
        let body = serde_json::to_value(&request)
            .map_err(|e| AuthError::SignInFailed(RequestError::Decode(e)))?;

        match fetcher.post_json_once(&url, &body).await {
            Ok(_) => Ok(Session { fetcher }),
            Err(RequestError::Status { status, body }) => {
                Err(AuthError::SignInRejected { status, body })
            }
            Err(e) => Err(AuthError::SignInFailed(e)),
        }
    }

    /// Landing page, token extraction and sign-in, in order
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let html = self.fetch_landing().await?;
        let token = extract_token(&html)?;
        tracing::debug!("Found anti-forgery token ({} chars)", token.len());

        let session = self.sign_in(&token, credentials).await?;
        tracing::info!("Signed in as {}", credentials.login_name);
        Ok(session)
    }
}
