use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::prelude::{Engine, BASE64_URL_SAFE_NO_PAD};
use http::header::AUTHORIZATION;
use http::{Extensions, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("profile `{profile}` not found at {}", path.display())]
    ProfileNotFound { profile: String, path: PathBuf },

    #[error("failed to read credential file {}", path.display())]
    CredentialRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode credential file {}", path.display())]
    CredentialDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("access token is not a JWT: {0}")]
    MalformedToken(String),

    #[error("failed to refresh access token{hint}")]
    Refresh {
        #[source]
        source: reqwest::Error,
        hint: String,
    },

    #[error("token endpoint returned {status}: {body}")]
    RefreshStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid bearer token")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

/// A capability that attaches authentication to an outgoing request.
///
/// The profile (and any refresh machinery) is baked in at construction; the
/// single method takes only the request.
#[async_trait]
pub trait AuthHandler: Send + Sync + Debug {
    async fn add_auth(&self, request: &mut Request) -> Result<(), AuthError>;
}

/// Fixed-bearer handler; the test configuration.
#[derive(Debug, Clone)]
pub struct StaticTokenAuth {
    token: String,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthHandler for StaticTokenAuth {
    async fn add_auth(&self, request: &mut Request) -> Result<(), AuthError> {
        let value = HeaderValue::from_str(&format!("Bearer {}", self.token))?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

/// A Gen3-style API key credential as stored by the profile tooling.
#[derive(Debug, Clone, Deserialize)]
pub struct Gen3Credential {
    pub api_key: String,
    #[serde(default)]
    pub key_id: String,
}

/// Bearer auth backed by a refresh credential, with just-in-time renewal.
///
/// The access token is shared mutable state behind a lock; only the refresh
/// path mutates it.
#[derive(Debug)]
pub struct ProfileAuth {
    endpoint: Url,
    credential: Gen3Credential,
    token: tokio::sync::Mutex<Option<String>>,
    http: reqwest::Client,
}

impl ProfileAuth {
    pub fn new(mut endpoint: Url, credential: Gen3Credential) -> Self {
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Self {
            endpoint,
            credential,
            token: tokio::sync::Mutex::new(None),
            http: reqwest::Client::new(),
        }
    }

    /// Load the named profile from `~/.gen3/<profile>.json`.
    pub fn from_profile(endpoint: Url, profile: &str) -> Result<Self, AuthError> {
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
        let path = home.join(".gen3").join(format!("{profile}.json"));
        Self::from_credential_file(endpoint, profile, &path)
    }

    pub fn from_credential_file(
        endpoint: Url,
        profile: &str,
        path: &Path,
    ) -> Result<Self, AuthError> {
        if !path.exists() {
            return Err(AuthError::ProfileNotFound {
                profile: profile.to_string(),
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|source| AuthError::CredentialRead {
            path: path.to_path_buf(),
            source,
        })?;
        let credential =
            serde_json::from_str(&contents).map_err(|source| AuthError::CredentialDecode {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(endpoint, credential))
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        let url = format!("{}user/credentials/api/access_token", self.endpoint);
        debug!("refreshing access token from {url}");

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "api_key": self.credential.api_key }))
            .send()
            .await
            .map_err(|source| AuthError::Refresh {
                hint: refresh_hint(&source),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshStatus { status, body });
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|source| AuthError::Refresh {
                    hint: String::new(),
                    source,
                })?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl AuthHandler for ProfileAuth {
    async fn add_auth(&self, request: &mut Request) -> Result<(), AuthError> {
        let mut guard = self.token.lock().await;

        let needs_refresh = match guard.as_deref() {
            Some(token) => token_expired(token)?,
            None => true,
        };
        if needs_refresh {
            *guard = Some(self.refresh().await?);
        }

        let token = guard.as_deref().unwrap_or_default();
        let value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

/// Adapter that runs an [`AuthHandler`] inside the middleware stack. It sits
/// innermost so every retry attempt re-attaches a fresh header.
#[derive(Debug)]
pub struct AuthMiddleware {
    handler: std::sync::Arc<dyn AuthHandler>,
}

impl AuthMiddleware {
    pub fn new(handler: std::sync::Arc<dyn AuthHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        self.handler
            .add_auth(&mut req)
            .await
            .map_err(reqwest_middleware::Error::middleware)?;
        next.run(req, extensions).await
    }
}

/// Whether the token's `exp` claim is in the past. The claim is read without
/// signature verification; the server re-validates on every request.
fn token_expired(token: &str) -> Result<bool, AuthError> {
    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::MalformedToken(token.to_string()))?;
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::MalformedToken(token.to_string()))?;
    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::MalformedToken(token.to_string()))?;

    Ok(claims.exp <= jiff::Timestamp::now().as_second())
}

fn refresh_hint(err: &reqwest::Error) -> String {
    let message = format!("{err:?}").to_ascii_lowercase();
    if message.contains("no such host") || message.contains("dns error") {
        " (the token issuer could not be resolved; check that you are connected to the internal network or VPN)".to_string()
    } else {
        String::new()
    }
}
