//! HTTP client for the biometric authentication service.

use crate::{AuthError, AuthResult, PhoneNumber};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use widget_config_and_utils::{Config, Secrets};

/// Header carrying the service API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Classified answer of the result endpoint.
///
/// These are normal outcomes, not errors: a pending answer arrives on almost
/// every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// HTTP 200: the user approved. Carries the display name when present.
    Approved { name: Option<String> },
    /// HTTP 422: the user has not answered yet.
    Pending,
    /// HTTP 404: no account for this number.
    UserNotFound,
    /// HTTP 403: the user declined or biometrics did not match.
    Denied,
    /// Any other status.
    Unexpected { status: u16 },
}

/// Network boundary of the authentication flow.
#[async_trait]
pub trait BiometricApi: Send + Sync {
    /// Ask the service to prompt the user's companion app.
    /// Any non-2xx answer is an error.
    async fn request_auth(&self, number: &PhoneNumber) -> AuthResult<()>;

    /// Check the outcome of a previous request.
    async fn poll_result(&self, number: &PhoneNumber) -> AuthResult<PollOutcome>;
}

/// Body shared by both endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequestBody<'a> {
    mobile: &'a str,
    request_from: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ResultResponse {
    #[serde(default)]
    data: Option<ResultData>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultData {
    #[serde(default)]
    details: Option<ResultDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultDetails {
    #[serde(default)]
    name: Option<String>,
}

/// reqwest implementation of [`BiometricApi`].
#[derive(Clone)]
pub struct BiometricClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    request_from: String,
}

impl std::fmt::Debug for BiometricClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_from", &self.request_from)
            .finish()
    }
}

impl BiometricClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Service root, e.g. `https://api.example.com`
    /// * `api_key` - Value for the `x-api-key` header, from the host environment
    /// * `request_from` - Caller label shown to the user in the companion app
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        request_from: impl Into<String>,
    ) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url, api_key, request_from)
    }

    pub fn with_http_client(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        request_from: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            request_from: request_from.into(),
        }
    }

    /// Build a client from the widget configuration and host secrets.
    pub fn from_config(config: &Config, secrets: &Secrets) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;

        if secrets.auth_api_key.is_none() {
            warn!("no biometric API key configured; requests will likely be rejected");
        }

        Ok(Self::with_http_client(
            http_client,
            config.auth_base_url(),
            secrets.auth_api_key.clone(),
            config.request_from.clone(),
        ))
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    async fn post(&self, endpoint: &str, number: &PhoneNumber) -> AuthResult<reqwest::Response> {
        let body = AuthRequestBody {
            mobile: number.as_str(),
            request_from: &self.request_from,
        };

        let mut request = self.http_client.post(self.endpoint(endpoint)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        Ok(request.send().await?)
    }
}

#[async_trait]
impl BiometricApi for BiometricClient {
    async fn request_auth(&self, number: &PhoneNumber) -> AuthResult<()> {
        let response = self.post("biometric-auth-request", number).await?;
        let status = response.status();

        if !status.is_success() {
            error!(status = %status, "biometric auth request rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(status = %status, "biometric auth request accepted");
        Ok(())
    }

    async fn poll_result(&self, number: &PhoneNumber) -> AuthResult<PollOutcome> {
        let response = self.post("biometric-auth-result", number).await?;

        let outcome = match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                let parsed: ResultResponse = serde_json::from_str(&body)?;
                PollOutcome::Approved {
                    name: parsed
                        .data
                        .and_then(|d| d.details)
                        .and_then(|d| d.name)
                        .filter(|n| !n.trim().is_empty()),
                }
            }
            StatusCode::UNPROCESSABLE_ENTITY => PollOutcome::Pending,
            StatusCode::NOT_FOUND => PollOutcome::UserNotFound,
            StatusCode::FORBIDDEN => PollOutcome::Denied,
            other => PollOutcome::Unexpected {
                status: other.as_u16(),
            },
        };

        Ok(outcome)
    }
}
