//! HTTP loader for the country reference list.

use crate::{parse_countries, CountryDirectoryError, CountryDirectoryResult};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};
use widget_config_and_utils::Config;
use widget_protocol_types::{CountryOption, Message};

/// Transcript text shown when the list could not be loaded.
pub const LOAD_FAILED_MESSAGE: &str =
    "Sorry, I couldn't load the country list. Please try again later.";

/// Outcome of a one-shot load. Never an error: a failed fetch is an empty
/// list with `failed` set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryLoad {
    pub countries: Vec<CountryOption>,
    pub failed: bool,
}

impl CountryLoad {
    /// The bot message to show for a failed load.
    pub fn failure_message(&self) -> Option<Message> {
        self.failed.then(|| Message::bot(LOAD_FAILED_MESSAGE))
    }
}

/// Source of the country reference list.
#[async_trait]
pub trait CountrySource: Send + Sync {
    async fn fetch_countries(&self) -> CountryDirectoryResult<Vec<CountryOption>>;

    /// Fetch, absorbing any failure into an empty [`CountryLoad`].
    async fn load(&self) -> CountryLoad {
        match self.fetch_countries().await {
            Ok(countries) => {
                info!(count = countries.len(), "country list loaded");
                CountryLoad {
                    countries,
                    failed: false,
                }
            }
            Err(e) => {
                error!(error = %e, "failed to load country list");
                CountryLoad {
                    countries: Vec::new(),
                    failed: true,
                }
            }
        }
    }
}

/// reqwest implementation of [`CountrySource`].
#[derive(Debug, Clone)]
pub struct CountryDirectory {
    http_client: reqwest::Client,
    url: String,
}

impl CountryDirectory {
    /// Create a directory reading from `url` (full URL including any query).
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), url)
    }

    pub fn with_http_client(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
        }
    }

    pub fn from_config(config: &Config) -> CountryDirectoryResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self::with_http_client(http_client, config.country_api_url.clone()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CountrySource for CountryDirectory {
    async fn fetch_countries(&self) -> CountryDirectoryResult<Vec<CountryOption>> {
        tracing::debug!(url = %self.url, "fetching country list");

        let response = self
            .http_client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            error!(status = %status, "country endpoint returned an error");
            return Err(CountryDirectoryError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        match serde_json::from_str::<Value>(&body)? {
            Value::Array(entries) => Ok(parse_countries(entries)),
            other => Err(CountryDirectoryError::Payload(format!(
                "expected an array, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
