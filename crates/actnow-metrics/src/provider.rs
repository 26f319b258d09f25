//! COVID Act Now v2 API client.

use actnow_core::{ApiConfig, AppError, ConfigError, NetworkError};
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::types::RegionId;

#[derive(Debug, Clone)]
pub struct CovidActNowClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl CovidActNowClient {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;

        // Trailing slash so `join` appends instead of replacing the last segment.
        let base = format!("{}/", config.covid_api_url.trim_end_matches('/'));
        let base_url = Url::parse(&base)
            .map_err(|e| ConfigError::Invalid(format!("api.covid_api_url: {}", e)))?;

        if config.covid_api_key.trim().is_empty() {
            tracing::warn!("No COVID Act Now API key configured; requests will likely be rejected");
        }

        Ok(Self {
            client,
            base_url,
            api_key: config.covid_api_key.clone(),
        })
    }

    fn timeseries_url(&self, region: &RegionId) -> Result<Url, AppError> {
        self.base_url
            .join(&format!("county/{}.timeseries.json", region))
            .map_err(|e| ConfigError::Invalid(format!("timeseries url: {}", e)).into())
    }

    /// Raw county timeseries document. Shape is not checked here.
    pub async fn fetch_timeseries(&self, region: &RegionId) -> Result<Value, AppError> {
        let url = self.timeseries_url(region)?;
        tracing::debug!("Fetching timeseries for county {}", region);

        let response = self
            .client
            .get(url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message: format!("Timeseries request for {} returned {}", region, status),
            }
            .into());
        }

        Ok(response.json::<Value>().await?)
    }
}
