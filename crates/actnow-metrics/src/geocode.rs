//! County lookup: convert coordinates to a county FIPS code.
//! Uses the FCC Area API (`/census/area`), which needs no API key.

use actnow_core::{ApiConfig, AppError, ConfigError, NetworkError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::types::{Location, RegionId};

#[derive(Debug, Deserialize)]
struct AreaResponse {
    #[serde(default)]
    results: Vec<AreaResult>,
}

#[derive(Debug, Deserialize)]
struct AreaResult {
    county_fips: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct GeocodeClient {
    client: Client,
    area_url: Url,
}

impl GeocodeClient {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;

        let base = config.geo_api_url.trim_end_matches('/');
        let area_url = Url::parse(&format!("{}/census/area", base))
            .map_err(|e| ConfigError::Invalid(format!("api.geo_api_url: {}", e)))?;

        Ok(Self { client, area_url })
    }

    /// County FIPS code of the first census area containing `location`.
    pub async fn county_fips(&self, location: &Location) -> Result<RegionId, AppError> {
        let response = self
            .client
            .get(self.area_url.clone())
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message: format!("Area lookup returned {}", status),
            }
            .into());
        }

        let body: AreaResponse = response.json().await?;

        let region = body
            .results
            .first()
            .and_then(|r| r.county_fips.as_ref())
            .and_then(RegionId::from_json)
            .ok_or_else(|| {
                NetworkError::InvalidResponse("Area lookup returned no county_fips".to_string())
            })?;

        tracing::info!(
            "Resolved {}, {} to county {}",
            location.latitude,
            location.longitude,
            region
        );
        Ok(region)
    }
}
