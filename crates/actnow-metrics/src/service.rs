use actnow_core::{AppError, Config};

use crate::error::RefreshError;
use crate::location::GeolocationProvider;
use crate::pipeline::MetricsPipeline;
use crate::resolver::LocationResolver;
use crate::types::{CountyRisk, MetricKind, RegionId};

/// One widget refresh: resolve the region, then fetch and derive its metrics.
pub struct CountyRiskService<G> {
    resolver: LocationResolver<G>,
    pipeline: MetricsPipeline,
    default_region: Option<String>,
}

impl<G: GeolocationProvider> CountyRiskService<G> {
    pub fn new(resolver: LocationResolver<G>, pipeline: MetricsPipeline) -> Self {
        Self {
            resolver,
            pipeline,
            default_region: None,
        }
    }

    /// Build both components from `config`. `widget.region` becomes the
    /// override used when a refresh is given none.
    pub fn from_config(config: &Config, geolocation: G) -> Result<Self, AppError> {
        Ok(Self {
            resolver: LocationResolver::from_config(config, geolocation)?,
            pipeline: MetricsPipeline::from_config(config)?,
            default_region: config.widget.region.clone(),
        })
    }

    pub async fn refresh(&self, region_override: Option<&str>) -> Result<CountyRisk, RefreshError> {
        self.refresh_selected(region_override, &MetricKind::ALL).await
    }

    pub async fn refresh_selected(
        &self,
        region_override: Option<&str>,
        kinds: &[MetricKind],
    ) -> Result<CountyRisk, RefreshError> {
        // A blank or malformed override from the host does not shadow the configured region.
        let region_override = region_override
            .filter(|raw| RegionId::new(raw).is_some())
            .or(self.default_region.as_deref());

        let region = self
            .resolver
            .resolve(region_override)
            .await
            .ok_or(RefreshError::LocationUnresolved)?;

        tracing::info!("Using FIPS code {}", region);

        let risk = self.pipeline.fetch_selected(&region, kinds).await;
        if let Err(e) = &risk {
            tracing::error!("Refresh for {} failed: {}", region, e);
        }
        risk
    }
}
