//! Region resolution: explicit override, then a fresh cached id, then a live
//! geolocation + county lookup, falling back to a stale cached id.

use std::time::Duration;

use actnow_core::{AppError, Config};
use anyhow::Context;
use chrono::Utc;

use crate::cache::{CacheEntry, FileCache, LOCATION_KEY};
use crate::geocode::GeocodeClient;
use crate::location::GeolocationProvider;
use crate::types::RegionId;

pub struct LocationResolver<G> {
    geolocation: G,
    geocoder: GeocodeClient,
    cache: FileCache,
    max_age: Duration,
}

impl<G: GeolocationProvider> LocationResolver<G> {
    pub fn new(geolocation: G, geocoder: GeocodeClient, cache: FileCache, max_age: Duration) -> Self {
        Self {
            geolocation,
            geocoder,
            cache,
            max_age,
        }
    }

    pub fn from_config(config: &Config, geolocation: G) -> Result<Self, AppError> {
        Ok(Self::new(
            geolocation,
            GeocodeClient::new(&config.api)?,
            FileCache::new(&config.cache.directory),
            config.cache.location_max_age(),
        ))
    }

    /// Resolve the region for this run. Never fails; `None` means no region
    /// could be determined from any source.
    pub async fn resolve(&self, region_override: Option<&str>) -> Option<RegionId> {
        if let Some(region) = region_override.and_then(RegionId::new) {
            tracing::info!("Using region override {}", region);
            return Some(region);
        }

        let now = Utc::now();
        let cached = match self.cache.read::<RegionId>(LOCATION_KEY).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached region: {}", e);
                None
            }
        };

        if let Some(entry) = &cached {
            if entry.is_fresh(self.max_age, now) {
                tracing::debug!(
                    "Cached region {} is fresh (updated {})",
                    entry.payload,
                    entry.updated_at
                );
                return Some(entry.payload.clone());
            }
        }

        match self.lookup().await {
            Ok(region) => {
                if let Err(e) = self
                    .cache
                    .write(LOCATION_KEY, &CacheEntry::new(region.clone()))
                    .await
                {
                    tracing::warn!("Could not cache region {}: {}", region, e);
                }
                Some(region)
            }
            Err(e) => {
                tracing::warn!("Could not determine region: {:#}", e);
                let fallback = cached.map(|entry| entry.payload);
                if let Some(region) = &fallback {
                    tracing::info!("Falling back to cached region {}", region);
                }
                fallback
            }
        }
    }

    async fn lookup(&self) -> anyhow::Result<RegionId> {
        let location = self
            .geolocation
            .current_coarse_location()
            .await
            .context("Geolocation failed")?;

        let region = self
            .geocoder
            .county_fips(&location)
            .await
            .context("County lookup failed")?;

        Ok(region)
    }
}
