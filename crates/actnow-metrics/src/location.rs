//! Device location seam. The host supplies the real provider; kilometer-level
//! accuracy is enough to pick a county.

use std::future::Future;

use actnow_core::LocationConfig;

use crate::types::{Location, LocationError};

/// Coarse geolocation source.
pub trait GeolocationProvider: Send + Sync {
    fn current_coarse_location(&self) -> impl Future<Output = Result<Location, LocationError>> + Send;
}

/// Provider backed by coordinates from the `[location]` config section.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocation {
    coordinates: Option<(f64, f64)>,
}

impl ConfiguredLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            coordinates: Some((latitude, longitude)),
        }
    }

    /// No coordinates; every lookup reports the service as unavailable.
    pub fn unavailable() -> Self {
        Self { coordinates: None }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        Self {
            coordinates: config.coordinates(),
        }
    }
}

impl GeolocationProvider for ConfiguredLocation {
    async fn current_coarse_location(&self) -> Result<Location, LocationError> {
        let (latitude, longitude) = self.coordinates.ok_or(LocationError::ServiceUnavailable)?;
        Ok(Location {
            latitude,
            longitude,
            accuracy_meters: None,
        })
    }
}
