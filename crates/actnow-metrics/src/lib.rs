//! County COVID risk metrics for the ActNow widget
//!
//! Resolves the county for the current run, fetches its COVID Act Now
//! timeseries with a bounded-age file cache as fallback, and derives
//! trend-annotated metrics for presentation.

pub mod cache;
pub mod error;
pub mod geocode;
pub mod location;
pub mod pipeline;
pub mod provider;
pub mod resolver;
pub mod service;
pub mod types;

pub use cache::{CacheEntry, FileCache};
pub use error::RefreshError;
pub use geocode::GeocodeClient;
pub use location::{ConfiguredLocation, GeolocationProvider};
pub use pipeline::MetricsPipeline;
pub use provider::CovidActNowClient;
pub use resolver::LocationResolver;
pub use service::CountyRiskService;
pub use types::*;
