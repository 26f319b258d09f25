//! Metrics pipeline: fetch the county timeseries, validate it, fall back to a
//! bounded-age cache, and derive trend-annotated metrics.

use std::time::Duration;

use actnow_core::{AppError, Config};
use chrono::{TimeDelta, Utc};
use serde_json::Value;

use crate::cache::{timeseries_key, CacheEntry, FileCache};
use crate::error::RefreshError;
use crate::provider::CovidActNowClient;
use crate::types::{
    compare_values, CountyRisk, CountyTimeseries, DataSource, DerivedMetric, MetricKind,
    RegionId, RiskLevel, Trend,
};

/// Fields a document must carry to be accepted, with their JSON paths.
const REQUIRED_FIELDS: &[(&str, &[&str])] = &[
    ("fips", &["fips"]),
    ("riskLevels.overall", &["riskLevels", "overall"]),
    ("county", &["county"]),
    ("state", &["state"]),
    ("lastUpdatedDate", &["lastUpdatedDate"]),
    ("metrics.caseDensity", &["metrics", "caseDensity"]),
    ("metricsTimeseries", &["metricsTimeseries"]),
    ("url", &["url"]),
];

fn lookup<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |value, key| value.get(key))
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Check the document shape. All-or-nothing: any missing field rejects the
/// whole document, and every missing field is reported.
pub fn validate_document(doc: &Value) -> Result<(), Vec<&'static str>> {
    let mut missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .filter(|(_, path)| !is_present(lookup(doc, path)))
        .map(|(name, _)| *name)
        .collect();

    if doc
        .get("metricsTimeseries")
        .is_some_and(|v| !v.is_null() && !v.is_array())
    {
        missing.push("metricsTimeseries");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing)
    }
}

/// Validate `json` and parse it into the typed model. Only a document that
/// passes both is cached, so a cache entry always parses on fallback.
fn accept_document(json: Value) -> Result<(Value, CountyTimeseries), String> {
    validate_document(&json).map_err(|missing| format!("missing {}", missing.join(", ")))?;
    let doc = serde_json::from_value(json.clone()).map_err(|e| format!("unparseable: {}", e))?;
    Ok((json, doc))
}

fn classify(value: Option<&Value>, field: &str) -> Option<RiskLevel> {
    let value = value?;
    match RiskLevel::from_json(value) {
        Ok(level) => Some(level),
        Err(e) => {
            tracing::warn!("{} for {}", e, field);
            None
        }
    }
}

/// Annotate each requested metric with its risk level and its trend from the
/// second-to-last series sample to the current snapshot.
pub fn derive_metrics(doc: &CountyTimeseries, kinds: &[MetricKind]) -> Vec<DerivedMetric> {
    let prior = doc.prior_sample();

    kinds
        .iter()
        .map(|kind| {
            let value = kind.value_in(&doc.metrics);
            let trend = match prior {
                Some(sample) => compare_values(value, kind.value_in(sample)),
                None => Trend::Undefined,
            };

            DerivedMetric {
                kind: *kind,
                risk_level: classify(kind.risk_level_in(&doc.risk_levels), kind.field_name()),
                value,
                trend,
                label: kind.label().to_string(),
                precision: kind.precision(),
                is_percentage: kind.is_percentage(),
            }
        })
        .collect()
}

pub struct MetricsPipeline {
    client: CovidActNowClient,
    cache: FileCache,
    max_age: Duration,
    refresh_hours: u32,
}

impl MetricsPipeline {
    pub fn new(client: CovidActNowClient, cache: FileCache, max_age: Duration) -> Self {
        Self {
            client,
            cache,
            max_age,
            refresh_hours: 4,
        }
    }

    /// Hours added to the run time for `CountyRisk::refresh_after`.
    pub fn with_refresh_hours(mut self, hours: u32) -> Self {
        self.refresh_hours = hours;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(Self::new(
            CovidActNowClient::new(&config.api)?,
            FileCache::new(&config.cache.directory),
            config.cache.data_max_age(),
        )
        .with_refresh_hours(config.widget.refresh_hours))
    }

    /// All five tracked metrics for `region`.
    pub async fn fetch(&self, region: &RegionId) -> Result<CountyRisk, RefreshError> {
        self.fetch_selected(region, &MetricKind::ALL).await
    }

    /// Only the requested metrics for `region`, in the order given.
    pub async fn fetch_selected(
        &self,
        region: &RegionId,
        kinds: &[MetricKind],
    ) -> Result<CountyRisk, RefreshError> {
        let key = timeseries_key(region);
        let now = Utc::now();

        let live = match self.client.fetch_timeseries(region).await {
            Ok(json) => match accept_document(json) {
                Ok(accepted) => Some(accepted),
                Err(reason) => {
                    tracing::warn!("Timeseries for {} rejected: {}", region, reason);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Timeseries fetch for {} failed: {}", region, e);
                None
            }
        };

        let (doc, source, updated_at) = match live {
            Some((json, doc)) => {
                tracing::info!("Timeseries for {} looks good, caching", region);
                let entry = CacheEntry::at(json, now);
                if let Err(e) = self.cache.write(&key, &entry).await {
                    tracing::warn!("Could not cache timeseries for {}: {}", region, e);
                }
                (doc, DataSource::Live, entry.updated_at)
            }
            None => {
                let entry = self
                    .cache
                    .read::<Value>(&key)
                    .await
                    .map_err(AppError::from)?
                    .ok_or_else(|| {
                        RefreshError::upstream_unusable(format!("no cached data for {}", region))
                    })?;

                if entry.is_older_than(self.max_age, now) {
                    tracing::warn!(
                        "Cached timeseries for {} is too old: {}",
                        region,
                        entry.updated_at
                    );
                    return Err(RefreshError::upstream_unusable(format!(
                        "cached data from {} is too old",
                        entry.updated_at
                    )));
                }

                tracing::info!(
                    "Using cached timeseries for {} from {}",
                    region,
                    entry.updated_at
                );
                let doc: CountyTimeseries =
                    serde_json::from_value(entry.payload).map_err(|e| {
                        RefreshError::Unexpected(format!(
                            "Could not parse cached timeseries for {}: {}",
                            region, e
                        ))
                    })?;
                (
                    doc,
                    DataSource::Cache {
                        updated_at: entry.updated_at,
                    },
                    entry.updated_at,
                )
            }
        };

        let metrics = derive_metrics(&doc, kinds);
        let overall_risk = classify(doc.risk_levels.overall.as_ref(), "overall");

        Ok(CountyRisk {
            region: RegionId::new(&doc.fips).unwrap_or_else(|| region.clone()),
            county: doc.county,
            state: doc.state,
            last_updated_date: doc.last_updated_date,
            url: doc.url,
            overall_risk,
            metrics,
            source,
            updated_at,
            refresh_after: now + TimeDelta::hours(i64::from(self.refresh_hours)),
        })
    }
}
