use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// County identifier (5-digit FIPS code) used as the region key for metrics lookup.
///
/// Ids end up in cache file names, so only ASCII letters and digits are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId(String);

impl RegionId {
    /// Trimmed identifier, or `None` for blank input or anything other than
    /// ASCII alphanumerics.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Accepts the string or numeric forms geocoders return for `county_fips`.
    /// Numbers are zero-padded, so `6037` becomes `"06037"`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::new(s),
            Value::Number(n) => n.as_u64().map(|n| Self(format!("{:05}", n))),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier has the 5-digit county FIPS shape.
    pub fn is_county_fips(&self) -> bool {
        self.0.len() == 5 && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RegionId {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(&raw).ok_or_else(|| format!("'{}' is not a region id", raw))
    }
}

impl From<RegionId> for String {
    fn from(id: RegionId) -> Self {
        id.0
    }
}

impl AsRef<str> for RegionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Geographic location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

/// Direction of a metric's current snapshot relative to the prior sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Equal,
    #[default]
    Undefined,
}

impl Trend {
    /// Arrow symbol name for rising or falling values, `None` otherwise.
    pub fn indicator(&self) -> Option<&'static str> {
        match self {
            Self::Increasing => Some("arrow.up"),
            Self::Decreasing => Some("arrow.down"),
            Self::Equal | Self::Undefined => None,
        }
    }
}

fn is_truthy(value: Option<f64>) -> bool {
    matches!(value, Some(v) if v != 0.0 && !v.is_nan())
}

/// Compare `a` against `b`.
///
/// Missing, zero and NaN operands are all treated as absent and yield
/// `Trend::Undefined`, so a metric that is genuinely zero has no trend.
pub fn compare_values(a: Option<f64>, b: Option<f64>) -> Trend {
    match (a, b) {
        (Some(a), Some(b)) if is_truthy(Some(a)) && is_truthy(Some(b)) => {
            if a == b {
                Trend::Equal
            } else if a > b {
                Trend::Increasing
            } else {
                Trend::Decreasing
            }
        }
        _ => Trend::Undefined,
    }
}

/// Upstream risk-level ordinal that does not name one of the six levels.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Risk level {0} could not be classified")]
pub struct UnclassifiedRiskLevel(pub String);

/// Risk classification, ordered as the upstream ordinals 0..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
    Unknown,
    Extreme,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 6] = [
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Critical,
        Self::Unknown,
        Self::Extreme,
    ];

    /// Classify an upstream ordinal. Fractional, non-finite and out-of-range
    /// values are rejected.
    pub fn from_ordinal(ordinal: f64) -> Result<Self, UnclassifiedRiskLevel> {
        if !ordinal.is_finite() || ordinal.fract() != 0.0 || !(0.0..=5.0).contains(&ordinal) {
            return Err(UnclassifiedRiskLevel(ordinal.to_string()));
        }
        Ok(Self::ALL[ordinal as usize])
    }

    /// Classify a JSON risk level; numbers and numeric strings are accepted.
    pub fn from_json(value: &Value) -> Result<Self, UnclassifiedRiskLevel> {
        let ordinal = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        ordinal
            .ok_or_else(|| UnclassifiedRiskLevel(value.to_string()))
            .and_then(Self::from_ordinal)
    }

    /// Lenient lookup: anything that cannot be classified lands in `Low`.
    ///
    /// This hides upstream data errors behind an all-clear level; prefer
    /// [`RiskLevel::from_ordinal`] wherever the caller can show "unclassified".
    pub fn bucket(ordinal: f64) -> Self {
        Self::from_ordinal(ordinal).unwrap_or(Self::Low)
    }

    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
            Self::Unknown => 4,
            Self::Extreme => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
            Self::Unknown => "Unknown",
            Self::Extreme => "Extreme",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "On track to contain COVID",
            Self::Medium => "Slow disease growth",
            Self::High => "At risk of outbreak",
            Self::Critical => "Active or imminent outbreak",
            Self::Unknown => "Risk unknown",
            Self::Extreme => "Severe outbreak",
        }
    }
}

/// The five tracked county metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    CaseDensity,
    TestPositivityRatio,
    InfectionRate,
    ContactTracerCapacityRatio,
    IcuHeadroomRatio,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        Self::CaseDensity,
        Self::TestPositivityRatio,
        Self::InfectionRate,
        Self::ContactTracerCapacityRatio,
        Self::IcuHeadroomRatio,
    ];

    /// Field name in both `metrics` and `riskLevels` of the upstream document.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::CaseDensity => "caseDensity",
            Self::TestPositivityRatio => "testPositivityRatio",
            Self::InfectionRate => "infectionRate",
            Self::ContactTracerCapacityRatio => "contactTracerCapacityRatio",
            Self::IcuHeadroomRatio => "icuHeadroomRatio",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CaseDensity => "New Cases per 100K",
            Self::TestPositivityRatio => "Positive Test Rate",
            Self::InfectionRate => "Infection Rate",
            Self::ContactTracerCapacityRatio => "Contacts Traced",
            Self::IcuHeadroomRatio => "ICU Headroom Used",
        }
    }

    /// Decimal places shown for the display value.
    pub fn precision(&self) -> usize {
        match self {
            Self::CaseDensity | Self::TestPositivityRatio => 1,
            Self::InfectionRate => 2,
            Self::ContactTracerCapacityRatio | Self::IcuHeadroomRatio => 0,
        }
    }

    pub fn is_percentage(&self) -> bool {
        matches!(
            self,
            Self::TestPositivityRatio | Self::ContactTracerCapacityRatio | Self::IcuHeadroomRatio
        )
    }

    pub fn value_in(&self, values: &MetricValues) -> Option<f64> {
        match self {
            Self::CaseDensity => values.case_density,
            Self::TestPositivityRatio => values.test_positivity_ratio,
            Self::InfectionRate => values.infection_rate,
            Self::ContactTracerCapacityRatio => values.contact_tracer_capacity_ratio,
            Self::IcuHeadroomRatio => values.icu_headroom_ratio,
        }
    }

    pub fn risk_level_in<'a>(&self, levels: &'a RiskLevels) -> Option<&'a Value> {
        match self {
            Self::CaseDensity => levels.case_density.as_ref(),
            Self::TestPositivityRatio => levels.test_positivity_ratio.as_ref(),
            Self::InfectionRate => levels.infection_rate.as_ref(),
            Self::ContactTracerCapacityRatio => levels.contact_tracer_capacity_ratio.as_ref(),
            Self::IcuHeadroomRatio => levels.icu_headroom_ratio.as_ref(),
        }
    }
}

/// One time-series sample, or the separately reported current snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValues {
    pub date: Option<String>,
    pub case_density: Option<f64>,
    pub test_positivity_ratio: Option<f64>,
    pub infection_rate: Option<f64>,
    pub contact_tracer_capacity_ratio: Option<f64>,
    pub icu_headroom_ratio: Option<f64>,
}

/// Raw per-metric risk ordinals; kept as JSON until classified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLevels {
    pub overall: Option<Value>,
    pub case_density: Option<Value>,
    pub test_positivity_ratio: Option<Value>,
    pub infection_rate: Option<Value>,
    pub contact_tracer_capacity_ratio: Option<Value>,
    pub icu_headroom_ratio: Option<Value>,
}

/// Typed view of a county `.timeseries.json` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyTimeseries {
    pub fips: String,
    pub county: String,
    pub state: String,
    pub last_updated_date: String,
    pub url: String,
    #[serde(default)]
    pub risk_levels: RiskLevels,
    #[serde(default)]
    pub metrics: MetricValues,
    #[serde(default)]
    pub metrics_timeseries: Vec<MetricValues>,
}

impl CountyTimeseries {
    /// The second-to-last series sample, when the series has at least two.
    pub fn prior_sample(&self) -> Option<&MetricValues> {
        let len = self.metrics_timeseries.len();
        if len < 2 {
            return None;
        }
        self.metrics_timeseries.get(len - 2)
    }
}

/// A tracked metric annotated with its risk level and trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetric {
    pub kind: MetricKind,
    /// `None` when the upstream ordinal could not be classified.
    pub risk_level: Option<RiskLevel>,
    pub value: Option<f64>,
    pub trend: Trend,
    pub label: String,
    pub precision: usize,
    pub is_percentage: bool,
}

impl DerivedMetric {
    /// Formatted value, e.g. `"15.3"` or `"8.1%"`; `"-"` when missing.
    pub fn display_value(&self) -> String {
        match self.value {
            Some(v) if self.is_percentage => format!("{:.*}%", self.precision, v * 100.0),
            Some(v) => format!("{:.*}", self.precision, v),
            None => "-".to_string(),
        }
    }
}

/// Where the metrics in a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Live,
    /// Upstream was unusable; a cache entry within the staleness bound was used.
    Cache { updated_at: DateTime<Utc> },
}

/// Validated county metrics ready for presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountyRisk {
    pub region: RegionId,
    pub county: String,
    pub state: String,
    pub last_updated_date: String,
    pub url: String,
    /// `None` when the overall ordinal could not be classified.
    pub overall_risk: Option<RiskLevel>,
    pub metrics: Vec<DerivedMetric>,
    pub source: DataSource,
    /// When the underlying document was last fetched and validated.
    pub updated_at: DateTime<Utc>,
    /// Suggested time for the host's next refresh.
    pub refresh_after: DateTime<Utc>,
}

impl CountyRisk {
    pub fn metric(&self, kind: MetricKind) -> Option<&DerivedMetric> {
        self.metrics.iter().find(|m| m.kind == kind)
    }

    /// "County, ST"
    pub fn location_label(&self) -> String {
        format!("{}, {}", self.county, self.state)
    }

    pub fn last_updated(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.last_updated_date, "%Y-%m-%d").ok()
    }

    pub fn is_from_cache(&self) -> bool {
        matches!(self.source, DataSource::Cache { .. })
    }
}

/// Location service errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_equal() {
        assert_eq!(compare_values(Some(4.2), Some(4.2)), Trend::Equal);
    }

    #[test]
    fn test_compare_increasing_and_decreasing() {
        assert_eq!(compare_values(Some(15.0), Some(10.0)), Trend::Increasing);
        assert_eq!(compare_values(Some(10.0), Some(15.0)), Trend::Decreasing);
    }

    #[test]
    fn test_compare_falsy_operands_are_undefined() {
        assert_eq!(compare_values(Some(0.0), Some(5.0)), Trend::Undefined);
        assert_eq!(compare_values(Some(5.0), Some(0.0)), Trend::Undefined);
        assert_eq!(compare_values(None, Some(5.0)), Trend::Undefined);
        assert_eq!(compare_values(Some(5.0), None), Trend::Undefined);
        assert_eq!(compare_values(Some(f64::NAN), Some(5.0)), Trend::Undefined);
        assert_eq!(compare_values(Some(0.0), Some(0.0)), Trend::Undefined);
    }

    #[test]
    fn test_compare_negative_values_are_truthy() {
        assert_eq!(compare_values(Some(-1.0), Some(-2.0)), Trend::Increasing);
    }

    #[test]
    fn test_trend_indicator() {
        assert_eq!(Trend::Increasing.indicator(), Some("arrow.up"));
        assert_eq!(Trend::Decreasing.indicator(), Some("arrow.down"));
        assert_eq!(Trend::Equal.indicator(), None);
        assert_eq!(Trend::Undefined.indicator(), None);
    }

    #[test]
    fn test_bucket_in_range() {
        for (ordinal, level) in RiskLevel::ALL.iter().enumerate() {
            assert_eq!(RiskLevel::bucket(ordinal as f64), *level);
            assert_eq!(level.ordinal() as usize, ordinal);
        }
        assert_eq!(RiskLevel::bucket(4.0), RiskLevel::Unknown);
        assert_eq!(RiskLevel::bucket(5.0), RiskLevel::Extreme);
    }

    #[test]
    fn test_bucket_defaults_to_low() {
        assert_eq!(RiskLevel::bucket(99.0), RiskLevel::Low);
        assert_eq!(RiskLevel::bucket(f64::NAN), RiskLevel::Low);
        assert_eq!(RiskLevel::bucket(-1.0), RiskLevel::Low);
    }

    #[test]
    fn test_from_ordinal_rejects_unclassifiable() {
        assert!(RiskLevel::from_ordinal(99.0).is_err());
        assert!(RiskLevel::from_ordinal(f64::NAN).is_err());
        assert!(RiskLevel::from_ordinal(2.5).is_err());
        assert!(RiskLevel::from_ordinal(f64::INFINITY).is_err());
        assert_eq!(RiskLevel::from_ordinal(3.0), Ok(RiskLevel::Critical));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(RiskLevel::from_json(&json!(2)), Ok(RiskLevel::High));
        assert_eq!(RiskLevel::from_json(&json!("1")), Ok(RiskLevel::Medium));
        assert!(RiskLevel::from_json(&json!("high")).is_err());
        assert!(RiskLevel::from_json(&Value::Null).is_err());
        assert!(RiskLevel::from_json(&json!(7)).is_err());
    }

    #[test]
    fn test_risk_level_text() {
        assert_eq!(RiskLevel::Critical.label(), "Critical");
        assert_eq!(RiskLevel::Low.description(), "On track to contain COVID");
    }

    #[test]
    fn test_region_id_from_json() {
        assert_eq!(
            RegionId::from_json(&json!("06037")).map(|r| r.to_string()),
            Some("06037".to_string())
        );
        assert_eq!(
            RegionId::from_json(&json!(6037)).map(|r| r.to_string()),
            Some("06037".to_string())
        );
        assert!(RegionId::from_json(&json!("  ")).is_none());
        assert!(RegionId::from_json(&Value::Null).is_none());
    }

    #[test]
    fn test_region_id_shape() {
        assert!(RegionId::new(" 17031 ").unwrap().is_county_fips());
        assert!(!RegionId::new("1703").unwrap().is_county_fips());
        assert!(RegionId::new("").is_none());
    }

    #[test]
    fn test_region_id_rejects_path_characters() {
        assert!(RegionId::new("../x").is_none());
        assert!(RegionId::new("06037/..").is_none());
        assert!(RegionId::new("060 37").is_none());
        assert!(serde_json::from_value::<RegionId>(json!("../x")).is_err());
        assert_eq!(
            serde_json::from_value::<RegionId>(json!("06037")).unwrap().as_str(),
            "06037"
        );
    }

    #[test]
    fn test_metric_kind_reads_matching_field() {
        let values = MetricValues {
            case_density: Some(12.5),
            icu_headroom_ratio: Some(0.4),
            ..MetricValues::default()
        };
        assert_eq!(MetricKind::CaseDensity.value_in(&values), Some(12.5));
        assert_eq!(MetricKind::IcuHeadroomRatio.value_in(&values), Some(0.4));
        assert_eq!(MetricKind::InfectionRate.value_in(&values), None);
    }

    #[test]
    fn test_metric_values_deserialize_with_nulls_and_extras() {
        let values: MetricValues = serde_json::from_value(json!({
            "date": "2021-01-10",
            "caseDensity": 30.1,
            "testPositivityRatio": null,
            "vaccinationsInitiatedRatio": 0.1
        }))
        .unwrap();
        assert_eq!(values.case_density, Some(30.1));
        assert_eq!(values.test_positivity_ratio, None);
        assert_eq!(values.date.as_deref(), Some("2021-01-10"));
    }

    #[test]
    fn test_display_value() {
        let mut metric = DerivedMetric {
            kind: MetricKind::TestPositivityRatio,
            risk_level: Some(RiskLevel::Medium),
            value: Some(0.0812),
            trend: Trend::Equal,
            label: MetricKind::TestPositivityRatio.label().to_string(),
            precision: 1,
            is_percentage: true,
        };
        assert_eq!(metric.display_value(), "8.1%");

        metric.is_percentage = false;
        metric.value = Some(15.24);
        assert_eq!(metric.display_value(), "15.2");

        metric.value = None;
        assert_eq!(metric.display_value(), "-");
    }

    #[test]
    fn test_prior_sample_needs_two_entries() {
        let mut doc = CountyTimeseries {
            fips: "06037".into(),
            county: "Los Angeles County".into(),
            state: "CA".into(),
            last_updated_date: "2021-01-10".into(),
            url: "https://covidactnow.org/us/california-ca/county/los_angeles_county".into(),
            risk_levels: RiskLevels::default(),
            metrics: MetricValues::default(),
            metrics_timeseries: vec![MetricValues::default()],
        };
        assert!(doc.prior_sample().is_none());

        doc.metrics_timeseries.push(MetricValues {
            case_density: Some(3.0),
            ..MetricValues::default()
        });
        doc.metrics_timeseries.push(MetricValues::default());
        assert_eq!(doc.prior_sample().and_then(|s| s.case_density), Some(3.0));
    }
}
