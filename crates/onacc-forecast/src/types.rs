use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ForecastError};
use crate::locality::{Locality, LocalityKey};

/// Forecast family requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMode {
    Daily,
    Seasonal,
    Projection,
}

impl ForecastMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Seasonal => "seasonal",
            Self::Projection => "projection",
        }
    }
}

impl std::fmt::Display for ForecastMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ForecastMode {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "seasonal" => Ok(Self::Seasonal),
            "projection" => Ok(Self::Projection),
            other => Err(ForecastError::InvalidConfig(format!(
                "unknown forecast mode '{}'",
                other
            ))),
        }
    }
}

/// Physical quantity a variable measures; decides its target unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Temperature,
    Precipitation,
}

/// Daily variables the provider can forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    TempMax,
    TempMin,
    Precipitation,
}

impl Variable {
    pub const ALL: [Variable; 3] = [Variable::TempMax, Variable::TempMin, Variable::Precipitation];

    /// Provider field name
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::TempMax => "temperature_2m_max",
            Self::TempMin => "temperature_2m_min",
            Self::Precipitation => "precipitation_sum",
        }
    }

    /// Column name used in exports
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::TempMax => "temp_max",
            Self::TempMin => "temp_min",
            Self::Precipitation => "precipitation",
        }
    }

    pub fn quantity(&self) -> Quantity {
        match self {
            Self::TempMax | Self::TempMin => Quantity::Temperature,
            Self::Precipitation => Quantity::Precipitation,
        }
    }
}

impl std::str::FromStr for Variable {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Variable::ALL
            .into_iter()
            .find(|v| v.column_name() == s || v.api_name() == s)
            .ok_or_else(|| ForecastError::InvalidConfig(format!("unknown variable '{}'", s)))
    }
}

/// Preset seasonal lengths offered to users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonalLength {
    FortyFiveDays,
    ThreeMonths,
    SixMonths,
    NineMonths,
}

impl SeasonalLength {
    pub fn days(&self) -> u32 {
        match self {
            Self::FortyFiveDays => 45,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::NineMonths => 270,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FortyFiveDays => "45 days",
            Self::ThreeMonths => "3 months",
            Self::SixMonths => "6 months",
            Self::NineMonths => "9 months",
        }
    }
}

impl std::str::FromStr for SeasonalLength {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        [
            Self::FortyFiveDays,
            Self::ThreeMonths,
            Self::SixMonths,
            Self::NineMonths,
        ]
        .into_iter()
        .find(|l| l.label() == normalized)
        .ok_or_else(|| {
            ForecastError::InvalidConfig(format!(
                "unknown seasonal length '{}' (expected 45 days, 3 months, 6 months or 9 months)",
                s
            ))
        })
    }
}

/// Mode-specific forecast horizon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Horizon {
    Daily { days: u32 },
    Seasonal { days: u32 },
    Projection {
        start_year: i32,
        end_year: i32,
        climate_model: Option<String>,
    },
}

/// What to forecast for every locality of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub horizon: Horizon,
    pub variables: Vec<Variable>,
}

impl ForecastConfig {
    pub fn new(horizon: Horizon) -> Self {
        Self {
            horizon,
            variables: Variable::ALL.to_vec(),
        }
    }

    pub fn daily(days: u32) -> Self {
        Self::new(Horizon::Daily { days })
    }

    pub fn seasonal(days: u32) -> Self {
        Self::new(Horizon::Seasonal { days })
    }

    pub fn projection(start_year: i32, end_year: i32, climate_model: Option<String>) -> Self {
        Self::new(Horizon::Projection {
            start_year,
            end_year,
            climate_model,
        })
    }

    pub fn with_variables(mut self, variables: Vec<Variable>) -> Self {
        self.variables = variables;
        self
    }

    pub fn mode(&self) -> ForecastMode {
        match self.horizon {
            Horizon::Daily { .. } => ForecastMode::Daily,
            Horizon::Seasonal { .. } => ForecastMode::Seasonal,
            Horizon::Projection { .. } => ForecastMode::Projection,
        }
    }
}

/// Provider endpoint family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Forecast,
    Seasonal,
    Climate,
}

impl Endpoint {
    pub fn for_mode(mode: ForecastMode) -> Self {
        match mode {
            ForecastMode::Daily => Self::Forecast,
            ForecastMode::Seasonal => Self::Seasonal,
            ForecastMode::Projection => Self::Climate,
        }
    }

    pub fn url<'a>(&self, api: &'a onacc_core::ApiConfig) -> &'a str {
        match self {
            Self::Forecast => &api.forecast_url,
            Self::Seasonal => &api.seasonal_url,
            Self::Climate => &api.climate_url,
        }
    }
}

/// A validated, ready-to-send request for one locality
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub locality: Locality,
    pub config: ForecastConfig,
    pub endpoint: Endpoint,
    pub query: Vec<(String, String)>,
}

impl ForecastRequest {
    pub fn mode(&self) -> ForecastMode {
        self.config.mode()
    }

    /// Look up a query parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// One day of a daily or seasonal series, in °C and mm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub precipitation: Option<f64>,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            temp_max: None,
            temp_min: None,
            precipitation: None,
        }
    }

    pub fn value(&self, variable: Variable) -> Option<f64> {
        match variable {
            Variable::TempMax => self.temp_max,
            Variable::TempMin => self.temp_min,
            Variable::Precipitation => self.precipitation,
        }
    }

    pub fn set(&mut self, variable: Variable, value: Option<f64>) {
        match variable {
            Variable::TempMax => self.temp_max = value,
            Variable::TempMin => self.temp_min = value,
            Variable::Precipitation => self.precipitation = value,
        }
    }
}

/// Projection values for one calendar year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualValues {
    pub year: i32,
    pub values: BTreeMap<Variable, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rows", rename_all = "lowercase")]
pub enum ForecastSeries {
    Daily(Vec<SeriesPoint>),
    Annual(Vec<AnnualValues>),
}

impl ForecastSeries {
    pub fn len(&self) -> usize {
        match self {
            Self::Daily(points) => points.len(),
            Self::Annual(years) => years.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalized forecast for one locality
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub locality: Locality,
    pub mode: ForecastMode,
    pub series: ForecastSeries,
}

/// Why a locality produced no result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub locality: Locality,
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn from_error(locality: Locality, error: &ForecastError) -> Self {
        Self {
            locality,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Complete result of one aggregation pass
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub mode: ForecastMode,
    /// Successful results, in input order
    pub results: Vec<ForecastResult>,
    pub failures: BTreeMap<LocalityKey, Failure>,
}

impl RunOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failure_kind(&self, locality: &Locality) -> Option<ErrorKind> {
        self.failures.get(&locality.key()).map(|f| f.kind)
    }

    pub fn count_failures(&self, kind: ErrorKind) -> usize {
        self.failures.values().filter(|f| f.kind == kind).count()
    }

    /// True when every locality appears exactly once, either as a result or a failure
    pub fn covers(&self, localities: &[Locality]) -> bool {
        let mut expected: Vec<LocalityKey> = localities.iter().map(Locality::key).collect();
        expected.sort();
        expected.dedup();

        let mut seen: Vec<LocalityKey> = self
            .results
            .iter()
            .map(|r| r.locality.key())
            .chain(self.failures.keys().cloned())
            .collect();
        seen.sort();

        seen == expected
    }
}
