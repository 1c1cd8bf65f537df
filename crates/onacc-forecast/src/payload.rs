//! Raw provider responses, one tagged variant per forecast mode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::types::ForecastMode;

/// `daily` block: a shared time axis plus one array per variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBlock {
    pub time: Vec<String>,
    #[serde(flatten)]
    pub values: BTreeMap<String, Vec<Option<f64>>>,
}

/// Body shared by the forecast, seasonal and climate endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPayload {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub daily_units: BTreeMap<String, String>,
    pub daily: DailyBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Daily(TimeSeriesPayload),
    Seasonal(TimeSeriesPayload),
    Projection(TimeSeriesPayload),
}

impl RawPayload {
    /// Structural check of a response body for the mode that requested it.
    pub fn from_json(mode: ForecastMode, body: &str) -> Result<Self, ForecastError> {
        let payload: TimeSeriesPayload = serde_json::from_str(body)
            .map_err(|e| ForecastError::Schema(format!("{} response: {}", mode, e)))?;

        Ok(match mode {
            ForecastMode::Daily => Self::Daily(payload),
            ForecastMode::Seasonal => Self::Seasonal(payload),
            ForecastMode::Projection => Self::Projection(payload),
        })
    }

    pub fn mode(&self) -> ForecastMode {
        match self {
            Self::Daily(_) => ForecastMode::Daily,
            Self::Seasonal(_) => ForecastMode::Seasonal,
            Self::Projection(_) => ForecastMode::Projection,
        }
    }

    pub fn body(&self) -> &TimeSeriesPayload {
        match self {
            Self::Daily(p) | Self::Seasonal(p) | Self::Projection(p) => p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_forecast_body() {
        let body = r#"{
            "latitude": 3.85,
            "longitude": 11.5,
            "elevation": 726.0,
            "generationtime_ms": 0.1,
            "timezone": "Africa/Douala",
            "daily_units": {"time": "iso8601", "temperature_2m_max": "°C"},
            "daily": {"time": ["2025-01-01", "2025-01-02"], "temperature_2m_max": [30.1, null]}
        }"#;

        let payload = RawPayload::from_json(ForecastMode::Daily, body).unwrap();
        assert_eq!(payload.mode(), ForecastMode::Daily);

        let daily = &payload.body().daily;
        assert_eq!(daily.time.len(), 2);
        assert_eq!(
            daily.values.get("temperature_2m_max"),
            Some(&vec![Some(30.1), None])
        );
    }

    #[test]
    fn test_integers_accepted_as_numbers() {
        let body = r#"{"daily_units": {}, "daily": {"time": ["2030-01-01"], "precipitation_sum": [0]}}"#;
        let payload = RawPayload::from_json(ForecastMode::Projection, body).unwrap();
        assert_eq!(
            payload.body().daily.values.get("precipitation_sum"),
            Some(&vec![Some(0.0)])
        );
    }

    #[test]
    fn test_missing_daily_block_is_schema_error() {
        let err = RawPayload::from_json(ForecastMode::Seasonal, r#"{"hourly": {}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaError);
    }

    #[test]
    fn test_non_numeric_series_is_schema_error() {
        let body = r#"{"daily": {"time": ["2025-01-01"], "weather": ["sunny"]}}"#;
        assert!(RawPayload::from_json(ForecastMode::Daily, body).is_err());
    }

    #[test]
    fn test_not_json_is_schema_error() {
        let err = RawPayload::from_json(ForecastMode::Daily, "<html>oops</html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaError);
    }
}
