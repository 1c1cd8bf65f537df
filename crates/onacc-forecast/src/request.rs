//! Request builder: locality + forecast config -> provider query.

use crate::error::ForecastError;
use crate::locality::Locality;
use crate::types::{Endpoint, ForecastConfig, ForecastRequest, Horizon};

pub const DAILY_MIN_DAYS: u32 = 1;
pub const DAILY_MAX_DAYS: u32 = 14;
pub const SEASONAL_MIN_DAYS: u32 = 45;
pub const SEASONAL_MAX_DAYS: u32 = 270;
pub const PROJECTION_MIN_YEAR: i32 = 1950;
pub const PROJECTION_MAX_YEAR: i32 = 2050;

/// Climate models offered by the projection endpoint
pub const CLIMATE_MODELS: [&str; 7] = [
    "CMCC_CM2_VHR4",
    "FGOALS_f3_H",
    "HiRAM_SIT_HR",
    "MRI_AGCM3_2_S",
    "EC_Earth3P_HR",
    "MPI_ESM1_2_XR",
    "NICAM16_8S",
];

/// Check mode-dependent bounds before anything is dispatched.
pub fn validate_config(config: &ForecastConfig) -> Result<(), ForecastError> {
    if config.variables.is_empty() {
        return Err(ForecastError::InvalidConfig(
            "at least one variable must be requested".to_string(),
        ));
    }

    match &config.horizon {
        Horizon::Daily { days } => {
            if !(DAILY_MIN_DAYS..=DAILY_MAX_DAYS).contains(days) {
                return Err(ForecastError::InvalidConfig(format!(
                    "daily forecasts cover {}-{} days, got {}",
                    DAILY_MIN_DAYS, DAILY_MAX_DAYS, days
                )));
            }
        }
        Horizon::Seasonal { days } => {
            if !(SEASONAL_MIN_DAYS..=SEASONAL_MAX_DAYS).contains(days) {
                return Err(ForecastError::InvalidConfig(format!(
                    "seasonal forecasts cover {}-{} days, got {}",
                    SEASONAL_MIN_DAYS, SEASONAL_MAX_DAYS, days
                )));
            }
        }
        Horizon::Projection {
            start_year,
            end_year,
            climate_model,
        } => {
            if *start_year < PROJECTION_MIN_YEAR || *end_year > PROJECTION_MAX_YEAR {
                return Err(ForecastError::InvalidConfig(format!(
                    "projections cover {}-{}, got {}-{}",
                    PROJECTION_MIN_YEAR, PROJECTION_MAX_YEAR, start_year, end_year
                )));
            }
            if start_year > end_year {
                return Err(ForecastError::InvalidConfig(format!(
                    "projection start year {} is after end year {}",
                    start_year, end_year
                )));
            }
            match climate_model.as_deref().map(str::trim) {
                None | Some("") => {
                    return Err(ForecastError::InvalidConfig(
                        "a climate model is required for projections".to_string(),
                    ))
                }
                Some(model) if !CLIMATE_MODELS.contains(&model) => {
                    tracing::warn!("Climate model '{}' is not in the known model list", model);
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}

/// Build the provider request for one locality.
///
/// Pure: the same inputs always produce the same parameters in the same order.
pub fn build_request(
    locality: &Locality,
    config: &ForecastConfig,
) -> Result<ForecastRequest, ForecastError> {
    validate_config(config)?;

    let mut query: Vec<(String, String)> = vec![
        ("latitude".to_string(), locality.latitude().to_string()),
        ("longitude".to_string(), locality.longitude().to_string()),
    ];
    if let Some(altitude) = locality.altitude() {
        query.push(("elevation".to_string(), altitude.to_string()));
    }

    let mut variables = config.variables.clone();
    variables.sort();
    variables.dedup();
    let daily = variables
        .iter()
        .map(|v| v.api_name())
        .collect::<Vec<_>>()
        .join(",");
    query.push(("daily".to_string(), daily));

    match &config.horizon {
        Horizon::Daily { days } => {
            query.push(("forecast_days".to_string(), days.to_string()));
            query.push(("timezone".to_string(), "auto".to_string()));
        }
        Horizon::Seasonal { days } => {
            query.push(("forecast_days".to_string(), days.to_string()));
        }
        Horizon::Projection {
            start_year,
            end_year,
            climate_model,
        } => {
            query.push(("start_date".to_string(), format!("{:04}-01-01", start_year)));
            query.push(("end_date".to_string(), format!("{:04}-12-31", end_year)));
            if let Some(model) = climate_model {
                query.push(("models".to_string(), model.trim().to_string()));
            }
        }
    }

    Ok(ForecastRequest {
        locality: locality.clone(),
        config: config.clone(),
        endpoint: Endpoint::for_mode(config.mode()),
        query,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{ForecastMode, Variable};

    fn yaounde() -> Locality {
        Locality::new("Yaoundé", 3.8480, 11.5021, Some(726.0), "Centre", "Cameroon").unwrap()
    }

    #[test]
    fn test_daily_request_parameters() {
        let req = build_request(&yaounde(), &ForecastConfig::daily(14)).unwrap();

        assert_eq!(req.endpoint, Endpoint::Forecast);
        assert_eq!(req.mode(), ForecastMode::Daily);
        assert_eq!(req.param("latitude"), Some("3.848"));
        assert_eq!(req.param("longitude"), Some("11.5021"));
        assert_eq!(req.param("elevation"), Some("726"));
        assert_eq!(
            req.param("daily"),
            Some("temperature_2m_max,temperature_2m_min,precipitation_sum")
        );
        assert_eq!(req.param("forecast_days"), Some("14"));
        assert_eq!(req.param("timezone"), Some("auto"));
    }

    #[test]
    fn test_daily_bounds() {
        for days in [0, 15, 30] {
            let err = build_request(&yaounde(), &ForecastConfig::daily(days)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        }
        for days in [1, 7, 14] {
            let req = build_request(&yaounde(), &ForecastConfig::daily(days)).unwrap();
            assert_eq!(req.param("forecast_days"), Some(days.to_string().as_str()));
        }
    }

    #[test]
    fn test_seasonal_bounds() {
        assert!(build_request(&yaounde(), &ForecastConfig::seasonal(44)).is_err());
        assert!(build_request(&yaounde(), &ForecastConfig::seasonal(271)).is_err());

        let req = build_request(&yaounde(), &ForecastConfig::seasonal(270)).unwrap();
        assert_eq!(req.endpoint, Endpoint::Seasonal);
        assert_eq!(req.param("forecast_days"), Some("270"));
        assert_eq!(req.param("timezone"), None);
    }

    #[test]
    fn test_projection_requires_model() {
        let err = build_request(&yaounde(), &ForecastConfig::projection(2020, 2040, None))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let blank = ForecastConfig::projection(2020, 2040, Some("  ".to_string()));
        assert!(build_request(&yaounde(), &blank).is_err());
    }

    #[test]
    fn test_projection_year_bounds() {
        let model = Some("MRI_AGCM3_2_S".to_string());
        assert!(build_request(&yaounde(), &ForecastConfig::projection(1949, 2000, model.clone())).is_err());
        assert!(build_request(&yaounde(), &ForecastConfig::projection(2020, 2051, model.clone())).is_err());
        assert!(build_request(&yaounde(), &ForecastConfig::projection(2040, 2020, model.clone())).is_err());

        let req = build_request(&yaounde(), &ForecastConfig::projection(2020, 2050, model)).unwrap();
        assert_eq!(req.endpoint, Endpoint::Climate);
        assert_eq!(req.param("start_date"), Some("2020-01-01"));
        assert_eq!(req.param("end_date"), Some("2050-12-31"));
        assert_eq!(req.param("models"), Some("MRI_AGCM3_2_S"));
    }

    #[test]
    fn test_variable_selection() {
        let config = ForecastConfig::daily(3)
            .with_variables(vec![Variable::Precipitation, Variable::TempMax, Variable::TempMax]);
        let req = build_request(&yaounde(), &config).unwrap();
        assert_eq!(req.param("daily"), Some("temperature_2m_max,precipitation_sum"));

        let none = ForecastConfig::daily(3).with_variables(Vec::new());
        assert!(build_request(&yaounde(), &none).is_err());
    }

    #[test]
    fn test_no_elevation_without_altitude() {
        let manual = Locality::from_coordinates(6.8399, 13.2509).unwrap();
        let req = build_request(&manual, &ForecastConfig::daily(1)).unwrap();
        assert_eq!(req.param("elevation"), None);
    }

    #[test]
    fn test_deterministic() {
        let config = ForecastConfig::seasonal(90);
        let a = build_request(&yaounde(), &config).unwrap();
        let b = build_request(&yaounde(), &config).unwrap();
        assert_eq!(a, b);
    }
}
