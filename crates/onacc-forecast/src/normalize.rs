//! Maps provider payloads into `ForecastResult`s in °C and mm.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::error::ForecastError;
use crate::locality::Locality;
use crate::payload::{RawPayload, TimeSeriesPayload};
use crate::types::{
    AnnualValues, ForecastConfig, ForecastMode, ForecastResult, ForecastSeries, Quantity,
    SeriesPoint, Variable,
};
use crate::units::{target_unit, Converter, Unit};

/// Field name carrying `variable` in a payload of the given mode.
///
/// Seasonal responses are ensembles; only the ensemble mean is used.
pub fn field_name(mode: ForecastMode, variable: Variable) -> String {
    match mode {
        ForecastMode::Seasonal => format!("{}_mean", variable.api_name()),
        ForecastMode::Daily | ForecastMode::Projection => variable.api_name().to_string(),
    }
}

/// Normalize one payload for `locality`. Pure and deterministic.
pub fn normalize(
    locality: &Locality,
    config: &ForecastConfig,
    payload: &RawPayload,
) -> Result<ForecastResult, ForecastError> {
    let mode = config.mode();
    if payload.mode() != mode {
        return Err(ForecastError::Schema(format!(
            "{} payload cannot satisfy a {} request",
            payload.mode(),
            mode
        )));
    }

    let body = payload.body();
    let dates = parse_dates(body)?;

    let mut variables = config.variables.clone();
    variables.sort();
    variables.dedup();

    let mut columns: Vec<(Variable, Vec<Option<f64>>)> = Vec::with_capacity(variables.len());
    for variable in variables {
        columns.push((variable, column(body, mode, variable, dates.len())?));
    }

    let series = match mode {
        ForecastMode::Daily | ForecastMode::Seasonal => {
            ForecastSeries::Daily(daily_points(&dates, &columns))
        }
        ForecastMode::Projection => ForecastSeries::Annual(annual_values(&dates, &columns)),
    };

    Ok(ForecastResult {
        locality: locality.clone(),
        mode,
        series,
    })
}

fn parse_dates(body: &TimeSeriesPayload) -> Result<Vec<NaiveDate>, ForecastError> {
    if body.daily.time.is_empty() {
        return Err(ForecastError::Schema("daily.time is empty".to_string()));
    }

    body.daily
        .time
        .iter()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ForecastError::Schema(format!("'{}' is not an ISO-8601 date", raw)))
        })
        .collect()
}

/// One variable's values, length-checked and converted to its target unit.
fn column(
    body: &TimeSeriesPayload,
    mode: ForecastMode,
    variable: Variable,
    expected_len: usize,
) -> Result<Vec<Option<f64>>, ForecastError> {
    let key = field_name(mode, variable);

    let values = body
        .daily
        .values
        .get(&key)
        .ok_or_else(|| ForecastError::Schema(format!("missing daily.{}", key)))?;
    if values.len() != expected_len {
        return Err(ForecastError::Schema(format!(
            "daily.{} has {} values for {} dates",
            key,
            values.len(),
            expected_len
        )));
    }

    let label = body
        .daily_units
        .get(&key)
        .ok_or_else(|| ForecastError::Schema(format!("missing daily_units.{}", key)))?;
    let unit = Unit::parse(label)
        .ok_or_else(|| ForecastError::Schema(format!("unsupported unit '{}' for {}", label, key)))?;
    if unit.quantity() != variable.quantity() {
        return Err(ForecastError::Schema(format!(
            "unit '{}' does not measure {}",
            label,
            variable.column_name()
        )));
    }
    let converter = Converter::lookup(unit, target_unit(variable.quantity())).ok_or_else(|| {
        ForecastError::Schema(format!("no conversion from '{}' for {}", label, key))
    })?;

    Ok(values.iter().map(|v| v.map(|x| converter.apply(x))).collect())
}

fn daily_points(dates: &[NaiveDate], columns: &[(Variable, Vec<Option<f64>>)]) -> Vec<SeriesPoint> {
    dates
        .iter()
        .enumerate()
        .map(|(i, &date)| {
            let mut point = SeriesPoint::new(date);
            for (variable, values) in columns {
                point.set(*variable, values[i]);
            }
            point
        })
        .collect()
}

/// Per-year aggregation: mean of daily temperatures, total precipitation.
/// Years where a variable has no values at all omit that variable.
fn annual_values(
    dates: &[NaiveDate],
    columns: &[(Variable, Vec<Option<f64>>)],
) -> Vec<AnnualValues> {
    let mut years: BTreeMap<i32, AnnualValues> = BTreeMap::new();
    for date in dates {
        years.entry(date.year()).or_insert_with(|| AnnualValues {
            year: date.year(),
            values: BTreeMap::new(),
        });
    }

    for (variable, values) in columns {
        let mut sums: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
        for (date, value) in dates.iter().zip(values) {
            if let Some(v) = value {
                let entry = sums.entry(date.year()).or_insert((0.0, 0));
                entry.0 += v;
                entry.1 += 1;
            }
        }

        for (year, (sum, count)) in sums {
            let aggregated = match variable.quantity() {
                Quantity::Temperature => sum / count as f64,
                Quantity::Precipitation => sum,
            };
            if let Some(annual) = years.get_mut(&year) {
                annual.values.insert(*variable, aggregated);
            }
        }
    }

    years.into_values().collect()
}
