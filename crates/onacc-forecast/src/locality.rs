//! Localities: validation, file import, manual coordinates and filtering.
//!
//! A `LocalityTable` is the explicit selection state handed to the pipeline.
//! It holds no network state and is never mutated by a run.

use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use serde::Serialize;

use crate::error::{ForecastError, ImportError};

/// Header names expected in a locality file
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "localite",
    "latitude",
    "longitude",
    "altitude",
    "region",
    "country",
];

const COORDINATE_TOLERANCE: f64 = 1e-6;

/// One source row: line number and raw cells
type ImportRecord = Result<(u64, Vec<String>), ImportError>;

/// Identity of a locality within a session
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LocalityKey {
    pub name: String,
    pub country: String,
}

impl std::fmt::Display for LocalityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.country.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{} ({})", self.name, self.country)
        }
    }
}

/// A named geographic point. Only constructible through validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Locality {
    name: String,
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    region: String,
    country: String,
}

impl Locality {
    pub fn new(
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        altitude: Option<f64>,
        region: impl Into<String>,
        country: impl Into<String>,
    ) -> Result<Self, ForecastError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ForecastError::InvalidConfig(
                "locality name must not be empty".to_string(),
            ));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ForecastError::InvalidConfig(format!(
                "latitude {} of '{}' is outside [-90, 90]",
                latitude, name
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ForecastError::InvalidConfig(format!(
                "longitude {} of '{}' is outside [-180, 180]",
                longitude, name
            )));
        }
        if let Some(alt) = altitude {
            if !alt.is_finite() {
                return Err(ForecastError::InvalidConfig(format!(
                    "altitude of '{}' is not a number",
                    name
                )));
            }
        }

        Ok(Self {
            name,
            latitude,
            longitude,
            altitude,
            region: region.into().trim().to_string(),
            country: country.into().trim().to_string(),
        })
    }

    /// A locality entered only by coordinates; named after them.
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Result<Self, ForecastError> {
        Self::new(
            format!("{},{}", latitude, longitude),
            latitude,
            longitude,
            None,
            "",
            "",
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn key(&self) -> LocalityKey {
        LocalityKey {
            name: self.name.clone(),
            country: self.country.clone(),
        }
    }

    fn is_at(&self, latitude: f64, longitude: f64) -> bool {
        (self.latitude - latitude).abs() < COORDINATE_TOLERANCE
            && (self.longitude - longitude).abs() < COORDINATE_TOLERANCE
    }
}

/// Region/country narrowing of a table. Empty sets match everything.
#[derive(Debug, Clone, Default)]
pub struct LocalityFilter {
    pub regions: BTreeSet<String>,
    pub countries: BTreeSet<String>,
}

impl LocalityFilter {
    pub fn matches(&self, locality: &Locality) -> bool {
        (self.regions.is_empty() || self.regions.contains(locality.region()))
            && (self.countries.is_empty() || self.countries.contains(locality.country()))
    }
}

/// A file row that could not become a locality
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub line: u64,
    pub reason: String,
}

/// Outcome of importing a locality file
#[derive(Debug, Default)]
pub struct ImportReport {
    pub table: LocalityTable,
    pub rejected: Vec<RejectedRow>,
    /// Rows without coordinates
    pub skipped: usize,
}

/// Localities unique by (name, country), in insertion order
#[derive(Debug, Clone, Default)]
pub struct LocalityTable {
    entries: Vec<Locality>,
    index: HashMap<LocalityKey, usize>,
}

impl LocalityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Locality> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str, country: &str) -> Option<&Locality> {
        let key = LocalityKey {
            name: name.to_string(),
            country: country.to_string(),
        };
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    /// Add a locality; a second entry with the same (name, country) is refused.
    pub fn insert(&mut self, locality: Locality) -> Result<(), ForecastError> {
        let key = locality.key();
        if self.index.contains_key(&key) {
            return Err(ForecastError::InvalidConfig(format!(
                "duplicate locality {}",
                key
            )));
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(locality);
        Ok(())
    }

    pub fn find_by_coordinates(&self, latitude: f64, longitude: f64) -> Option<&Locality> {
        self.entries.iter().find(|l| l.is_at(latitude, longitude))
    }

    /// Localities passing the filter, in table order
    pub fn select(&self, filter: &LocalityFilter) -> Vec<Locality> {
        self.entries
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect()
    }

    /// Distinct regions present in the table
    pub fn regions(&self) -> BTreeSet<String> {
        self.entries.iter().map(|l| l.region.clone()).collect()
    }

    /// Distinct countries present in the table
    pub fn countries(&self) -> BTreeSet<String> {
        self.entries.iter().map(|l| l.country.clone()).collect()
    }

    /// Turn manual coordinates into localities, reusing table entries when they match.
    pub fn resolve_coordinates(
        &self,
        coordinates: &[(f64, f64)],
    ) -> Result<Vec<Locality>, ForecastError> {
        coordinates
            .iter()
            .map(|&(lat, lon)| match self.find_by_coordinates(lat, lon) {
                Some(known) => Ok(known.clone()),
                None => Locality::from_coordinates(lat, lon),
            })
            .collect()
    }

    /// Read a locality file by extension: `.xlsx`/`.xls`/`.ods` spreadsheets
    /// (first sheet), `.tsv`/`.tab` tab separated, anything else comma separated.
    pub fn from_path(path: &Path) -> Result<ImportReport, ImportError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Self::from_workbook(path),
            "tsv" | "tab" => Self::from_reader(std::fs::File::open(path)?, b'\t'),
            _ => Self::from_reader(std::fs::File::open(path)?, b','),
        }
    }

    /// Import the first worksheet of a spreadsheet. Row 1 holds the headers.
    pub fn from_workbook(path: &Path) -> Result<ImportReport, ImportError> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ImportError::Spreadsheet(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::Spreadsheet("workbook has no worksheet".to_string()))?
            .map_err(|e| ImportError::Spreadsheet(e.to_string()))?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|cells| cells.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default();
        let records = rows.enumerate().map(|(i, cells)| -> ImportRecord {
            let line = i as u64 + 2;
            Ok((line, cells.iter().map(|c| c.to_string()).collect()))
        });

        import_rows(&headers, records)
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<ImportReport, ImportError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let records = rdr.records().map(|record| -> ImportRecord {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            Ok((line, record.iter().map(str::to_string).collect()))
        });

        import_rows(&headers, records)
    }
}

/// Shared import over `(line, cells)` rows from any tabular source.
fn import_rows<I>(headers: &[String], records: I) -> Result<ImportReport, ImportError>
where
    I: Iterator<Item = ImportRecord>,
{
    let positions: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !positions.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let mut report = ImportReport::default();
    for record in records {
        let (line, cells) = record?;
        let column = |name: &str| cell(&positions, &cells, name).to_string();

        let lat = column("latitude");
        let lon = column("longitude");
        if lat.is_empty() || lon.is_empty() {
            tracing::debug!("Skipping line {} without coordinates", line);
            report.skipped += 1;
            continue;
        }

        let parsed = parse_row(
            &column("localite"),
            &lat,
            &lon,
            &column("altitude"),
            &column("region"),
            &column("country"),
        )
        .and_then(|locality| report.table.insert(locality));

        if let Err(e) = parsed {
            tracing::warn!("Rejected locality on line {}: {}", line, e);
            report.rejected.push(RejectedRow {
                line,
                reason: e.to_string(),
            });
        }
    }

    tracing::info!(
        "Imported {} localities ({} rejected, {} without coordinates)",
        report.table.len(),
        report.rejected.len(),
        report.skipped
    );
    Ok(report)
}

fn cell<'a>(positions: &HashMap<String, usize>, cells: &'a [String], name: &str) -> &'a str {
    positions
        .get(name)
        .and_then(|&i| cells.get(i))
        .map(|c| c.trim())
        .unwrap_or("")
}

fn parse_row(
    name: &str,
    lat: &str,
    lon: &str,
    alt: &str,
    region: &str,
    country: &str,
) -> Result<Locality, ForecastError> {
    let number = |field: &str, raw: &str| -> Result<f64, ForecastError> {
        raw.parse::<f64>().map_err(|_| {
            ForecastError::InvalidConfig(format!("{} '{}' is not a number", field, raw))
        })
    };

    let altitude = if alt.is_empty() {
        None
    } else {
        Some(number("altitude", alt)?)
    };

    Locality::new(
        name,
        number("latitude", lat)?,
        number("longitude", lon)?,
        altitude,
        region,
        country,
    )
}

/// Parse manual coordinates such as `"6.8399,13.2509, 6.4606,13.1184"`.
///
/// Pairs are separated by `", "`, latitude and longitude by `","`.
pub fn parse_coordinates(input: &str) -> Result<Vec<(f64, f64)>, ForecastError> {
    input
        .split(", ")
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let parts: Vec<&str> = pair.split(',').map(str::trim).collect();
            let invalid = || {
                ForecastError::InvalidConfig(format!("invalid coordinate pair '{}'", pair))
            };
            if parts.len() != 2 {
                return Err(invalid());
            }
            let lat = parts[0].parse::<f64>().map_err(|_| invalid())?;
            let lon = parts[1].parse::<f64>().map_err(|_| invalid())?;
            Ok((lat, lon))
        })
        .collect()
}
