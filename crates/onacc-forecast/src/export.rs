//! Export of run outcomes to CSV, TSV or xlsx, and the matching reader.
//!
//! Column order is fixed per mode. The locality column holds the locality
//! key (`name (country)`), so same-named places in different countries stay
//! distinct. In delimited text, numbers use Rust's shortest round-trip
//! formatting (always `.` as decimal separator), dates are `YYYY-MM-DD` and
//! absent values are empty cells. Workbooks store numbers as numeric cells and
//! dates as text.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use calamine::{Reader, Xlsx};
use chrono::NaiveDate;
use onacc_core::ExportFormat;
use rust_xlsxwriter::Workbook;

use crate::error::ExportError;
use crate::types::{ForecastMode, ForecastSeries, RunOutcome, Variable};

pub const SERIES_COLUMNS: [&str; 5] = ["locality", "date", "temp_max", "temp_min", "precipitation"];
pub const PROJECTION_COLUMNS: [&str; 4] = ["locality", "year", "variable", "value"];
pub const FAILURE_COLUMNS: [&str; 4] = ["locality", "country", "error", "message"];

/// One exported line
#[derive(Debug, Clone, PartialEq)]
pub enum ExportRow {
    Series {
        locality: String,
        date: NaiveDate,
        temp_max: Option<f64>,
        temp_min: Option<f64>,
        precipitation: Option<f64>,
    },
    Projection {
        locality: String,
        year: i32,
        variable: Variable,
        value: f64,
    },
}

impl ExportRow {
    pub fn locality(&self) -> &str {
        match self {
            Self::Series { locality, .. } | Self::Projection { locality, .. } => locality,
        }
    }

    fn to_cells(&self) -> Vec<Cell> {
        match self {
            Self::Series {
                locality,
                date,
                temp_max,
                temp_min,
                precipitation,
            } => vec![
                Cell::Text(locality.clone()),
                Cell::Text(date.format("%Y-%m-%d").to_string()),
                Cell::optional(*temp_max),
                Cell::optional(*temp_min),
                Cell::optional(*precipitation),
            ],
            Self::Projection {
                locality,
                year,
                variable,
                value,
            } => vec![
                Cell::Text(locality.clone()),
                Cell::Number(f64::from(*year)),
                Cell::Text(variable.column_name().to_string()),
                Cell::Number(*value),
            ],
        }
    }
}

/// A typed output cell; text formats flatten it, workbooks keep numbers numeric.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    fn optional(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }

    fn to_text(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

pub fn columns(mode: ForecastMode) -> &'static [&'static str] {
    match mode {
        ForecastMode::Daily | ForecastMode::Seasonal => &SERIES_COLUMNS,
        ForecastMode::Projection => &PROJECTION_COLUMNS,
    }
}

/// Flatten the successful results of an outcome into export rows.
/// Failures are never exported here; see `write_failures`.
pub fn rows(outcome: &RunOutcome) -> Vec<ExportRow> {
    let mut rows = Vec::new();
    for result in &outcome.results {
        let locality = result.locality.key().to_string();
        match &result.series {
            ForecastSeries::Daily(points) => {
                rows.extend(points.iter().map(|p| ExportRow::Series {
                    locality: locality.clone(),
                    date: p.date,
                    temp_max: p.temp_max,
                    temp_min: p.temp_min,
                    precipitation: p.precipitation,
                }));
            }
            ForecastSeries::Annual(years) => {
                for annual in years {
                    rows.extend(annual.values.iter().map(|(variable, value)| {
                        ExportRow::Projection {
                            locality: locality.clone(),
                            year: annual.year,
                            variable: *variable,
                            value: *value,
                        }
                    }));
                }
            }
        }
    }
    rows
}

/// Write the results table; returns the number of data rows.
pub fn write_results<W: Write>(
    outcome: &RunOutcome,
    format: ExportFormat,
    writer: W,
) -> Result<usize, ExportError> {
    let rows = rows(outcome);
    let table: Vec<Vec<Cell>> = rows.iter().map(ExportRow::to_cells).collect();
    write_table(format, "Forecast", columns(outcome.mode), &table, writer)?;
    Ok(rows.len())
}

pub fn write_results_to_path(
    outcome: &RunOutcome,
    format: ExportFormat,
    path: &Path,
) -> Result<usize, ExportError> {
    let file = std::fs::File::create(path)?;
    let count = write_results(outcome, format, std::io::BufWriter::new(file))?;
    tracing::info!("Exported {} rows to {}", count, path.display());
    Ok(count)
}

/// Failure manifest: one line per failed locality.
pub fn write_failures<W: Write>(
    outcome: &RunOutcome,
    format: ExportFormat,
    writer: W,
) -> Result<usize, ExportError> {
    let table: Vec<Vec<Cell>> = outcome
        .failures
        .values()
        .map(|failure| {
            vec![
                Cell::Text(failure.locality.name().to_string()),
                Cell::Text(failure.locality.country().to_string()),
                Cell::Text(failure.kind.as_str().to_string()),
                Cell::Text(failure.message.clone()),
            ]
        })
        .collect();
    write_table(format, "Failures", &FAILURE_COLUMNS, &table, writer)?;
    Ok(table.len())
}

fn write_table<W: Write>(
    format: ExportFormat,
    sheet: &str,
    header: &[&str],
    table: &[Vec<Cell>],
    mut writer: W,
) -> Result<(), ExportError> {
    let Some(delimiter) = format.delimiter() else {
        let buffer = workbook_bytes(sheet, header, table)?;
        writer.write_all(&buffer)?;
        writer.flush()?;
        return Ok(());
    };

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    wtr.write_record(header)?;
    for row in table {
        wtr.write_record(row.iter().map(Cell::to_text))?;
    }
    wtr.flush()?;
    Ok(())
}

fn workbook_bytes(sheet: &str, header: &[&str], table: &[Vec<Cell>]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet)?;
        for (col, name) in header.iter().enumerate() {
            worksheet.write_string(0, col as u16, *name)?;
        }
        for (i, row) in table.iter().enumerate() {
            let line = i as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(text) => {
                        worksheet.write_string(line, col as u16, text.as_str())?;
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(line, col as u16, *n)?;
                    }
                    Cell::Empty => {}
                }
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

/// Read an exported results file back into rows.
pub fn read_rows<R: Read>(
    mode: ForecastMode,
    format: ExportFormat,
    reader: R,
) -> Result<Vec<ExportRow>, ExportError> {
    let (headers, records) = match format.delimiter() {
        Some(delimiter) => read_delimited(delimiter, reader)?,
        None => read_workbook(reader)?,
    };

    let expected = columns(mode);
    if !headers.iter().map(String::as_str).eq(expected.iter().copied()) {
        return Err(ExportError::Parse {
            line: 1,
            message: format!(
                "expected columns {}, found {}",
                expected.join(","),
                headers.join(",")
            ),
        });
    }

    records
        .into_iter()
        .map(|(line, cells)| parse_row(mode, line, &cells))
        .collect()
}

type Records = (Vec<String>, Vec<(u64, Vec<String>)>);

fn read_delimited<R: Read>(delimiter: u8, reader: R) -> Result<Records, ExportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(reader);

    let headers = rdr.headers()?.iter().map(str::to_string).collect();
    let mut records = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        records.push((line, record.iter().map(str::to_string).collect()));
    }
    Ok((headers, records))
}

fn read_workbook<R: Read>(mut reader: R) -> Result<Records, ExportError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| ExportError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExportError::Spreadsheet("workbook has no worksheet".to_string()))?
        .map_err(|e| ExportError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|cells| cells.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();
    let records = rows
        .enumerate()
        .map(|(i, cells)| (i as u64 + 2, cells.iter().map(|c| c.to_string()).collect()))
        .collect();
    Ok((headers, records))
}

fn parse_row(mode: ForecastMode, line: u64, cells: &[String]) -> Result<ExportRow, ExportError> {
    let field = |i: usize| cells.get(i).map(String::as_str).unwrap_or("");
    let bad = |message: String| ExportError::Parse { line, message };

    Ok(match mode {
        ForecastMode::Daily | ForecastMode::Seasonal => ExportRow::Series {
            locality: field(0).to_string(),
            date: NaiveDate::parse_from_str(field(1), "%Y-%m-%d")
                .map_err(|e| bad(format!("date '{}': {}", field(1), e)))?,
            temp_max: parse_optional(field(2)).map_err(bad)?,
            temp_min: parse_optional(field(3)).map_err(bad)?,
            precipitation: parse_optional(field(4)).map_err(bad)?,
        },
        ForecastMode::Projection => ExportRow::Projection {
            locality: field(0).to_string(),
            year: field(1)
                .parse()
                .map_err(|_| bad(format!("year '{}' is not a number", field(1))))?,
            variable: field(2)
                .parse()
                .map_err(|_| bad(format!("unknown variable '{}'", field(2))))?,
            value: field(3)
                .parse()
                .map_err(|_| bad(format!("value '{}' is not a number", field(3))))?,
        },
    })
}

fn parse_optional(raw: &str) -> Result<Option<f64>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| format!("'{}' is not a number", raw))
}
