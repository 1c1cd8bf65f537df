//! Climate forecast aggregation for Onacc
//!
//! Imports a locality reference table, builds Open-Meteo requests for daily,
//! seasonal and long-range projection horizons, fetches them concurrently,
//! normalizes every series to °C and mm, and exports the combined outcome.

pub mod client;
pub mod error;
pub mod export;
pub mod locality;
pub mod normalize;
pub mod payload;
pub mod pipeline;
pub mod request;
pub mod retry;
pub mod types;
pub mod units;

pub use client::ForecastClient;
pub use error::{ErrorKind, ExportError, ForecastError, ImportError, PipelineError};
pub use export::{read_rows, write_failures, write_results, write_results_to_path, ExportRow};
pub use locality::{parse_coordinates, ImportReport, Locality, LocalityFilter, LocalityKey, LocalityTable};
pub use normalize::normalize;
pub use payload::RawPayload;
pub use pipeline::Pipeline;
pub use request::{build_request, validate_config};
pub use retry::RetryConfig;
pub use types::*;
