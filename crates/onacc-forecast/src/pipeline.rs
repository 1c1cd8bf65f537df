//! Aggregation pipeline: build -> fetch -> normalize for every locality.
//!
//! Localities are fetched concurrently (bounded by a semaphore) and each task
//! owns one output slot. The outcome is assembled only after every task has
//! resolved, so a `RunOutcome` is always complete: each input locality is
//! either a result or a failure, exactly once.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use onacc_core::PipelineConfig;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::client::ForecastClient;
use crate::error::{ForecastError, PipelineError};
use crate::locality::Locality;
use crate::normalize::normalize;
use crate::request::{build_request, validate_config};
use crate::retry::{with_retry, RetryConfig};
use crate::types::{Failure, ForecastConfig, ForecastMode, ForecastResult, RunOutcome};

type SlotOutcome = Result<ForecastResult, ForecastError>;

#[derive(Debug, Clone)]
pub struct Pipeline {
    client: ForecastClient,
    retry: RetryConfig,
    max_concurrency: usize,
}

impl Pipeline {
    pub fn new(client: ForecastClient, settings: &PipelineConfig) -> Self {
        Self {
            client,
            retry: RetryConfig::from_pipeline_config(settings),
            max_concurrency: settings.max_concurrency.max(1),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Run one forecast pass over `localities`.
    ///
    /// Per-locality failures never abort the run; they end up in
    /// `RunOutcome::failures`. An invalid `config` fails every locality with
    /// `InvalidConfig` without issuing any request. Only an empty selection
    /// is an error.
    #[instrument(skip_all, fields(mode = %config.mode(), localities = localities.len()))]
    pub async fn run(
        &self,
        localities: &[Locality],
        config: &ForecastConfig,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        if localities.is_empty() {
            return Err(PipelineError::NoLocalities);
        }

        let selection = unique_localities(localities);
        let mode = config.mode();

        if let Err(e) = validate_config(config) {
            tracing::warn!("Forecast configuration rejected: {}", e);
            let failures = selection
                .into_iter()
                .map(|l| (l.key(), Failure::from_error(l, &e)))
                .collect();
            return Ok(RunOutcome {
                mode,
                results: Vec::new(),
                failures,
            });
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let config = Arc::new(config.clone());
        let mut tasks = JoinSet::new();

        for (slot, locality) in selection.iter().cloned().enumerate() {
            let client = self.client.clone();
            let retry = self.retry.clone();
            let semaphore = Arc::clone(&semaphore);
            let config = Arc::clone(&config);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ForecastError::Cancelled),
                    outcome = forecast_locality(&client, &retry, &semaphore, &locality, &config) => outcome,
                };
                match &outcome {
                    Ok(result) => tracing::debug!(
                        "{}: {} rows",
                        locality.name(),
                        result.series.len()
                    ),
                    Err(e) => tracing::debug!("{}: {}", locality.name(), e),
                }
                (slot, outcome)
            });
        }

        // Fan-in barrier: every task resolves before the outcome exists.
        let mut slots: Vec<Option<SlotOutcome>> = (0..selection.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, outcome)) => slots[slot] = Some(outcome),
                Err(e) => tracing::error!("Forecast task ended abnormally: {}", e),
            }
        }

        let outcome = assemble(mode, selection, slots);
        tracing::info!(
            "Forecast run finished: {} results, {} failures",
            outcome.results.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }
}

/// Merge per-slot outcomes in input order. A slot left empty (its task was
/// lost before reporting) counts as `Cancelled`.
fn assemble(
    mode: ForecastMode,
    selection: Vec<Locality>,
    slots: Vec<Option<SlotOutcome>>,
) -> RunOutcome {
    let mut results = Vec::new();
    let mut failures = BTreeMap::new();
    for (locality, slot) in selection.into_iter().zip(slots) {
        match slot.unwrap_or(Err(ForecastError::Cancelled)) {
            Ok(result) => results.push(result),
            Err(e) => {
                failures.insert(locality.key(), Failure::from_error(locality, &e));
            }
        }
    }

    RunOutcome {
        mode,
        results,
        failures,
    }
}

async fn forecast_locality(
    client: &ForecastClient,
    retry: &RetryConfig,
    semaphore: &Semaphore,
    locality: &Locality,
    config: &ForecastConfig,
) -> SlotOutcome {
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|_| ForecastError::Cancelled)?;

    let request = build_request(locality, config)?;
    let request = &request;
    let payload = with_retry(retry, move || client.fetch(request)).await?;
    normalize(locality, config, &payload)
}

/// First occurrence of each (name, country), in input order
fn unique_localities(localities: &[Locality]) -> Vec<Locality> {
    let mut seen = HashSet::new();
    localities
        .iter()
        .filter(|l| {
            let fresh = seen.insert(l.key());
            if !fresh {
                tracing::warn!("Ignoring duplicate locality {}", l.key());
            }
            fresh
        })
        .cloned()
        .collect()
}
