//! Crawler module for page fetching and processing
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with failure classification
//! - Admission control (in-flight bound, cool-down, retries)
//! - HTML extraction of advert links and records
//! - Overall harvest coordination

mod admission;
mod coordinator;
mod extract;
mod fetcher;

pub use admission::{
    Admission, AdmissionController, AdmissionPolicy, AdmissionSnapshot, Completion, FetchFailure,
};
pub use coordinator::Coordinator;
pub use extract::{ExtractError, Extractor, SelectorExtractor};
pub use fetcher::{build_http_client, FetchCause, FetchOutcome, Fetcher, HttpFetcher};

use crate::config::Config;
use crate::geo::TableGeocoder;
use crate::output::RunReport;
use crate::reconcile::ResumeMode;
use crate::storage::{Codepage, CsvStore};
use crate::HarvestError;
use std::path::Path;

/// Runs a complete harvest into a CSV file
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Build the HTTP fetcher, extractor and geocoder from config
/// 2. Create the output file (fresh) or open and repair it (update)
/// 3. Discover adverts, reconcile them and fetch what is missing
///
/// The file is valid at every record boundary, so the returned future can be
/// dropped at any point (e.g. on Ctrl-C) without losing saved records.
pub async fn crawl(
    config: Config,
    output: &Path,
    mode: ResumeMode,
) -> Result<RunReport, HarvestError> {
    let fetcher = HttpFetcher::new(&config)?;
    let extractor = SelectorExtractor::new(&config.selectors)?;
    let geocoder = TableGeocoder::new(&config.cities);

    let codepage = Codepage::from_label(&config.output.encoding)?;
    let schema = config.output.columns;

    let store = match mode {
        ResumeMode::Fresh => CsvStore::initialize(output, schema, codepage)?,
        ResumeMode::Update => CsvStore::open(output, schema, codepage)?,
    }
    .with_sync(config.output.sync_each_record);
    tracing::info!(
        "Writing {} records to {} ({})",
        schema,
        output.display(),
        codepage.name()
    );
    if schema.has_coordinates() {
        if geocoder.is_empty() {
            tracing::warn!("No [[city]] entries configured, coordinates will be left empty");
        } else {
            tracing::debug!("Geocoding against {} cities", geocoder.len());
        }
    }

    let mut coordinator = Coordinator::new(config, fetcher, extractor, geocoder, store, mode)?;
    let mut report = coordinator.run().await?;
    report.output = output.to_path_buf();
    Ok(report)
}
