//! Crawler coordinator - main harvest orchestration logic
//!
//! This module runs one harvest end to end:
//! - Fetching every listing page and collecting advert links
//! - Reconciling the discovered adverts against the output file
//! - Fetching the pending adverts through the admission controller
//! - Extracting, geocoding and appending each record as it arrives
//!
//! The coordinator is the only owner of the store, so appends happen one at
//! a time on this task while fetches overlap on the admission workers.

use crate::config::Config;
use crate::crawler::admission::{AdmissionController, AdmissionPolicy, Completion, FetchFailure};
use crate::crawler::extract::Extractor;
use crate::crawler::fetcher::Fetcher;
use crate::frontier::{listing_urls, Frontier, WorkItem};
use crate::geo::Geocoder;
use crate::output::RunReport;
use crate::reconcile::{reconcile, ResumeMode};
use crate::state::ItemState;
use crate::storage::{RecordStore, StoreError};
use crate::HarvestError;
use std::time::Instant;
use url::Url;

/// Records between two progress log lines
const PROGRESS_EVERY: u64 = 10;

/// Main harvest coordinator structure
pub struct Coordinator<F, E, G, S> {
    config: Config,
    base_url: Url,
    admission: AdmissionController<F>,
    extractor: E,
    geocoder: G,
    store: S,
    mode: ResumeMode,
}

impl<F, E, G, S> Coordinator<F, E, G, S>
where
    F: Fetcher,
    E: Extractor,
    G: Geocoder,
    S: RecordStore,
{
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `fetcher` - Performs single page requests
    /// * `extractor` - Site-specific HTML extraction
    /// * `geocoder` - City to coordinates lookup
    /// * `store` - Output store, already initialized or opened for `mode`
    /// * `mode` - Whether records already in `store` are skipped
    pub fn new(
        config: Config,
        fetcher: F,
        extractor: E,
        geocoder: G,
        store: S,
        mode: ResumeMode,
    ) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.site.base_url)?;
        let admission = AdmissionController::new(fetcher, AdmissionPolicy::from_config(&config.crawler));

        Ok(Self {
            config,
            base_url,
            admission,
            extractor,
            geocoder,
            store,
            mode,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Runs the harvest
    ///
    /// Per-advert failures are counted in the report and never end the run.
    /// Only a store that stops accepting writes is returned as an error.
    pub async fn run(&mut self) -> Result<RunReport, HarvestError> {
        let start = Instant::now();
        let mut report = RunReport::default();

        tracing::info!(
            "Starting {} harvest of {} categories",
            self.mode,
            self.config.categories.len()
        );

        let frontier = self.discover(&mut report).await?;

        let persisted = match self.mode {
            ResumeMode::Fresh => Vec::new(),
            ResumeMode::Update => self.store.load_column("url")?,
        };
        let pending = reconcile(&frontier, &persisted);

        report.discovered = frontier.len() as u64;
        report.pending = pending.len() as u64;
        report.already_persisted = report.discovered - report.pending;

        if pending.is_empty() {
            tracing::info!("Nothing new to fetch");
        } else {
            self.harvest(pending, &mut report).await?;
        }

        report.admission = self.admission.stats();
        report.elapsed = start.elapsed();

        tracing::info!(
            "Harvest completed: {} records saved, {} failed, in {:?}",
            report.persisted(),
            report.failed(),
            report.elapsed
        );

        Ok(report)
    }

    /// Fetches every listing page and collects the advert URLs on them
    async fn discover(&self, report: &mut RunReport) -> Result<Frontier, HarvestError> {
        let listings = listing_urls(
            &self.config.site,
            &self.config.categories,
            self.config.crawler.max_listing_pages,
        )?;
        report.listing_pages = listings.len() as u64;
        tracing::info!("Fetching {} listing pages", listings.len());

        let mut frontier = Frontier::new();
        let mut admission = self.admission.submit(listings.into_items());

        while let Some(completion) = admission.next().await {
            match completion {
                Completion::Fetched { item, body, .. } => {
                    let links = self.extractor.detail_links(&body);
                    let mut added = 0;
                    for href in &links {
                        match frontier.insert_link(href, &self.base_url) {
                            Ok(true) => added += 1,
                            Ok(false) => {}
                            Err(e) => tracing::debug!("Skipping link {} on {}: {}", href, item, e),
                        }
                    }
                    tracing::debug!("{}: {} links, {} new adverts", item, links.len(), added);
                }
                Completion::Failed { item, failure, .. } => {
                    report.listing_failures += 1;
                    tracing::warn!("Listing page {} skipped: {}", item, failure);
                }
            }
        }

        tracing::info!("Discovered {} unique adverts", frontier.len());
        Ok(frontier)
    }

    /// Fetches pending adverts and appends each record as it completes
    async fn harvest(
        &mut self,
        pending: Vec<WorkItem>,
        report: &mut RunReport,
    ) -> Result<(), HarvestError> {
        let mut admission = self.admission.submit(pending);
        tracing::info!(
            "Fetching {} adverts, at most {} at a time",
            admission.total(),
            self.admission.policy().max_in_flight
        );

        while let Some(completion) = admission.next().await {
            let state = match completion {
                Completion::Fetched { item, body, .. } => self.persist(&item, &body)?,
                Completion::Failed { item, failure, attempts } => {
                    tracing::warn!("{} failed after {} attempt(s): {}", item, attempts, failure);
                    match failure {
                        FetchFailure::Permanent(_) => ItemState::FetchFailed,
                        FetchFailure::RetriesExhausted(_) => ItemState::RetriesExhausted,
                    }
                }
            };
            report.record(state);

            if state.is_success() && self.store.appended() % PROGRESS_EVERY == 0 {
                tracing::info!(
                    "Progress: {} records saved, {} / {} adverts done ({:.1}%)",
                    self.store.appended(),
                    report.completed(),
                    report.pending,
                    report.progress_percent()
                );
            }
        }

        Ok(())
    }

    /// Extracts and stores one fetched advert
    fn persist(&mut self, item: &WorkItem, body: &str) -> Result<ItemState, HarvestError> {
        let mut record = match self.extractor.extract_record(item.as_str(), body) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Extraction failed: {}", e);
                return Ok(ItemState::ExtractionFailed);
            }
        };

        if self.store.schema().has_coordinates() {
            record.coordinates = record
                .city
                .as_deref()
                .and_then(|city| self.geocoder.locate(city));
        }

        match self.store.append(&record) {
            Ok(()) => {
                tracing::trace!("Saved {}", item);
                Ok(ItemState::Persisted)
            }
            Err(e @ StoreError::Encoding { .. }) => {
                tracing::warn!("Skipping record: {}", e);
                Ok(ItemState::EncodingSkipped)
            }
            Err(e) => Err(e.into()),
        }
    }
}
