//! Run statistics
//!
//! This module collects the numbers of one harvest run and prints them
//! as a summary once the run ends.

use crate::crawler::AdmissionSnapshot;
use crate::state::ItemState;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Summary of one harvest run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// File the records were appended to
    pub output: PathBuf,

    /// Listing pages built from the category list
    pub listing_pages: u64,

    /// Listing pages that could not be fetched
    pub listing_failures: u64,

    /// Unique advert URLs found on the listing pages
    pub discovered: u64,

    /// Discovered adverts already present in the output file
    pub already_persisted: u64,

    /// Adverts scheduled for fetching this run
    pub pending: u64,

    /// Final state of each scheduled advert
    pub outcomes: HashMap<ItemState, u64>,

    /// Admission counters at the end of the run
    pub admission: AdmissionSnapshot,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// Counts one advert ending in `state`
    pub fn record(&mut self, state: ItemState) {
        *self.outcomes.entry(state).or_insert(0) += 1;
    }

    pub fn count(&self, state: ItemState) -> u64 {
        self.outcomes.get(&state).copied().unwrap_or(0)
    }

    /// Adverts that reached a final state
    pub fn completed(&self) -> u64 {
        self.outcomes.values().sum()
    }

    pub fn persisted(&self) -> u64 {
        self.count(ItemState::Persisted)
    }

    pub fn failed(&self) -> u64 {
        self.outcomes
            .iter()
            .filter(|(state, _)| state.is_error())
            .map(|(_, count)| count)
            .sum()
    }

    /// Percentage of pending adverts that reached a final state
    pub fn progress_percent(&self) -> f64 {
        percent(self.completed(), self.pending)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        100.0
    }
}

/// Prints a run report to stdout in a formatted manner
pub fn print_report(report: &RunReport) {
    println!("=== Harvest Summary ===\n");

    println!("Output: {}", report.output.display());
    println!("Duration: {:.1}s", report.elapsed.as_secs_f64());
    println!();

    println!("Discovery:");
    println!("  Listing pages: {}", report.listing_pages);
    if report.listing_failures > 0 {
        println!("  Listing pages failed: {}", report.listing_failures);
    }
    println!("  Adverts discovered: {}", report.discovered);
    println!("  Already in file: {}", report.already_persisted);
    println!("  Scheduled this run: {}", report.pending);
    println!();

    if !report.outcomes.is_empty() {
        println!("Adverts by State:");
        let mut state_counts: Vec<_> = report.outcomes.iter().collect();
        state_counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        for (state, count) in state_counts {
            println!(
                "  {}: {} ({:.1}%)",
                state,
                count,
                percent(*count, report.pending)
            );
        }
        println!();
    }

    println!("Admission:");
    println!("  Requests: {}", report.admission.fetches);
    println!("  Peak in flight: {}", report.admission.peak_in_flight);
    println!("  Retries: {}", report.admission.retries);
    println!("  Cool-downs: {}", report.admission.cooldowns);
    println!();

    println!(
        "Completed: {:.1}% ({} / {} adverts, {} saved, {} failed)",
        report.progress_percent(),
        report.completed(),
        report.pending,
        report.persisted(),
        report.failed()
    );
}
