//! Resume reconciliation
//!
//! Works out which discovered adverts still have to be fetched, given the
//! URLs already present in the output file.

use std::collections::HashMap;
use std::fmt;

use crate::frontier::{Frontier, WorkItem};

/// Whether a run starts from an empty store or continues an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// Start an empty store; every discovered URL is pending
    Fresh,
    /// Append to an existing store; skip URLs it already holds
    Update,
}

impl fmt::Display for ResumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => f.write_str("fresh"),
            Self::Update => f.write_str("update"),
        }
    }
}

/// Computes `discovered - persisted` without touching either input
///
/// Every discovered URL is counted once and every persisted URL twice; only
/// URLs whose combined count is exactly one survive. A persisted URL always
/// reaches two or more and is dropped whether or not it was discovered,
/// while a URL seen only in `discovered` keeps a count of one. The result
/// follows the order of `discovered`.
///
/// `discovered` is expected to be duplicate-free, which [`Frontier`]
/// guarantees. A URL listed twice in `discovered` reaches a count of two and
/// is dropped, so the output never repeats a URL either way.
pub fn pending_work<S: AsRef<str>>(discovered: &[WorkItem], persisted: &[S]) -> Vec<WorkItem> {
    let mut multiplicity: HashMap<&str, usize> =
        HashMap::with_capacity(discovered.len() + persisted.len());

    for item in discovered {
        *multiplicity.entry(item.as_str()).or_insert(0) += 1;
    }
    for url in persisted {
        *multiplicity.entry(url.as_ref()).or_insert(0) += 2;
    }

    discovered
        .iter()
        .filter(|item| multiplicity.get(item.as_str()) == Some(&1))
        .cloned()
        .collect()
}

/// Convenience wrapper reconciling a whole frontier
pub fn reconcile<S: AsRef<str>>(frontier: &Frontier, persisted: &[S]) -> Vec<WorkItem> {
    let pending = pending_work(frontier.items(), persisted);
    tracing::info!(
        "Reconciled {} discovered against {} persisted: {} pending",
        frontier.len(),
        persisted.len(),
        pending.len()
    );
    pending
}
