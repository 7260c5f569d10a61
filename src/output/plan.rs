//! Output file selection
//!
//! Decides which file a run writes to and whether it resumes from it,
//! based on the requested path, the `--update` flag and what is on disk.

use crate::reconcile::ResumeMode;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Where and how a run writes its records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    /// File the run appends to
    pub path: PathBuf,

    /// Whether existing records are kept and skipped
    pub mode: ResumeMode,

    /// Question to confirm before anything is written, if any
    pub prompt: Option<String>,

    /// Something the user should know about the choice
    pub notice: Option<String>,
}

/// Chooses the output file and resume mode
///
/// | On disk  | `--update` | Result                                     |
/// |----------|------------|--------------------------------------------|
/// | missing  | no         | fresh crawl into the path, confirmed       |
/// | missing  | yes        | fresh crawl into the path, confirmed       |
/// | present  | yes        | resume from the file, no prompt            |
/// | present  | no         | fresh crawl into a timestamped sibling     |
///
/// An existing file is never truncated.
pub fn plan_output(requested: &Path, update: bool, now: NaiveDateTime) -> OutputPlan {
    if requested.exists() {
        if update {
            return OutputPlan {
                path: requested.to_path_buf(),
                mode: ResumeMode::Update,
                prompt: None,
                notice: None,
            };
        }

        let alternate = alternate_path(requested, now);
        return OutputPlan {
            prompt: Some(format!(
                "{} already exists. Start a new harvest in {}?",
                requested.display(),
                alternate.display()
            )),
            notice: Some("Pass --update to continue the existing file instead".to_string()),
            path: alternate,
            mode: ResumeMode::Fresh,
        };
    }

    OutputPlan {
        path: requested.to_path_buf(),
        mode: ResumeMode::Fresh,
        prompt: Some(format!("Start a new harvest in {}?", requested.display())),
        notice: update.then(|| {
            format!(
                "{} does not exist yet, nothing to update",
                requested.display()
            )
        }),
    }
}

/// Builds `<stem>-<YYYYmmdd-HHMMSS>.<ext>` next to `requested`
///
/// A numeric suffix is added in the unlikely case that name is taken too.
fn alternate_path(requested: &Path, now: NaiveDateTime) -> PathBuf {
    let stem = requested
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "harvest".to_string());
    let extension = requested
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    let stamp = now.format("%Y%m%d-%H%M%S");

    let mut candidate = requested.with_file_name(format!("{}-{}.{}", stem, stamp, extension));
    let mut n = 2;
    while candidate.exists() {
        candidate = requested.with_file_name(format!("{}-{}-{}.{}", stem, stamp, n, extension));
        n += 1;
    }
    candidate
}
