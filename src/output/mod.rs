//! Output module for run planning and reporting
//!
//! This module handles:
//! - Choosing the output file and resume mode for a run
//! - Collecting and printing run statistics

pub mod plan;
pub mod stats;

pub use plan::{plan_output, OutputPlan};
pub use stats::{print_report, RunReport};
