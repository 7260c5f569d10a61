//! URL handling module for Kolesa-Harvest
//!
//! Turns the hrefs found on listing pages into canonical absolute URLs so
//! that the frontier and the resume check compare like with like.

mod normalize;

pub use normalize::{normalize_url, resolve_link};
