//! State module for tracking harvest progress
//!
//! - `ItemState`: the outcome of each advert URL in a run

mod item_state;

pub use item_state::ItemState;
