//! Storage module for persisting extracted adverts
//!
//! This module handles the output file of a harvest, including:
//! - The [`Record`] type written once per advert
//! - Column sets ([`SchemaVariant`]) and their mapping to records
//! - Codepage conversion at the file boundary
//! - Crash-safe, append-only CSV persistence with resume support

mod csv_store;
mod encoding;
mod schema;
mod traits;

pub use csv_store::CsvStore;
pub use encoding::Codepage;
pub use schema::SchemaVariant;
pub use traits::{RecordStore, StoreError, StoreResult};

use crate::geo::Coordinates;

/// One extracted advert, keyed by the URL it was fetched from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub url: String,
    pub name: Option<String>,
    pub year: Option<u16>,
    pub city: Option<String>,
    /// Asking price in whole currency units
    pub price: Option<u64>,
    pub coordinates: Option<Coordinates>,
    pub attributes: VehicleAttributes,
}

impl Record {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Vehicle parameters listed on an advert's detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleAttributes {
    pub body: Option<String>,
    pub engine: Option<String>,
    pub mileage: Option<String>,
    pub transmission: Option<String>,
    pub drive: Option<String>,
    pub steering: Option<String>,
    pub color: Option<String>,
    pub customs_cleared: Option<String>,
}
