//! Geocoding of advert cities
//!
//! Optional enrichment: when the output columns include coordinates, the
//! pipeline asks a [`Geocoder`] for the advert's city. An unknown city simply
//! leaves the coordinate columns empty.

use std::collections::HashMap;

use crate::config::CityEntry;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Resolves place names to coordinates
pub trait Geocoder {
    /// Returns the coordinates of `place`, or `None` if it is unknown
    fn locate(&self, place: &str) -> Option<Coordinates>;
}

/// Geocoder backed by a fixed table of cities
///
/// Lookups ignore case and surrounding whitespace.
#[derive(Debug, Clone, Default)]
pub struct TableGeocoder {
    cities: HashMap<String, Coordinates>,
}

impl TableGeocoder {
    pub fn new(entries: &[CityEntry]) -> Self {
        let cities = entries
            .iter()
            .map(|entry| {
                (
                    normalize_place(&entry.name),
                    Coordinates {
                        latitude: entry.latitude,
                        longitude: entry.longitude,
                    },
                )
            })
            .collect();
        Self { cities }
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

impl Geocoder for TableGeocoder {
    fn locate(&self, place: &str) -> Option<Coordinates> {
        self.cities.get(&normalize_place(place)).copied()
    }
}

fn normalize_place(place: &str) -> String {
    place.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableGeocoder {
        TableGeocoder::new(&[
            CityEntry {
                name: "Алматы".to_string(),
                latitude: 43.238,
                longitude: 76.945,
            },
            CityEntry {
                name: "Astana".to_string(),
                latitude: 51.169,
                longitude: 71.449,
            },
        ])
    }

    #[test]
    fn test_locate_known_city() {
        assert_eq!(
            table().locate("ASTANA"),
            Some(Coordinates {
                latitude: 51.169,
                longitude: 71.449
            })
        );
    }

    #[test]
    fn test_locate_ignores_case_and_whitespace() {
        assert!(table().locate("  алматы ").is_some());
    }

    #[test]
    fn test_unknown_city() {
        assert_eq!(table().locate("Шымкент"), None);
        assert!(TableGeocoder::default().locate("Алматы").is_none());
    }
}
