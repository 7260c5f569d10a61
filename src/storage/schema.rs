//! Column sets of the output file
//!
//! Three layouts are supported. Each is a fixed, ordered list of column
//! names; records are mapped to and from rows by column name, so a file is
//! readable as long as its header names known columns.

use csv::StringRecord;
use serde::Deserialize;
use std::fmt;

use crate::geo::Coordinates;
use crate::storage::Record;

const MINIMAL_COLUMNS: &[&str] = &["name", "year", "city", "price", "url"];

const GEO_COLUMNS: &[&str] = &["name", "year", "city", "latitude", "longitude", "price", "url"];

const FULL_COLUMNS: &[&str] = &[
    "name",
    "year",
    "city",
    "latitude",
    "longitude",
    "price",
    "body",
    "engine",
    "mileage",
    "transmission",
    "drive",
    "steering",
    "color",
    "customs_cleared",
    "url",
];

/// The column layout of an output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    /// name, year, city, price, url
    #[default]
    Minimal,
    /// Minimal plus city coordinates
    Geo,
    /// Geo plus the vehicle parameters
    Full,
}

impl SchemaVariant {
    /// Column names in file order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Minimal => MINIMAL_COLUMNS,
            Self::Geo => GEO_COLUMNS,
            Self::Full => FULL_COLUMNS,
        }
    }

    /// Whether records in this layout carry coordinates
    pub fn has_coordinates(&self) -> bool {
        matches!(self, Self::Geo | Self::Full)
    }

    /// Renders a record as one row in this layout
    pub fn to_row(&self, record: &Record) -> Vec<String> {
        self.columns()
            .iter()
            .map(|column| field_value(record, column))
            .collect()
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimal => f.write_str("minimal"),
            Self::Geo => f.write_str("geo"),
            Self::Full => f.write_str("full"),
        }
    }
}

/// Rebuilds a record from a row, using the file's own header
///
/// Unknown columns are ignored; numeric columns that do not parse are left
/// unset. Text columns come back exactly as stored, an empty one as `None`.
pub fn record_from_row(headers: &StringRecord, row: &StringRecord) -> Record {
    let mut record = Record::default();
    let mut latitude = None;
    let mut longitude = None;

    for (column, value) in headers.iter().zip(row.iter()) {
        let optional = || (!value.is_empty()).then(|| value.to_string());
        let number = value.trim();
        match column {
            "url" => record.url = value.to_string(),
            "name" => record.name = optional(),
            "year" => record.year = number.parse().ok(),
            "city" => record.city = optional(),
            "price" => record.price = number.parse().ok(),
            "latitude" => latitude = number.parse::<f64>().ok(),
            "longitude" => longitude = number.parse::<f64>().ok(),
            "body" => record.attributes.body = optional(),
            "engine" => record.attributes.engine = optional(),
            "mileage" => record.attributes.mileage = optional(),
            "transmission" => record.attributes.transmission = optional(),
            "drive" => record.attributes.drive = optional(),
            "steering" => record.attributes.steering = optional(),
            "color" => record.attributes.color = optional(),
            "customs_cleared" => record.attributes.customs_cleared = optional(),
            _ => {}
        }
    }

    if let (Some(latitude), Some(longitude)) = (latitude, longitude) {
        record.coordinates = Some(Coordinates {
            latitude,
            longitude,
        });
    }

    record
}

fn field_value(record: &Record, column: &str) -> String {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    match column {
        "url" => record.url.clone(),
        "name" => text(&record.name),
        "year" => record.year.map(|y| y.to_string()).unwrap_or_default(),
        "city" => text(&record.city),
        "price" => record.price.map(|p| p.to_string()).unwrap_or_default(),
        "latitude" => record
            .coordinates
            .map(|c| c.latitude.to_string())
            .unwrap_or_default(),
        "longitude" => record
            .coordinates
            .map(|c| c.longitude.to_string())
            .unwrap_or_default(),
        "body" => text(&record.attributes.body),
        "engine" => text(&record.attributes.engine),
        "mileage" => text(&record.attributes.mileage),
        "transmission" => text(&record.attributes.transmission),
        "drive" => text(&record.attributes.drive),
        "steering" => text(&record.attributes.steering),
        "color" => text(&record.attributes.color),
        "customs_cleared" => text(&record.attributes.customs_cleared),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut record = Record::new("https://kolesa.kz/a/show/5");
        record.name = Some("Toyota Camry".to_string());
        record.year = Some(2018);
        record.city = Some("Алматы".to_string());
        record.price = Some(12_500_000);
        record.coordinates = Some(Coordinates {
            latitude: 43.25,
            longitude: 76.95,
        });
        record.attributes.body = Some("седан".to_string());
        record
    }

    #[test]
    fn test_url_is_last_column() {
        for variant in [SchemaVariant::Minimal, SchemaVariant::Geo, SchemaVariant::Full] {
            assert_eq!(variant.columns().last(), Some(&"url"));
            assert_eq!(variant.columns()[0], "name");
        }
    }

    #[test]
    fn test_minimal_row() {
        let row = SchemaVariant::Minimal.to_row(&sample());
        assert_eq!(
            row,
            vec![
                "Toyota Camry",
                "2018",
                "Алматы",
                "12500000",
                "https://kolesa.kz/a/show/5"
            ]
        );
    }

    #[test]
    fn test_geo_row_with_missing_coordinates() {
        let mut record = sample();
        record.coordinates = None;
        let row = SchemaVariant::Geo.to_row(&record);
        assert_eq!(row[3], "");
        assert_eq!(row[4], "");
    }

    #[test]
    fn test_full_row_restores_record() {
        let headers = StringRecord::from(SchemaVariant::Full.columns().to_vec());
        let row = StringRecord::from(SchemaVariant::Full.to_row(&sample()));
        assert_eq!(record_from_row(&headers, &row), sample());
    }

    #[test]
    fn test_minimal_row_drops_extra_fields() {
        let headers = StringRecord::from(SchemaVariant::Minimal.columns().to_vec());
        let row = StringRecord::from(SchemaVariant::Minimal.to_row(&sample()));
        let restored = record_from_row(&headers, &row);

        assert_eq!(restored.url, "https://kolesa.kz/a/show/5");
        assert_eq!(restored.price, Some(12_500_000));
        assert!(restored.coordinates.is_none());
        assert!(restored.attributes.body.is_none());
    }

    #[test]
    fn test_text_fields_restored_verbatim() {
        let mut record = sample();
        record.name = Some("  \"Camry\", 70 кузов ".to_string());
        record.attributes.engine = Some("  2.5 ".to_string());

        let headers = StringRecord::from(SchemaVariant::Full.columns().to_vec());
        let row = StringRecord::from(SchemaVariant::Full.to_row(&record));
        assert_eq!(record_from_row(&headers, &row), record);
    }

    #[test]
    fn test_padded_numbers_still_parse() {
        let headers = StringRecord::from(vec!["year", "price", "url"]);
        let row = StringRecord::from(vec![" 2018 ", "12500000 ", "u"]);
        let record = record_from_row(&headers, &row);
        assert_eq!(record.year, Some(2018));
        assert_eq!(record.price, Some(12_500_000));
    }

    #[test]
    fn test_unparsable_numbers_left_unset() {
        let headers = StringRecord::from(vec!["year", "price", "url"]);
        let row = StringRecord::from(vec!["20xx", "договорная", "u"]);
        let record = record_from_row(&headers, &row);
        assert_eq!(record.year, None);
        assert_eq!(record.price, None);
    }
}
