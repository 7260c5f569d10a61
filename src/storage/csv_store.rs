//! CSV storage implementation
//!
//! The file is a header row followed by one `\n`-terminated row per record.
//! Each record is rendered, encoded and written with a single `write_all`,
//! so the last `\n` in the file always marks the end of the last complete
//! record. Anything after it is a torn write and is ignored on read and cut
//! off when the store is reopened.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::storage::schema::record_from_row;
use crate::storage::traits::{RecordStore, StoreError, StoreResult};
use crate::storage::{Codepage, Record, SchemaVariant};

/// CSV storage backend
pub struct CsvStore {
    path: PathBuf,
    file: File,
    schema: SchemaVariant,
    codepage: Codepage,
    sync_each_record: bool,
    appended: u64,
}

impl CsvStore {
    /// Creates an empty store containing only the header row
    ///
    /// An existing file at `path` is truncated.
    ///
    /// # Returns
    ///
    /// * `Ok(CsvStore)` - Store ready for appends
    /// * `Err(StoreError::Unavailable)` - The path cannot be created or written
    pub fn initialize(path: &Path, schema: SchemaVariant, codepage: Codepage) -> StoreResult<Self> {
        let header: Vec<String> = schema.columns().iter().map(|c| c.to_string()).collect();
        let bytes = encode_row(&header, codepage).ok_or(StoreError::Encoding {
            url: "<header>".to_string(),
            codepage: codepage.name(),
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| unavailable(path, source))?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|source| unavailable(path, source))?;

        tracing::debug!("Initialized {} store at {}", schema, path.display());
        Self::open_append(path, schema, codepage)
    }

    /// Opens an existing store for further appends
    ///
    /// A missing or header-less file is initialized. The header must match
    /// `schema`. A torn trailing write from an interrupted run is truncated.
    pub fn open(path: &Path, schema: SchemaVariant, codepage: Codepage) -> StoreResult<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No store at {}, creating one", path.display());
                return Self::initialize(path, schema, codepage);
            }
            Err(source) => return Err(unavailable(path, source)),
        };

        let complete = complete_prefix_len(&bytes);
        if complete == 0 {
            tracing::warn!(
                "Store at {} has no complete header, reinitializing",
                path.display()
            );
            return Self::initialize(path, schema, codepage);
        }

        let found = read_header(&codepage.decode(&bytes[..complete]))?;
        let expected: Vec<String> = schema.columns().iter().map(|c| c.to_string()).collect();
        if found != expected {
            return Err(StoreError::SchemaMismatch { expected, found });
        }

        if complete < bytes.len() {
            tracing::warn!(
                "Discarding {} bytes of an interrupted write at the end of {}",
                bytes.len() - complete,
                path.display()
            );
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|source| unavailable(path, source))?;
            file.set_len(complete as u64)?;
            file.sync_all()?;
        }

        Self::open_append(path, schema, codepage)
    }

    fn open_append(path: &Path, schema: SchemaVariant, codepage: Codepage) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| unavailable(path, source))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            schema,
            codepage,
            sync_each_record: true,
            appended: 0,
        })
    }

    /// Controls whether every append is followed by `fsync`
    pub fn with_sync(mut self, sync_each_record: bool) -> Self {
        self.sync_each_record = sync_each_record;
        self
    }

    /// Reads the file up to the end of the last complete row, as UTF-8
    fn read_complete(&self) -> StoreResult<String> {
        let bytes = fs::read(&self.path)?;
        let complete = complete_prefix_len(&bytes);
        Ok(self.codepage.decode(&bytes[..complete]).into_owned())
    }
}

impl RecordStore for CsvStore {
    fn append(&mut self, record: &Record) -> StoreResult<()> {
        let row = self.schema.to_row(record);
        let bytes = encode_row(&row, self.codepage).ok_or_else(|| StoreError::Encoding {
            url: record.url.clone(),
            codepage: self.codepage.name(),
        })?;

        self.file.write_all(&bytes)?;
        if self.sync_each_record {
            self.file.sync_data()?;
        }

        self.appended += 1;
        tracing::trace!("Appended record #{} ({})", self.appended, record.url);
        Ok(())
    }

    fn load_all(&self) -> StoreResult<Vec<Record>> {
        let text = self.read_complete()?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            match row {
                Ok(row) => records.push(record_from_row(&headers, &row)),
                Err(e) => tracing::warn!("Skipping unreadable row {}: {}", index + 1, e),
            }
        }
        Ok(records)
    }

    fn load_column(&self, name: &str) -> StoreResult<Vec<String>> {
        let text = self.read_complete()?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());
        let position = reader
            .headers()?
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| StoreError::UnknownColumn(name.to_string()))?;

        let mut values = Vec::new();
        for row in reader.records() {
            match row {
                Ok(row) => {
                    if let Some(value) = row.get(position) {
                        values.push(value.to_string());
                    }
                }
                Err(e) => tracing::warn!("Skipping unreadable row: {}", e),
            }
        }
        Ok(values)
    }

    fn appended(&self) -> u64 {
        self.appended
    }

    fn schema(&self) -> SchemaVariant {
        self.schema
    }
}

fn unavailable(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Unavailable {
        path: path.to_path_buf(),
        source,
    }
}

/// Length of the prefix that ends with the last row terminator
fn complete_prefix_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |index| index + 1)
}

/// Renders one row in the store codepage, or `None` if a field is unmappable
///
/// Line breaks inside fields are folded to spaces so that `\n` only ever
/// terminates a row.
fn encode_row(fields: &[String], codepage: Codepage) -> Option<Vec<u8>> {
    let mut encoded = Vec::with_capacity(fields.len());
    for field in fields {
        let flat = field.replace(['\r', '\n'], " ");
        encoded.push(codepage.encode(&flat)?.into_owned());
    }

    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_record(&encoded).ok()?;
    writer.into_inner().ok()
}

fn read_header(text: &str) -> StoreResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    Ok(reader.headers()?.iter().map(|h| h.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cp1251() -> Codepage {
        Codepage::from_label("windows-1251").unwrap()
    }

    fn record(id: u32, name: &str) -> Record {
        let mut record = Record::new(format!("https://kolesa.kz/a/show/{}", id));
        record.name = Some(name.to_string());
        record.year = Some(2010 + id as u16);
        record.city = Some("Алматы".to_string());
        record.price = Some(1_000_000 * u64::from(id));
        record
    }

    fn store_in(dir: &TempDir) -> (PathBuf, CsvStore) {
        let path = dir.path().join("cars.csv");
        let store = CsvStore::initialize(&path, SchemaVariant::Minimal, cp1251()).unwrap();
        (path, store)
    }

    #[test]
    fn test_initialize_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let (path, store) = store_in(&dir);

        assert_eq!(fs::read(&path).unwrap(), b"name,year,city,price,url\n");
        assert!(store.load_all().unwrap().is_empty());
        assert_eq!(store.appended(), 0);
    }

    #[test]
    fn test_initialize_unwritable_location() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("cars.csv");
        let result = CsvStore::initialize(&path, SchemaVariant::Minimal, cp1251());
        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
    }

    #[test]
    fn test_append_and_load_all_in_order() {
        let dir = TempDir::new().unwrap();
        let (_, mut store) = store_in(&dir);

        store.append(&record(3, "Lexus RX 350")).unwrap();
        store.append(&record(1, "Тойота Камри")).unwrap();
        store.append(&record(2, "Kia Rio, 1.6")).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(
            loaded,
            vec![
                record(3, "Lexus RX 350"),
                record(1, "Тойота Камри"),
                record(2, "Kia Rio, 1.6")
            ]
        );
        assert_eq!(store.appended(), 3);
    }

    #[test]
    fn test_file_is_written_in_codepage() {
        let dir = TempDir::new().unwrap();
        let (path, mut store) = store_in(&dir);

        store.append(&record(1, "Тойота")).unwrap();

        let bytes = fs::read(&path).unwrap();
        let needle = cp1251().encode("Тойота").unwrap().into_owned();
        assert!(std::str::from_utf8(&bytes).is_err());
        assert!(bytes.windows(needle.len()).any(|w| w == needle.as_slice()));
    }

    #[test]
    fn test_load_column() {
        let dir = TempDir::new().unwrap();
        let (_, mut store) = store_in(&dir);
        store.append(&record(1, "a")).unwrap();
        store.append(&record(2, "b")).unwrap();

        let urls = store.load_column("url").unwrap();
        assert_eq!(
            urls,
            vec!["https://kolesa.kz/a/show/1", "https://kolesa.kz/a/show/2"]
        );
        assert!(matches!(
            store.load_column("vin"),
            Err(StoreError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_unencodable_record_is_rejected_without_touching_file() {
        let dir = TempDir::new().unwrap();
        let (path, mut store) = store_in(&dir);
        store.append(&record(1, "ok")).unwrap();
        let before = fs::read(&path).unwrap();

        let result = store.append(&record(2, "日本車"));
        assert!(matches!(result, Err(StoreError::Encoding { .. })));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.appended(), 1);

        store.append(&record(3, "next")).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[test]
    fn test_quotes_commas_and_padding_survive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("full.csv");
        let mut store = CsvStore::initialize(&path, SchemaVariant::Full, cp1251()).unwrap();

        let mut original = record(1, "Toyota \"Prado\", 150");
        original.attributes.engine = Some("  2.5 ".to_string());
        store.append(&original).unwrap();

        assert_eq!(store.load_all().unwrap(), vec![original]);
    }

    #[test]
    fn test_line_breaks_folded() {
        let dir = TempDir::new().unwrap();
        let (_, mut store) = store_in(&dir);
        store.append(&record(1, "Toyota\nLand Cruiser\r\n200")).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded[0].name.as_deref(), Some("Toyota Land Cruiser  200"));
    }

    #[test]
    fn test_torn_write_is_invisible_and_repaired() {
        let dir = TempDir::new().unwrap();
        let (path, mut store) = store_in(&dir);
        for id in 1..=3 {
            store.append(&record(id, "car")).unwrap();
        }
        let intact_len = fs::metadata(&path).unwrap().len();

        // Simulate a crash in the middle of the fourth write
        let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
        raw.write_all(b"car,2014,Almaty,4000000,https://kolesa.kz/a/sh").unwrap();
        drop(raw);

        assert_eq!(store.load_all().unwrap().len(), 3);
        drop(store);

        let reopened = CsvStore::open(&path, SchemaVariant::Minimal, cp1251()).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), intact_len);
        assert_eq!(reopened.load_all().unwrap().len(), 3);
        assert_eq!(reopened.appended(), 0);
    }

    #[test]
    fn test_open_continues_existing_file() {
        let dir = TempDir::new().unwrap();
        let (path, mut store) = store_in(&dir);
        store.append(&record(1, "first")).unwrap();
        drop(store);

        let mut store = CsvStore::open(&path, SchemaVariant::Minimal, cp1251()).unwrap();
        store.append(&record(2, "second")).unwrap();

        let names: Vec<_> = store
            .load_all()
            .unwrap()
            .into_iter()
            .filter_map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_open_missing_file_initializes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.csv");
        let store = CsvStore::open(&path, SchemaVariant::Geo, cp1251()).unwrap();

        assert!(store.load_all().unwrap().is_empty());
        assert_eq!(
            fs::read(&path).unwrap(),
            b"name,year,city,latitude,longitude,price,url\n"
        );
    }

    #[test]
    fn test_open_rejects_other_schema() {
        let dir = TempDir::new().unwrap();
        let (path, store) = store_in(&dir);
        drop(store);

        let result = CsvStore::open(&path, SchemaVariant::Full, cp1251());
        assert!(matches!(result, Err(StoreError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_open_torn_header_reinitializes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cars.csv");
        fs::write(&path, b"name,ye").unwrap();

        let store = CsvStore::open(&path, SchemaVariant::Minimal, cp1251()).unwrap();
        assert!(store.load_all().unwrap().is_empty());
        assert_eq!(fs::read(&path).unwrap(), b"name,year,city,price,url\n");
    }
}
