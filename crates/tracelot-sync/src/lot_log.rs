//! Loader for the external lot→SKU lookup file.
//!
//! The lot log is a delimited text export with `Lot` and `SKU` header
//! columns, maintained outside this system and loaded once per sync run. A
//! missing file is non-fatal and yields an empty map; rows that cannot be
//! read are skipped with a warning.

use std::collections::HashMap;
use std::path::Path;

use tracelot_core::{normalize_lot, LOT_PREFIX};

/// In-memory lot→SKU mapping for one sync run.
#[derive(Debug, Default, Clone)]
pub struct LotLog {
    by_lot: HashMap<String, String>,
}

impl LotLog {
    /// Loads the lot log from a CSV file with `Lot` and `SKU` columns.
    ///
    /// A missing file yields an empty map (logged at info level). Rows
    /// missing either column are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`csv::Error`] only when the file exists but cannot be
    /// parsed as CSV at all (e.g. unreadable headers).
    pub fn load(path: &Path) -> Result<Self, csv::Error> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "lot log not found; lot lookups disabled");
            return Ok(Self::default());
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let lot_idx = headers.iter().position(|h| h.eq_ignore_ascii_case("lot"));
        let sku_idx = headers.iter().position(|h| h.eq_ignore_ascii_case("sku"));

        let (Some(lot_idx), Some(sku_idx)) = (lot_idx, sku_idx) else {
            tracing::warn!(
                path = %path.display(),
                "lot log is missing a Lot or SKU column; lot lookups disabled"
            );
            return Ok(Self::default());
        };

        let mut by_lot = HashMap::new();
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(line, error = %e, "skipping unreadable lot log row");
                    continue;
                }
            };
            let lot = record.get(lot_idx).unwrap_or("").trim().to_uppercase();
            let sku = record.get(sku_idx).unwrap_or("").trim().to_uppercase();
            if lot.is_empty() || sku.is_empty() {
                continue;
            }
            by_lot.insert(lot, sku);
        }

        tracing::info!(entries = by_lot.len(), path = %path.display(), "lot log loaded");
        Ok(Self { by_lot })
    }

    /// Builds a lot log from in-memory pairs; used by tests and fixtures.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let by_lot = pairs
            .into_iter()
            .map(|(k, v)| (k.into().to_uppercase(), v.into().to_uppercase()))
            .collect();
        Self { by_lot }
    }

    /// Looks up the SKU for a lot code, trying the normalized form, the raw
    /// uppercased form, and the unprefixed form, in that order.
    #[must_use]
    pub fn lookup_sku(&self, raw_lot: &str) -> Option<&str> {
        let normalized = normalize_lot(raw_lot);
        if let Some(sku) = self.by_lot.get(&normalized) {
            return Some(sku);
        }
        let upper = raw_lot.trim().to_uppercase();
        if let Some(sku) = self.by_lot.get(&upper) {
            return Some(sku);
        }
        let unprefixed = normalized.trim_start_matches(LOT_PREFIX);
        self.by_lot.get(unprefixed).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_lot.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_lot.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_yields_empty_map() {
        let log = LotLog::load(Path::new("/nonexistent/lot_log.csv")).expect("non-fatal");
        assert!(log.is_empty());
    }

    #[test]
    fn loads_lot_and_sku_columns() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "Lot,SKU").unwrap();
        writeln!(file, "ABC12345,211410SPT").unwrap();
        writeln!(file, "slq-777,211610SPT").unwrap();
        writeln!(file, ",999999SPT").unwrap();

        let log = LotLog::load(file.path()).expect("should load");
        assert_eq!(log.len(), 2, "blank-lot row is skipped");
        assert_eq!(log.lookup_sku("ABC12345"), Some("211410SPT"));
    }

    #[test]
    fn header_column_order_does_not_matter() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "SKU,Notes,Lot").unwrap();
        writeln!(file, "211810SPT,old batch,XYZ99999").unwrap();

        let log = LotLog::load(file.path()).expect("should load");
        assert_eq!(log.lookup_sku("XYZ99999"), Some("211810SPT"));
    }

    #[test]
    fn missing_columns_disable_lookups() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "Batch,Product").unwrap();
        writeln!(file, "ABC,211410SPT").unwrap();

        let log = LotLog::load(file.path()).expect("non-fatal");
        assert!(log.is_empty());
    }

    #[test]
    fn lookup_tries_normalized_raw_and_unprefixed_forms() {
        // Keyed by the unprefixed form.
        let log = LotLog::from_pairs([("ABC12345", "211410SPT")]);
        assert_eq!(log.lookup_sku("SLQ-ABC12345"), Some("211410SPT"));
        assert_eq!(log.lookup_sku("abc12345"), Some("211410SPT"));

        // Keyed by the normalized form.
        let log = LotLog::from_pairs([("SLQ-DEF67890", "211610SPT")]);
        assert_eq!(log.lookup_sku("def67890"), Some("211610SPT"));
        assert_eq!(log.lookup_sku("SLQ-DEF67890"), Some("211610SPT"));

        assert_eq!(log.lookup_sku("nope"), None);
    }
}
