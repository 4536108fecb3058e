//! The intermediate store: hand-off between the extraction and filing phases.
//!
//! A single pretty-printed JSON array of [`ExtractedRecord`]s. The extraction
//! phase replaces it wholesale; the filing phase reads it wholesale. Writes
//! go to a temp file in the same folder and are renamed into place, so a
//! crash mid-write never leaves a truncated store behind.

use crate::error::ExpensesError;
use crate::model::ExtractedRecord;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Replace the store at `path` with `records`.
///
/// Parent folders are created as needed.
pub fn write_store(path: &Path, records: &[ExtractedRecord]) -> Result<(), ExpensesError> {
    let write_failed = |source| ExpensesError::StoreWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_failed)?;

    let json = serde_json::to_vec_pretty(records)
        .map_err(|e| ExpensesError::Internal(format!("Failed to serialise records: {e}")))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
    tmp.write_all(&json).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;

    info!("Saved {} expenses to {}", records.len(), path.display());
    Ok(())
}

/// Read the store at `path`; `Ok(None)` when it does not exist yet.
pub fn read_store(path: &Path) -> Result<Option<Vec<ExtractedRecord>>, ExpensesError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ExpensesError::StoreCorrupt {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ExpensesError::StoreCorrupt {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<ExtractedRecord> {
        let mut extra = serde_json::Map::new();
        extra.insert("invoice_number".into(), json!("44"));
        vec![
            ExtractedRecord {
                category: Some("software".into()),
                date: Some("2024-03-10".into()),
                currency: Some("EUR".into()),
                pre_tax_price: Some(0.1 + 0.2),
                tax_percentage: Some(21.0),
                retention_percentage: Some(0.0),
                filename: "a.pdf".into(),
                extra,
            },
            ExtractedRecord {
                category: Some("hosting".into()),
                pre_tax_price: Some(1234.5678),
                retention_percentage: Some(15.0),
                filename: "b.pdf".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn round_trip_is_exact() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("temp").join("expenses.json");
        let records = sample();

        write_store(&path, &records).unwrap();
        let back = read_store(&path).unwrap().unwrap();

        assert_eq!(back, records);
        assert_eq!(back[0].pre_tax_price, Some(0.1 + 0.2));
    }

    #[test]
    fn unparsed_model_values_survive_the_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("expenses.json");
        let rec: ExtractedRecord = serde_json::from_value(json!({
            "category": "software",
            "pre_tax_price": "1.234,56",
            "filename": "a.pdf"
        }))
        .unwrap();

        write_store(&path, &[rec]).unwrap();
        let back = read_store(&path).unwrap().unwrap();

        assert_eq!(back[0].pre_tax_price, None);
        assert_eq!(back[0].extra.get("pre_tax_price"), Some(&json!("1.234,56")));
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["pre_tax_price"], "1.234,56");
    }

    #[test]
    fn write_overwrites() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("expenses.json");
        write_store(&path, &sample()).unwrap();
        write_store(&path, &[]).unwrap();
        assert_eq!(read_store(&path).unwrap(), Some(vec![]));
    }

    #[test]
    fn missing_store_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(read_store(&dir.path().join("expenses.json")).unwrap(), None);
    }

    #[test]
    fn garbage_store_is_corrupt() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("expenses.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            read_store(&path),
            Err(ExpensesError::StoreCorrupt { .. })
        ));
    }

    #[test]
    fn store_is_a_pretty_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("expenses.json");
        write_store(&path, &sample()).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("[\n"));
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v[0]["filename"], "a.pdf");
        assert_eq!(v[0]["invoice_number"], "44");
        assert_eq!(v[1]["retencion_percentage"], 15.0);
    }
}
