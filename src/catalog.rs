use crate::{EnrichError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// One catalog entry. Fields the enricher does not know about survive a
/// rewrite through the flattened `extra` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "imageAlt", default, skip_serializing_if = "Option::is_none")]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A record is processed only when it has no image yet and carries both the
/// stable id (names the output file) and the source page URL.
pub fn needs_image(record: &DealRecord) -> bool {
    record
        .image
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .is_empty()
        && !record.id.trim().is_empty()
        && !record.url.trim().is_empty()
}

/// Reads the whole catalog once at startup. Any failure here is fatal for
/// the run; there is nothing useful to do without the catalog.
pub fn load_catalog(path: &Path) -> Result<Vec<DealRecord>> {
    let bytes = std::fs::read(path).map_err(|err| EnrichError::Catalog {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| EnrichError::Catalog {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Full rewrite: pretty-printed array with a trailing newline.
pub fn save_catalog(path: &Path, records: &[DealRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, url: &str, image: Option<&str>) -> DealRecord {
        DealRecord {
            id: id.to_string(),
            url: url.to_string(),
            image: image.map(str::to_string),
            image_alt: None,
            title: "Widget".to_string(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn needs_image_requires_empty_image_and_id_and_url() {
        assert!(needs_image(&record("x1", "https://example.com/p", None)));
        assert!(needs_image(&record("x1", "https://example.com/p", Some(""))));
        assert!(!needs_image(&record(
            "x1",
            "https://example.com/p",
            Some("/images/x1.webp")
        )));
        assert!(!needs_image(&record("", "https://example.com/p", None)));
        assert!(!needs_image(&record("x1", "", None)));
    }

    #[test]
    fn round_trip_preserves_unknown_fields_and_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("deals.json");
        std::fs::write(
            &path,
            r#"[
  {
    "id": "x1",
    "url": "https://example.com/p",
    "title": "Widget",
    "price": "9.99",
    "store": "example"
  },
  {
    "id": "x2",
    "url": "https://example.com/q",
    "image": "/images/x2.webp",
    "imageAlt": "Gadget",
    "title": "Gadget"
  }
]
"#,
        )
        .expect("write");

        let records = load_catalog(&path).expect("load");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].extra.get("price"), Some(&Value::from("9.99")));
        assert_eq!(records[1].image.as_deref(), Some("/images/x2.webp"));

        save_catalog(&path, &records).expect("save");
        let raw = std::fs::read_to_string(&path).expect("read back");
        assert!(raw.ends_with('\n'));
        assert!(raw.contains("\"price\": \"9.99\""));
        assert!(raw.contains("\"store\": \"example\""));

        let reloaded = load_catalog(&path).expect("reload");
        assert_eq!(reloaded[0].id, "x1");
        assert_eq!(reloaded[1].id, "x2");
        assert_eq!(reloaded[1].image_alt.as_deref(), Some("Gadget"));
    }

    #[test]
    fn load_catalog_fails_on_malformed_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("deals.json");
        std::fs::write(&path, "{not a catalog").expect("write");
        let err = load_catalog(&path).expect_err("should fail");
        assert!(matches!(err, EnrichError::Catalog { .. }));
    }

    #[test]
    fn load_catalog_fails_when_missing() {
        let err = load_catalog(Path::new("/nonexistent/deals.json")).expect_err("should fail");
        assert!(matches!(err, EnrichError::Catalog { .. }));
    }
}
