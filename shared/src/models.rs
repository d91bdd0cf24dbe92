/// Catalog and outcome models shared across the mirror crates.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{MirrorError, MirrorResult};

/// One content entry of the input catalog.
///
/// Only `cover` and `chapterUrls` are read; `coverPath` and `chapterPaths` are
/// written back when the output catalog is materialized. Any other fields are
/// carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: i64,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_path: Option<String>,
    #[serde(default)]
    pub chapter_urls: Vec<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_paths: Option<Vec<Option<String>>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CatalogEntry {
    /// Every asset URL referenced by this entry, cover first, absent ones dropped.
    pub fn asset_urls(&self) -> impl Iterator<Item = &str> {
        self.cover
            .iter()
            .chain(self.chapter_urls.iter().flatten())
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }
}

/// Read the catalog file (a JSON array of entries).
pub fn load_catalog(path: &Path) -> MirrorResult<Vec<CatalogEntry>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        MirrorError::Catalog(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| MirrorError::Catalog(format!("invalid catalog {}: {}", path.display(), e)))
}

/// Final result of fetching one original URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Asset stored under the output directory at this path.
    Stored(PathBuf),
    /// Terminal error description.
    Failed(String),
}

impl Outcome {
    /// Interpret a string read back from the checkpoint file.
    ///
    /// Recorded paths always live under the output directory; anything else
    /// is an error description.
    pub fn from_recorded(value: String, output_dir: &Path) -> Self {
        if Path::new(&value).starts_with(output_dir) {
            Outcome::Stored(PathBuf::from(value))
        } else {
            Outcome::Failed(value)
        }
    }

    /// The string form written to the checkpoint and output catalog.
    pub fn to_recorded(&self) -> String {
        match self {
            Outcome::Stored(path) => path.to_string_lossy().into_owned(),
            Outcome::Failed(message) => message.clone(),
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, Outcome::Stored(_))
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_recorded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_deserialization() {
        let json = r#"{"id":7,"cover":"https://a.example/c.jpg","chapterUrls":["https://a.example/1.png",null],"title":"Seven"}"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, 7);
        assert_eq!(entry.chapter_urls.len(), 2);
        assert_eq!(entry.extra.get("title").and_then(|v| v.as_str()), Some("Seven"));

        let urls: Vec<&str> = entry.asset_urls().collect();
        assert_eq!(urls, vec!["https://a.example/c.jpg", "https://a.example/1.png"]);
    }

    #[test]
    fn test_entry_without_cover() {
        let json = r#"{"id":1,"cover":null,"chapterUrls":[]}"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.asset_urls().count(), 0);

        let out = serde_json::to_value(&entry).unwrap();
        assert!(out.get("coverPath").is_none());
        assert!(out.get("chapterPaths").is_none());
    }

    #[test]
    fn test_outcome_from_recorded() {
        let dir = Path::new("images");
        assert_eq!(
            Outcome::from_recorded("images/d41d8cd98f00b204e9800998ecf8427e.png".into(), dir),
            Outcome::Stored(PathBuf::from("images/d41d8cd98f00b204e9800998ecf8427e.png")),
        );
        assert_eq!(
            Outcome::from_recorded("Response code 404 (Not Found)".into(), dir),
            Outcome::Failed("Response code 404 (Not Found)".into()),
        );
        // A sibling directory sharing the prefix is not the output directory
        assert!(!Outcome::from_recorded("images2/x.png".into(), dir).is_stored());
    }
}
