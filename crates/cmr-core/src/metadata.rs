//! Identifier extraction from ECHO10 metadata documents.
//!
//! Ingest URLs are keyed by the collection `DataSetId` or, for granules, by
//! the parent collection's `ShortName`, both read from the document that is
//! about to be ingested.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static DATASET_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<DataSetId>\s*(.*?)\s*</DataSetId>").expect("valid regex")
});

static COLLECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<Collection>(.*?)</Collection>").expect("valid regex")
});

static SHORT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<ShortName>\s*(.*?)\s*</ShortName>").expect("valid regex")
});

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Could not find <{0}> tag")]
    MissingElement(&'static str),

    #[error("Could not read metadata file: {0}")]
    Read(#[from] std::io::Error),
}

/// Read a metadata document from disk.
pub async fn read_document(path: &Path) -> Result<String, MetadataError> {
    Ok(tokio::fs::read_to_string(path).await?)
}

/// The collection `DataSetId`.
pub fn dataset_id(xml: &str) -> Result<String, MetadataError> {
    DATASET_ID
        .captures(xml)
        .map(|c| unescape_xml(&c[1]))
        .ok_or(MetadataError::MissingElement("DataSetId"))
}

/// The `ShortName` inside the document's `<Collection>` element.
pub fn short_name(xml: &str) -> Result<String, MetadataError> {
    let collection = COLLECTION
        .captures(xml)
        .ok_or(MetadataError::MissingElement("Collection"))?;
    SHORT_NAME
        .captures(&collection[1])
        .map(|c| unescape_xml(&c[1]))
        .ok_or(MetadataError::MissingElement("ShortName"))
}

/// Replace the five predefined XML entities.
pub(crate) fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Collection>
  <ShortName>CERES_EBAF</ShortName>
  <VersionId>4.1</VersionId>
  <DataSetId>CERES Energy Balanced &amp; Filled (EBAF) TOA Edition4.1</DataSetId>
</Collection>"#;

    const GRANULE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Granule>
  <GranuleUR>CERES_EBAF_Edition4.1_200003-202102.nc</GranuleUR>
  <Collection>
    <ShortName>
      CERES_EBAF
    </ShortName>
    <VersionId>4.1</VersionId>
  </Collection>
</Granule>"#;

    #[test]
    fn test_dataset_id() {
        assert_eq!(
            dataset_id(COLLECTION_XML).unwrap(),
            "CERES Energy Balanced & Filled (EBAF) TOA Edition4.1"
        );
    }

    #[test]
    fn test_dataset_id_missing() {
        let err = dataset_id(GRANULE_XML).unwrap_err();
        assert!(matches!(err, MetadataError::MissingElement("DataSetId")));
        assert_eq!(err.to_string(), "Could not find <DataSetId> tag");
    }

    #[test]
    fn test_short_name_from_granule() {
        assert_eq!(short_name(GRANULE_XML).unwrap(), "CERES_EBAF");
    }

    #[test]
    fn test_short_name_requires_collection() {
        let err = short_name("<Granule><ShortName>X</ShortName></Granule>").unwrap_err();
        assert!(matches!(err, MetadataError::MissingElement("Collection")));

        let err = short_name("<Granule><Collection><DataSetId>X</DataSetId></Collection></Granule>")
            .unwrap_err();
        assert!(matches!(err, MetadataError::MissingElement("ShortName")));
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &amp;lt; b &lt; c"), "a &lt; b < c");
    }

    #[tokio::test]
    async fn test_read_document_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_document(&dir.path().join("nope.xml")).await.unwrap_err();
        assert!(matches!(err, MetadataError::Read(_)));
    }
}
