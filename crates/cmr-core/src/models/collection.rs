use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Link;

/// A collection entry of the JSON search feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    /// CMR concept id, e.g. `C1000000001-PROV1`
    pub id: String,
    pub short_name: Option<String>,
    pub version_id: Option<String>,
    pub title: Option<String>,
    pub dataset_id: Option<String>,
    pub summary: Option<String>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub links: Vec<Link>,
    /// Metadata URL from the reference search
    #[serde(default)]
    pub location: Option<String>,
}

impl Collection {
    /// `short_name (version)` for listings, falling back to the concept id
    pub fn display_name(&self) -> String {
        match (&self.short_name, &self.version_id) {
            (Some(name), Some(version)) => format!("{} ({})", name, version),
            (Some(name), None) => name.clone(),
            _ => self.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feed;

    #[test]
    fn test_parse_collection_feed() {
        let json = r#"{"feed":{"updated":"2024-05-02T14:10:22.512Z","id":"https://cmr.earthdata.nasa.gov:443/search/collections.json?short_name=CERES_EBAF","title":"ECHO dataset metadata","entry":[{"processing_level_id":"3","time_start":"2000-03-01T00:00:00.000Z","version_id":"Edition4.1","updated":"2021-06-15T00:00:00.000Z","dataset_id":"CERES Energy Balanced and Filled (EBAF) TOA and Surface Monthly means data in netCDF Edition4.1","data_center":"LARC_ASDC","short_name":"CERES_EBAF","title":"CERES Energy Balanced and Filled (EBAF) TOA and Surface Monthly means data in netCDF Edition4.1","summary":"Monthly TOA fluxes.","coordinate_system":"CARTESIAN","id":"C1000000001-LARC_ASDC","original_format":"ECHO10","browse_flag":false,"has_variables":false,"online_access_flag":true,"links":[{"rel":"http://esipfed.org/ns/fedsearch/1.1/data#","hreflang":"en-US","href":"https://asdc.larc.nasa.gov/data/CERES/EBAF/"}]}]}}"#;

        let feed: Feed<Collection> = serde_json::from_str(json).expect("Failed to parse collection feed");
        let entries = feed.into_entries();
        assert_eq!(entries.len(), 1);

        let c = &entries[0];
        assert_eq!(c.id, "C1000000001-LARC_ASDC");
        assert_eq!(c.short_name.as_deref(), Some("CERES_EBAF"));
        assert_eq!(c.display_name(), "CERES_EBAF (Edition4.1)");
        assert_eq!(c.time_start.unwrap().to_rfc3339(), "2000-03-01T00:00:00+00:00");
        assert!(c.time_end.is_none());
        assert_eq!(c.links.len(), 1);
        assert_eq!(c.links[0].href, "https://asdc.larc.nasa.gov/data/CERES/EBAF/");
        assert!(c.location.is_none());
    }

    #[test]
    fn test_display_name_fallback() {
        let c: Collection = serde_json::from_str(r#"{"id":"C1-PROV1"}"#).unwrap();
        assert_eq!(c.display_name(), "C1-PROV1");
    }
}
