use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Link;

/// A granule entry of the JSON search feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Granule {
    /// CMR concept id, e.g. `G1000000002-PROV1`
    pub id: String,
    pub title: Option<String>,
    pub producer_granule_id: Option<String>,
    pub collection_concept_id: Option<String>,
    pub dataset_id: Option<String>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Granule {
    /// Title for listings, falling back to the concept id
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Links whose relation marks downloadable data
    pub fn data_links(&self) -> impl Iterator<Item = &Link> {
        self.links
            .iter()
            .filter(|l| l.rel.as_deref().is_some_and(|rel| rel.ends_with("/data#")))
    }
}
