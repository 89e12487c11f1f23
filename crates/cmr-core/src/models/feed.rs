use serde::{Deserialize, Serialize};

/// `{"feed": {"entry": [...]}}` envelope of the JSON search endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct Feed<T> {
    pub feed: FeedBody<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedBody<T> {
    #[serde(default = "Vec::new")]
    pub entry: Vec<T>,
}

impl<T> Feed<T> {
    pub fn into_entries(self) -> Vec<T> {
        self.feed.entry
    }
}

/// Error body returned by the search endpoints
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorsResponse {
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub rel: Option<String>,
    pub href: String,
    pub title: Option<String>,
}

/// One `<reference>` of an XML reference search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub id: String,
    pub location: String,
}
