//! Paging and response parsing for the search endpoints.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Url;
use serde::de::DeserializeOwned;

use super::ApiError;
use crate::metadata::unescape_xml;
use crate::models::feed::ErrorsResponse;
use crate::models::{Feed, Reference};

/// Results per page requested from the search endpoints
pub const PAGE_SIZE: usize = 50;

/// Placeholder for the page number in configured search URLs
const PAGE_PLACEHOLDER: &str = "{}";

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<reference>(.*?)</reference>").expect("valid regex"));

static REFERENCE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(name|id|location)>(.*?)</(?:name|id|location)>").expect("valid regex")
});

/// Number of pages needed to return `limit` results.
pub fn page_count(limit: usize) -> usize {
    if limit == 0 {
        0
    } else {
        (limit - 1) / PAGE_SIZE + 1
    }
}

/// Fill the page number into `template` and append the search parameters.
pub fn page_url(template: &str, page: usize, params: &[(String, String)]) -> Result<Url> {
    let raw = template.replace(PAGE_PLACEHOLDER, &page.to_string());
    let mut url = Url::parse(&raw).with_context(|| format!("Invalid search URL: {}", raw))?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Parse one page of a JSON search feed.
///
/// A body with an `errors` list is a failed search.
pub fn parse_feed<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    if let Ok(errors) = serde_json::from_str::<ErrorsResponse>(body) {
        return Err(ApiError::Search(errors.errors).into());
    }
    let feed: Feed<T> = serde_json::from_str(body)
        .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", e, ApiError::truncate_body(body))))?;
    Ok(feed.into_entries())
}

/// Every `<reference>` of an XML reference search response.
pub fn parse_references(body: &str) -> Vec<Reference> {
    REFERENCE
        .captures_iter(body)
        .map(|reference| {
            let mut parsed = Reference::default();
            for field in REFERENCE_FIELD.captures_iter(&reference[1]) {
                let value = unescape_xml(field[2].trim());
                match &field[1] {
                    "name" => parsed.name = value,
                    "id" => parsed.id = value,
                    _ => parsed.location = value,
                }
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Collection;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0), 0);
        assert_eq!(page_count(1), 1);
        assert_eq!(page_count(50), 1);
        assert_eq!(page_count(51), 2);
        assert_eq!(page_count(100), 2);
        assert_eq!(page_count(101), 3);
    }

    #[test]
    fn test_page_url() {
        let template = "https://cmr.example/search/collections.json?page_size=50&page_num={}";
        let params = vec![
            ("short_name".to_string(), "CERES_EBAF".to_string()),
            ("temporal".to_string(), "2000-01-01T00:00:00Z,2001-01-01T00:00:00Z".to_string()),
        ];
        let url = page_url(template, 2, &params).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cmr.example/search/collections.json?page_size=50&page_num=2\
             &short_name=CERES_EBAF&temporal=2000-01-01T00%3A00%3A00Z%2C2001-01-01T00%3A00%3A00Z"
        );
    }

    #[test]
    fn test_page_url_invalid_template() {
        assert!(page_url("not a url {}", 1, &[]).is_err());
    }

    #[test]
    fn test_parse_feed_errors() {
        let body = r#"{"errors":["Parameter [bogus] was not recognized."]}"#;
        let err = parse_feed::<Collection>(body).unwrap_err();
        match err.downcast_ref::<ApiError>() {
            Some(ApiError::Search(messages)) => {
                assert_eq!(messages, &vec!["Parameter [bogus] was not recognized.".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_feed_garbage() {
        let err = parse_feed::<Collection>("<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_references() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<results><hits>2</hits><took>31</took><references>
<reference><name>CERES_EBAF &amp; friends</name><id>C1-LARC</id><location>https://cmr.example/search/concepts/C1-LARC/1</location><revision-id>1</revision-id></reference>
<reference><name>MOPITT</name><id>C2-LARC</id></reference>
</references></results>"#;

        let refs = parse_references(body);
        assert_eq!(
            refs,
            vec![
                Reference {
                    name: "CERES_EBAF & friends".to_string(),
                    id: "C1-LARC".to_string(),
                    location: "https://cmr.example/search/concepts/C1-LARC/1".to_string(),
                },
                Reference {
                    name: "MOPITT".to_string(),
                    id: "C2-LARC".to_string(),
                    location: String::new(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_references_none() {
        assert!(parse_references("<results><hits>0</hits><references/></results>").is_empty());
    }
}
