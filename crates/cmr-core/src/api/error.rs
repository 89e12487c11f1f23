use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Token response did not contain an <id> element: {0}")]
    MalformedTokenResponse(String),

    #[error("Search failed: {}", .0.join("; "))]
    Search(Vec<String>),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn malformed_token_response(body: &str) -> Self {
        ApiError::MalformedTokenResponse(Self::truncate_body(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(ApiError::truncate_body("short"), "short");

        let long = "x".repeat(600);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.ends_with("(truncated, 600 total bytes)"));

        // Never splits a multi-byte character
        let wide = "é".repeat(300);
        let truncated = ApiError::truncate_body(&wide);
        assert!(truncated.contains("(truncated, 600 total bytes)"));
    }

    #[test]
    fn test_search_error_display() {
        let err = ApiError::Search(vec![
            "Parameter [foo] was not recognized.".to_string(),
            "page_size must be a number".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Search failed: Parameter [foo] was not recognized.; page_size must be a number"
        );
    }
}
