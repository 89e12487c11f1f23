//! Text scraping of token service and ingest service responses.
//!
//! Both checks match on literal markers rather than parsing the XML, which
//! keeps them compatible with the exact wording the services return.

use anyhow::Result;

use super::CredentialRecord;
use crate::api::ApiError;

/// Probe path under the provider that never names a real collection
pub(crate) const PROBE_COLLECTION: &str = "LarcDatasetId";

/// Extract the token from the token service response: the text between the
/// first `<id>` and the following `</id>`.
pub fn extract_token(body: &str) -> Result<String> {
    let token = body
        .split_once("<id>")
        .and_then(|(_, rest)| rest.split_once("</id>"))
        .map(|(token, _)| token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::malformed_token_response(body))?;
    Ok(token.to_string())
}

/// Whether a probe response reports that `token` is unknown to the server.
///
/// Only the first `<error>` element is considered, and its text must equal
/// `Token <token> does not exist` exactly.
pub fn is_token_missing(body: &str, token: &str) -> bool {
    let Some((_, rest)) = body.split_once("<error>") else {
        return false;
    };
    let message = rest.split("</error>").next().unwrap_or_default();
    message == format!("Token {} does not exist", token)
}

/// XML body for a token request.
pub fn token_request_body(record: &CredentialRecord) -> String {
    format!(
        "<token><username>{}</username><password>{}</password><client_id>{}</client_id>\
         <user_ip_address>{}</user_ip_address><provider>{}</provider></token>",
        escape_xml(&record.username),
        escape_xml(&record.password),
        escape_xml(&record.client_id),
        escape_xml(&record.user_ip_address),
        escape_xml(&record.provider),
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token() {
        let body = "<?xml version=\"1.0\"?><token><id>ABC123</id><username>u</username></token>";
        assert_eq!(extract_token(body).unwrap(), "ABC123");

        // First <id> wins
        let body = "<token><id>FIRST</id><id>SECOND</id></token>";
        assert_eq!(extract_token(body).unwrap(), "FIRST");
    }

    #[test]
    fn test_extract_token_malformed() {
        for body in [
            "",
            "<errors><error>Invalid username or password</error></errors>",
            "<token><id>UNTERMINATED",
            "<token><id></id></token>",
        ] {
            let err = extract_token(body).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<ApiError>(), Some(ApiError::MalformedTokenResponse(_))),
                "unexpected error for {:?}: {}",
                body,
                err
            );
        }
    }

    #[test]
    fn test_is_token_missing() {
        let body = "<errors><error>Token XYZ does not exist</error></errors>";
        assert!(is_token_missing(body, "XYZ"));
        assert!(!is_token_missing(body, "XY"));
        assert!(!is_token_missing(body, "ABC"));
    }

    #[test]
    fn test_is_token_missing_requires_error_element() {
        assert!(!is_token_missing("Token XYZ does not exist", "XYZ"));
        assert!(!is_token_missing("", "XYZ"));
        assert!(!is_token_missing("<result>ok</result>", "XYZ"));
    }

    #[test]
    fn test_is_token_missing_only_first_error() {
        let body = "<errors><error>Collection not found</error><error>Token XYZ does not exist</error></errors>";
        assert!(!is_token_missing(body, "XYZ"));
    }

    #[test]
    fn test_is_token_missing_exact_wording() {
        let body = "<errors><error>Token XYZ does not exist.</error></errors>";
        assert!(!is_token_missing(body, "XYZ"));
        let body = "<errors><error> Token XYZ does not exist</error></errors>";
        assert!(!is_token_missing(body, "XYZ"));
    }

    #[test]
    fn test_token_request_body() {
        let record = CredentialRecord {
            username: "scientist".to_string(),
            password: "p<&>w".to_string(),
            client_id: "cmr-test".to_string(),
            provider: "PROV1".to_string(),
            user_ip_address: "10.0.0.7".to_string(),
        };
        assert_eq!(
            token_request_body(&record),
            "<token><username>scientist</username><password>p&lt;&amp;&gt;w</password>\
             <client_id>cmr-test</client_id><user_ip_address>10.0.0.7</user_ip_address>\
             <provider>PROV1</provider></token>"
        );
    }
}
