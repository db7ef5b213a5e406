use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cypher_api::{Error, Result, Statement};
use serde::Serialize;

const ACCEPT: &str = "application/json;charset=UTF-8";

#[derive(Serialize)]
struct RequestBody<'a> {
    statements: &'a [Statement],
}

pub(crate) fn encode_statements(statements: &[Statement]) -> Result<Vec<u8>> {
    serde_json::to_vec(&RequestBody { statements })
        .map_err(|e| Error::Encode(format!("request body: {e}")))
}

/// Value of the `Authorization` header for basic auth.
pub(crate) fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Headers of the discovery request.
pub(crate) fn discovery_headers(auth: Option<&str>) -> Vec<(String, String)> {
    let mut headers = vec![("Accept".to_owned(), ACCEPT.to_owned())];
    if let Some(auth) = auth {
        headers.push(("Authorization".to_owned(), auth.to_owned()));
    }
    headers
}

/// Headers every transactional endpoint request carries.
pub(crate) fn headers(auth: Option<&str>, stream: bool) -> Vec<(String, String)> {
    let mut headers = discovery_headers(auth);
    headers.push(("Content-Type".to_owned(), "application/json".to_owned()));
    if stream {
        headers.push(("X-Stream".to_owned(), "true".to_owned()));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_wraps_statements() {
        let body = encode_statements(&[
            Statement::new("CREATE (n:P {name: $name})").param("name", "ann"),
            Statement::new("MATCH (n) RETURN count(n)").include_stats(false),
        ])
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"statements": [
                {"statement": "CREATE (n:P {name: $name})", "parameters": {"name": "ann"}, "includeStats": true},
                {"statement": "MATCH (n) RETURN count(n)", "includeStats": false}
            ]})
        );
    }

    #[test]
    fn empty_statement_list() {
        assert_eq!(encode_statements(&[]).unwrap(), br#"{"statements":[]}"#);
    }

    #[test]
    fn basic_auth_is_base64_of_user_colon_password() {
        assert_eq!(basic_auth("neo4j", "secret"), "Basic bmVvNGo6c2VjcmV0");
    }

    #[test]
    fn stream_hint_and_auth_are_optional() {
        let plain = headers(None, false);
        assert_eq!(plain.len(), 2);
        let full = headers(Some("Basic abc"), true);
        assert!(full.contains(&("X-Stream".to_owned(), "true".to_owned())));
        assert!(full.contains(&("Authorization".to_owned(), "Basic abc".to_owned())));
    }
}
