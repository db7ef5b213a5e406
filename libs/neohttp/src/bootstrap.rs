use std::sync::Arc;

use cypher_api::{Error, Result};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::database::Database;
use crate::request;
use crate::transport::{HttpRequest, Method, Transport};

/// Server major versions this driver speaks to.
pub const SUPPORTED_MAJOR_VERSIONS: &[&str] = &["4"];

const DATABASE_PLACEHOLDER: &str = "{databaseName}";

/// Capabilities advertised by the discovery endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Discovery {
    pub bolt_direct: String,
    /// Routing URI as sent by 4.x servers.
    pub bolt_routing: String,
    /// Routing URI under its older name.
    pub cluster: String,
    /// Transaction endpoint template, still carrying `{databaseName}`.
    pub transaction: String,
    pub neo4j_version: String,
    pub neo4j_edition: String,
}

impl Discovery {
    /// Routing URI under whichever name the server used.
    pub fn routing(&self) -> &str {
        if self.bolt_routing.is_empty() {
            &self.cluster
        } else {
            &self.bolt_routing
        }
    }

    /// First dot-separated segment of `neo4j_version`.
    pub fn major_version(&self) -> &str {
        self.neo4j_version.split('.').next().unwrap_or_default()
    }
}

/// Discover the server, check its version and resolve the transaction
/// endpoint for `config.database`.
pub fn connect(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Database> {
    config.validate()?;
    let discovery = discover_with_retry(config, transport.as_ref())?;
    check_version(&discovery)?;

    let tx_endpoint = discovery
        .transaction
        .replacen(DATABASE_PLACEHOLDER, &config.database, 1);
    tracing::info!(
        uri = %config.uri,
        version = %discovery.neo4j_version,
        edition = %discovery.neo4j_edition,
        endpoint = %tx_endpoint,
        "connected"
    );
    Ok(Database::new(transport, tx_endpoint, discovery, config))
}

fn discover_with_retry(config: &ClientConfig, transport: &dyn Transport) -> Result<Discovery> {
    let attempts = config.connect_attempts;
    let mut attempt = 1;
    loop {
        tracing::debug!(uri = %config.uri, attempt, "discovering");
        match discover(config, transport) {
            Ok(discovery) => return Ok(discovery),
            Err(e) if attempt >= attempts => {
                return Err(Error::transport(format!(
                    "failed to connect after {attempts} attempts, no more retries: {e}"
                )));
            }
            Err(e) => {
                tracing::warn!(
                    uri = %config.uri,
                    attempt,
                    remaining = attempts - attempt,
                    delay_ms = config.retry_delay_ms,
                    error = %e,
                    "discovery failed, retrying"
                );
                std::thread::sleep(config.retry_delay());
                attempt += 1;
            }
        }
    }
}

fn discover(config: &ClientConfig, transport: &dyn Transport) -> Result<Discovery> {
    let auth = config.authorization();
    let response = transport.send(HttpRequest {
        method: Method::Get,
        url: config.uri.clone(),
        headers: request::discovery_headers(auth.as_deref()),
        body: None,
    })?;
    if !(200..300).contains(&response.status) {
        return Err(Error::transport(format!(
            "GET {}: discovery returned status {}",
            config.uri, response.status
        )));
    }
    serde_json::from_reader(response.body).map_err(|e| {
        if e.is_io() {
            Error::transport(format!("reading discovery body from {}: {e}", config.uri))
        } else {
            Error::decode(0, format!("discovery body from {}: {e}", config.uri))
        }
    })
}

fn check_version(discovery: &Discovery) -> Result<()> {
    let major = discovery.major_version();
    if SUPPORTED_MAJOR_VERSIONS.contains(&major) {
        return Ok(());
    }
    Err(Error::VersionUnsupported {
        found: discovery.neo4j_version.clone(),
        supported: SUPPORTED_MAJOR_VERSIONS.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery(version: &str) -> Discovery {
        Discovery {
            neo4j_version: version.into(),
            ..Default::default()
        }
    }

    #[test]
    fn major_version_is_first_segment() {
        assert_eq!(discovery("4.4.12").major_version(), "4");
        assert_eq!(discovery("5").major_version(), "5");
        assert_eq!(discovery("").major_version(), "");
    }

    #[test]
    fn only_major_four_is_supported() {
        assert!(check_version(&discovery("4.0.0")).is_ok());
        assert!(check_version(&discovery("4.4.12")).is_ok());
        let err = check_version(&discovery("5.1.0")).unwrap_err();
        assert_eq!(
            err,
            Error::VersionUnsupported {
                found: "5.1.0".into(),
                supported: "4".into(),
            }
        );
        assert!(check_version(&discovery("40.1")).is_err());
    }

    #[test]
    fn decodes_4x_discovery_document() {
        let doc = r#"{
            "bolt_routing": "neo4j://localhost:7687",
            "transaction": "http://localhost:7474/db/{databaseName}/tx",
            "bolt_direct": "bolt://localhost:7687",
            "neo4j_version": "4.4.12",
            "neo4j_edition": "community"
        }"#;
        let d: Discovery = serde_json::from_str(doc).unwrap();
        assert_eq!(d.routing(), "neo4j://localhost:7687");
        assert!(d.cluster.is_empty());
        assert_eq!(d.transaction, "http://localhost:7474/db/{databaseName}/tx");
        assert_eq!(d.neo4j_edition, "community");
    }

    #[test]
    fn accepts_both_routing_names() {
        let doc = r#"{
            "bolt_routing": "neo4j://new:7687",
            "cluster": "http://old:7474/db/cluster",
            "transaction": "http://localhost:7474/db/{databaseName}/tx",
            "neo4j_version": "4.0.0"
        }"#;
        let d: Discovery = serde_json::from_str(doc).unwrap();
        assert_eq!(d.routing(), "neo4j://new:7687");
        assert_eq!(d.cluster, "http://old:7474/db/cluster");

        let legacy: Discovery = serde_json::from_str(r#"{"cluster": "http://old:7474/db/cluster"}"#).unwrap();
        assert_eq!(legacy.routing(), "http://old:7474/db/cluster");
    }
}
