use std::collections::HashMap;
use std::sync::Arc;

use cypher_api::{Error, Result};

use crate::config::ClientConfig;
use crate::database::Database;
use crate::transport::Transport;

/// Name under which [`Registry::with_defaults`] registers [`NeoHttpConnector`].
pub const NEOHTTP: &str = "neohttp";

/// Something that can turn a configuration into a connected database.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ClientConfig) -> Result<Database>;
}

/// Connector for the transactional HTTP endpoint.
#[derive(Clone, Default)]
pub struct NeoHttpConnector {
    transport: Option<Arc<dyn Transport>>,
}

impl NeoHttpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect through `transport` instead of a fresh [`crate::HttpTransport`].
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }
}

impl Connector for NeoHttpConnector {
    fn connect(&self, config: &ClientConfig) -> Result<Database> {
        match &self.transport {
            Some(transport) => Database::connect_with(config, transport.clone()),
            None => Database::connect(config),
        }
    }
}

/// Connectors by exact name, filled once at startup.
#[derive(Default)]
pub struct Registry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("connectors", &self.names())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `neohttp` connector.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .connectors
            .insert(NEOHTTP.to_owned(), Arc::new(NeoHttpConnector::new()));
        registry
    }

    /// Add a connector. A name can only be registered once.
    pub fn register(&mut self, name: impl Into<String>, connector: Arc<dyn Connector>) -> Result<()> {
        let name = name.into();
        if self.connectors.contains_key(&name) {
            return Err(Error::config(format!("connector '{name}' is already registered")));
        }
        tracing::debug!(connector = %name, "registered connector");
        self.connectors.insert(name, connector);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Connect with the connector registered as `name`.
    pub fn connect(&self, name: &str, config: &ClientConfig) -> Result<Database> {
        let connector = self.connectors.get(name).ok_or_else(|| {
            Error::config(format!(
                "unknown connector '{name}' (registered: {})",
                self.names().join(", ")
            ))
        })?;
        connector.connect(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refusing;

    impl Connector for Refusing {
        fn connect(&self, _config: &ClientConfig) -> Result<Database> {
            Err(Error::transport("refused"))
        }
    }

    #[test]
    fn defaults_contain_neohttp() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.names(), vec![NEOHTTP]);
        assert!(registry.get(NEOHTTP).is_some());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = Registry::with_defaults();
        let err = registry
            .register(NEOHTTP, Arc::new(Refusing))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        registry.register("refusing", Arc::new(Refusing)).unwrap();
        assert_eq!(registry.names(), vec!["neohttp", "refusing"]);
    }

    #[test]
    fn connect_dispatches_by_exact_name() {
        let mut registry = Registry::new();
        registry.register("refusing", Arc::new(Refusing)).unwrap();
        let config = ClientConfig::new("http://localhost:7474");
        assert_eq!(
            registry.connect("refusing", &config).unwrap_err(),
            Error::transport("refused")
        );
        let err = registry.connect("Refusing", &config).unwrap_err();
        assert!(err.to_string().contains("unknown connector 'Refusing'"), "{err}");
    }
}
