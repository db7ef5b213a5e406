pub mod discover;
pub mod run;

use neohttp::{ClientConfig, Database, Registry};

use crate::config::ConnectArgs;
use crate::error::RunError;

pub(crate) fn connect(args: &ConnectArgs) -> Result<Database, RunError> {
    let config = ClientConfig::load(&args.config)?;
    tracing::info!(config = %args.config, uri = %config.uri, database = %config.database, "loaded config");
    let registry = Registry::with_defaults();
    Ok(registry.connect(&args.connector, &config)?)
}
