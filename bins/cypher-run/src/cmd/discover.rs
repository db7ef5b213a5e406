use std::io::Write;

use crate::config::ConnectArgs;
use crate::error::RunError;

pub fn run(args: ConnectArgs) -> Result<(), RunError> {
    let db = super::connect(&args)?;
    let discovery = db.discovery();
    let report = serde_json::json!({
        "endpoint": db.endpoint(),
        "neo4j_version": discovery.neo4j_version,
        "neo4j_edition": discovery.neo4j_edition,
        "bolt_direct": discovery.bolt_direct,
        "bolt_routing": discovery.routing(),
    });
    let mut out = std::io::stdout().lock();
    writeln!(out, "{report:#}")?;
    Ok(())
}
