use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cypher-run", about = "Run Cypher statements over the Neo4j HTTP API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run statements and print every row as a JSON object
    Run(RunArgs),
    /// Print what the server's discovery endpoint reports
    Discover(ConnectArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ConnectArgs {
    /// Path to the TOML connection config
    #[arg(long, default_value = "cypher.toml", env = "CYPHER_CONFIG")]
    pub config: String,

    /// Registered connector to connect with
    #[arg(long, default_value = neohttp::NEOHTTP)]
    pub connector: String,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Parameter passed to every statement, as name=value. The value is read
    /// as JSON and falls back to a plain string.
    #[arg(long = "param", short = 'p', value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Run all statements in one explicit transaction instead of autocommit
    #[arg(long)]
    pub tx: bool,

    /// Cypher statements, run in order
    #[arg(required = true)]
    pub statements: Vec<String>,
}
