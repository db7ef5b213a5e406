#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{0}")]
    Driver(#[from] cypher_api::Error),

    #[error("invalid parameter '{0}', expected name=value")]
    Param(String),

    #[error("output: {0}")]
    Output(#[from] std::io::Error),
}
