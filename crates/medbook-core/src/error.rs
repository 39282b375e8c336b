use thiserror::Error;

/// Failure taxonomy of the answering pipeline.
///
/// A failed probe for an existing collection is deliberately not represented
/// here: probing reports absence through `Option` and the caller falls
/// through to a fresh build.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Document load failed: {0}")]
    Load(String),

    #[error("Index build failed: {0}")]
    IndexBuild(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Generation failed: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
