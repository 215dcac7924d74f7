/// Failures surfaced by the build pipeline, the artifact store and the
/// recommendation service.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("title '{0}' not found in the dataset")]
    NotFound(String),

    #[error("corrupt artifact: {0}")]
    CorruptArtifact(String),

    #[error("build failed: {0}")]
    BuildFailure(String),

    #[error("io error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
