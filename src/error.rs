use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("MEGNO requested before megno_init was called")]
    MegnoNotInitialized,

    #[error("Particle not found: {0}")]
    ParticleNotFound(String),

    #[error("Degenerate orbit: {0}")]
    DegenerateOrbit(&'static str),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Binary snapshot error: {0}")]
    BincodeError(#[from] bincode::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn invalid_configuration<T, S: Into<String>>(message: S) -> Result<T> {
    Err(Error::InvalidConfiguration(message.into()))
}
