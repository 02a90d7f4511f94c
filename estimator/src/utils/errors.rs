use costatlas::utils::errors::CostAtlasError;
use reporting::utils::errors::ReportingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("Configuration error: {0}")]
    ConfigErr(String),
    #[error("Invalid TOML: {0}")]
    TomlErr(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    IoErr(#[from] std::io::Error),
    #[error("CostAtlasError: {0}")]
    AtlasErr(#[from] CostAtlasError),
    #[error("ReportingError: {0}")]
    ReportingErr(#[from] ReportingError),
}

pub type Result<T> = std::result::Result<T, EstimatorError>;

impl From<EstimatorError> for String {
    fn from(e: EstimatorError) -> Self {
        e.to_string()
    }
}
