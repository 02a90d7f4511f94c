use costatlas::utils::errors::CostAtlasError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("Chart error: {0}")]
    ChartErr(String),
    #[error("Report service error: {0}")]
    ServiceErr(String),
    #[error("Serialization error: {0}")]
    SerializationErr(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoErr(#[from] std::io::Error),
    #[error("CostAtlasError: {0}")]
    AtlasErr(#[from] CostAtlasError),
}

pub type Result<T> = std::result::Result<T, ReportingError>;

impl From<ReportingError> for String {
    fn from(e: ReportingError) -> Self {
        e.to_string()
    }
}
