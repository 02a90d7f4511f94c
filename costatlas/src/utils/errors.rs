use thiserror::Error;

/// # CostAtlasError
/// Errors raised by the loading, fitting, simulation and risk stages.
#[derive(Debug, Error)]
pub enum CostAtlasError {
    #[error("Data error: {0}")]
    DataErr(String),
    #[error("Fit error: {0}")]
    FitErr(String),
    #[error("Simulation error: {0}")]
    SimulationErr(String),
    #[error("Not found: {0}")]
    NotFoundErr(String),
    #[error("IO error: {0}")]
    IoErr(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvErr(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, CostAtlasError>;

impl From<CostAtlasError> for String {
    fn from(e: CostAtlasError) -> Self {
        e.to_string()
    }
}
