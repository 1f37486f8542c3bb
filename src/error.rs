use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("shape error: {0}")]
    Shape(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("degenerate metric: {0}")]
    DegenerateMetric(String),
    #[error(transparent)]
    Linalg(#[from] ndarray_linalg::error::LinalgError),
}
