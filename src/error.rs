use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScraperError>;

#[derive(Debug, Error)]
pub enum ScraperError {
    /// Bad or missing configuration. Always fatal, raised before navigation.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Persist error: {0}")]
    Persist(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScraperError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScraperError::Config(_))
    }
}

impl From<thirtyfour::error::WebDriverError> for ScraperError {
    fn from(err: thirtyfour::error::WebDriverError) -> Self {
        ScraperError::Driver(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for ScraperError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        ScraperError::Persist(err.to_string())
    }
}

impl From<arrow_schema::ArrowError> for ScraperError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        ScraperError::Persist(err.to_string())
    }
}
