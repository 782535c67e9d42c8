use std::io;

use thiserror::Error;

use super::data_io::DataError;
use super::estimate::EstimateError;
use super::webdriver::BrowserError;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("emissions estimate for {page_url} failed: {source}")]
    Estimate {
        page_url: String,
        #[source]
        source: EstimateError,
    },
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("terminal output failed: {0}")]
    Terminal(#[from] io::Error),
    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl AuditError {
    /// Process exit status: 2 for bad input or output paths, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            AuditError::Data(_) => 2,
            _ => 1,
        }
    }
}
