use crate::market::scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoinWatchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Malformed numeric value for {field}: '{value}'")]
    MalformedNumeric { field: &'static str, value: String },

    #[error("Duplicate currency key: {0}")]
    DuplicateKey(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<reqwest::Error> for CoinWatchError {
    fn from(e: reqwest::Error) -> Self {
        let url = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        CoinWatchError::Network(format!("{} (url: {})", e, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn restore_terminal() -> Result<(), CoinWatchError> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"))?;
        Ok(())
    }

    #[test]
    fn test_terminal_io_failure_maps_to_io_error() {
        let err = restore_terminal().unwrap_err();
        assert!(matches!(err, CoinWatchError::IoError(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(err.to_string(), "IO error: terminal closed");
    }
}
