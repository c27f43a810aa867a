//! Remote documents fetched over HTTP(S).

use std::io::Read;
use std::time::Duration;

use log::debug;
use thiserror::Error;

use crate::document::Document;
use crate::error::CsvError;

/// Default timeout for HTTP requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while downloading a remote document.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP error {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<HttpError> for CsvError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::InvalidUrl(msg) => CsvError::InvalidArgument(msg),
            other => CsvError::StreamUnavailable(other.to_string()),
        }
    }
}

/// Download `url` into an in-memory document.
pub fn fetch_document(url: &str) -> crate::Result<Document> {
    Ok(Document::from_bytes(fetch(url, None)?))
}

/// Download at most `max_bytes` of `url`, or the whole body when `None`.
pub fn fetch(url: &str, max_bytes: Option<usize>) -> Result<Vec<u8>, HttpError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(HttpError::InvalidUrl(format!(
            "URL must start with http:// or https://: {url}"
        )));
    }

    let config = ureq::Agent::config_builder()
        .timeout_global(Some(DEFAULT_TIMEOUT))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let response = agent.get(url).call().map_err(|err| match err {
        ureq::Error::StatusCode(status) => HttpError::HttpStatus {
            status,
            url: url.to_string(),
        },
        other => HttpError::Network(other.to_string()),
    })?;

    let mut reader = response.into_body().into_reader();
    let mut data = Vec::new();
    match max_bytes {
        Some(limit) => {
            reader.take(limit as u64).read_to_end(&mut data)?;
        }
        None => {
            reader.read_to_end(&mut data)?;
        }
    }
    debug!("fetched {} bytes from {url}", data.len());
    Ok(data)
}
