//! Shared HTTP and document decoding helpers for the data sources

use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::compat::error::FetchError;
use crate::config::{FETCH_TIMEOUT_SECS, MAX_DECODED_DOCUMENT_BYTES, USER_AGENT};

/// Build the HTTP client used by a data source component
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .expect("Failed to create HTTP client")
}

/// Map a non-success response status to the matching fetch error.
///
/// 404 becomes a typed NotFound for `what`; 429 carries the retry-after
/// header; anything else non-successful is an unexpected status.
pub fn check_status(response: &reqwest::Response, what: &str) -> Result<(), FetchError> {
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(what.to_string()));
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(FetchError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        warn!("Data source returned status {} for {}", status, what);
        return Err(FetchError::UnexpectedStatus(status.as_u16()));
    }

    Ok(())
}

/// Decode a gzip-compressed JSON document with a bounded decompressed size.
///
/// Decompression stops one byte past the ceiling so a too-large document is
/// reported as resource exhaustion rather than decoded into memory.
pub fn decode_gzip_json<T: DeserializeOwned>(
    bytes: &[u8],
    max_decoded_bytes: usize,
) -> Result<T, FetchError> {
    let mut decoded = Vec::new();
    let mut decoder = GzDecoder::new(bytes).take(max_decoded_bytes as u64 + 1);
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| FetchError::DataDecode(e.to_string()))?;

    if decoded.len() > max_decoded_bytes {
        return Err(FetchError::OutOfResource {
            limit: max_decoded_bytes,
        });
    }

    serde_json::from_slice(&decoded).map_err(|e| FetchError::DataDecode(e.to_string()))
}

/// Decode a document that may be gzip-compressed or plain JSON, selected by
/// whether its name ends in ".gz"
pub fn decode_json_document<T: DeserializeOwned>(
    file_name: &str,
    bytes: &[u8],
) -> Result<T, FetchError> {
    if file_name.ends_with(".gz") {
        decode_gzip_json(bytes, MAX_DECODED_DOCUMENT_BYTES)
    } else {
        serde_json::from_slice(bytes).map_err(|e| FetchError::DataDecode(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) fn gzip_bytes(payload: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}
