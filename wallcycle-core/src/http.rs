use anyhow::{bail, Context, Result};
use std::io::Read;
use std::time::Duration;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(120);

/// Largest body `get_bytes` accepts.
pub const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// A non-2xx answer from the server.
#[derive(Debug, thiserror::Error)]
#[error("{url} returned HTTP {status}")]
pub struct StatusError {
    pub url: String,
    pub status: u16,
}

/// Blocking GET used by the fetcher and downloader.
pub trait HttpGet: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String>;
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpClient;

impl HttpClient {
    pub fn new() -> Self {
        Self
    }

    fn send(&self, url: &str) -> Result<attohttpc::Response> {
        let response = attohttpc::get(url)
            .header("User-Agent", USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .send()?;

        if !response.is_success() {
            return Err(StatusError {
                url: url.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }
        Ok(response)
    }
}

impl HttpGet for HttpClient {
    fn get_text(&self, url: &str) -> Result<String> {
        Ok(self.send(url)?.text()?)
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let (_, _, reader) = self.send(url)?.split();
        read_capped(reader, MAX_BODY_BYTES).with_context(|| format!("Failed to read {}", url))
    }
}

/// Streams `reader` into memory, failing once more than `limit` bytes arrive.
pub fn read_capped<R: Read>(reader: R, limit: u64) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader.take(limit + 1).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        bail!("response body exceeds {} bytes", limit);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn body_up_to_the_limit_is_read() {
        let body = read_capped(Cursor::new(vec![7u8; 16]), 16).unwrap();
        assert_eq!(body.len(), 16);
        assert!(read_capped(Cursor::new(Vec::new()), 16).unwrap().is_empty());
    }

    #[test]
    fn oversized_body_is_refused() {
        let err = read_capped(Cursor::new(vec![7u8; 17]), 16).unwrap_err();
        assert!(err.to_string().contains("exceeds 16 bytes"));
    }
}
