use image::ImageFormat;
use rand::Rng;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cleanup::IMAGE_EXTENSIONS;
use crate::http::{HttpClient, HttpGet, StatusError};

pub const MIN_WIDTH: u32 = 1920;
pub const MIN_HEIGHT: u32 = 1080;

/// Why a candidate was not kept.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("network error: {0:#}")]
    Network(anyhow::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("not a decodable image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("low-resolution image: {width}x{height}")]
    TooSmall { width: u32, height: u32 },
    #[error("failed to write {}: {source}", .path.display())]
    Persist { path: PathBuf, source: io::Error },
}

impl From<anyhow::Error> for DownloadError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<StatusError>() {
            Some(status) => DownloadError::Status(status.status),
            None => DownloadError::Network(e),
        }
    }
}

pub trait ImageDownloader: Send + Sync {
    /// Path of the saved file, or `None` when the candidate was unusable.
    fn download(&self, url: &str, dir: &Path) -> Option<PathBuf>;
}

pub struct HttpDownloader<C: HttpGet = HttpClient> {
    client: C,
}

impl HttpDownloader<HttpClient> {
    pub fn new() -> Self {
        Self::with_client(HttpClient::new())
    }
}

impl Default for HttpDownloader<HttpClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: HttpGet> HttpDownloader<C> {
    pub fn with_client(client: C) -> Self {
        Self { client }
    }

    pub fn try_download(&self, url: &str, dir: &Path) -> Result<PathBuf, DownloadError> {
        let bytes = self.client.get_bytes(url)?;
        save_if_acceptable(url, &bytes, dir)
    }
}

impl<C: HttpGet> ImageDownloader for HttpDownloader<C> {
    fn download(&self, url: &str, dir: &Path) -> Option<PathBuf> {
        log::info!("Downloading: {}", url);
        match self.try_download(url, dir) {
            Ok(path) => {
                log::info!("Saved: {}", path.display());
                Some(path)
            }
            Err(e @ DownloadError::TooSmall { .. }) => {
                log::info!("Skipping {}: {}", url, e);
                None
            }
            Err(e) => {
                log::warn!("Failed to download {}: {}", url, e);
                None
            }
        }
    }
}

pub fn meets_minimum_resolution(width: u32, height: u32) -> bool {
    width >= MIN_WIDTH && height >= MIN_HEIGHT
}

/// Decodes `bytes`, checks the resolution policy and writes them unchanged
/// into `dir` under an extension matching the decoded format.
pub fn save_if_acceptable(url: &str, bytes: &[u8], dir: &Path) -> Result<PathBuf, DownloadError> {
    let format = image::guess_format(bytes)?;
    let decoded = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = (decoded.width(), decoded.height());
    if !meets_minimum_resolution(width, height) {
        return Err(DownloadError::TooSmall { width, height });
    }

    let path = dir.join(stored_filename(url, format));
    fs::create_dir_all(dir).map_err(|source| DownloadError::Persist {
        path: dir.to_path_buf(),
        source,
    })?;
    fs::write(&path, bytes).map_err(|source| DownloadError::Persist {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Last path segment of `url`, or `wallpaper_NNNN.jpg` when it has none or
/// lacks an extension.
pub fn filename_for_url(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map(|name| sanitize_filename(&name))
        .filter(|name| Path::new(name).extension().is_some_and(|ext| !ext.is_empty()));

    match segment {
        Some(name) => name,
        None => format!("wallpaper_{}.jpg", rand::thread_rng().gen_range(1000..=9999)),
    }
}

/// Extension written for `format`. Always one that cleanup removes.
pub fn saved_extension(format: ImageFormat) -> &'static str {
    format
        .extensions_str()
        .iter()
        .copied()
        .find(|ext| IMAGE_EXTENSIONS.contains(ext))
        .unwrap_or("jpg")
}

/// [`filename_for_url`] with its extension corrected to the decoded format,
/// so `get.php` holding PNG bytes is stored as `get.png`.
pub fn stored_filename(url: &str, format: ImageFormat) -> String {
    let name = filename_for_url(url);
    let path = Path::new(&name);
    let matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .is_some_and(|ext| format.extensions_str().contains(&ext.as_str()) && IMAGE_EXTENSIONS.contains(&ext.as_str()));
    if matches {
        name
    } else {
        path.with_extension(saved_extension(format))
            .to_string_lossy()
            .into_owned()
    }
}

pub fn sanitize_filename(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if sanitized.len() > 100 {
        sanitized.chars().skip(sanitized.len() - 100).collect()
    } else {
        sanitized
    }
}
