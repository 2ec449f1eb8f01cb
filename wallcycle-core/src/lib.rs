//! Scrape, download and apply desktop wallpapers on a timer.

pub mod autostart;
pub mod catalog;
pub mod cleanup;
pub mod config;
pub mod cycle;
pub mod downloader;
pub mod fetcher;
pub mod http;
pub mod scheduler;
pub mod wallpaper;

pub use catalog::Category;
pub use cleanup::cleanup;
pub use config::{ConfigStore, Setting, Settings};
pub use cycle::{CycleOutcome, WallpaperChanger};
pub use downloader::{DownloadError, HttpDownloader, ImageDownloader};
pub use fetcher::{CandidateSource, GalleryFetcher};
pub use http::{HttpClient, HttpGet};
pub use scheduler::{schedule, Scheduler, TaskHandle};
pub use wallpaper::{platform_service, DesktopEnvironment, WallpaperService};
