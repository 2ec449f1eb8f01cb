use rand::seq::SliceRandom;
use scraper::{Html, Selector};
use url::Url;

use crate::catalog::Category;
use crate::http::{HttpClient, HttpGet};

/// Produces candidate image URLs for a category.
pub trait CandidateSource: Send + Sync {
    /// Never fails; an empty list means nothing usable was found.
    fn fetch_candidates(&self, category: Category) -> Vec<String>;
}

/// Gallery sites with known scraping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    /// Listing pages carry the images inline.
    Alphacoders,
    /// Listing pages link to detail pages which carry the full image.
    Wallhaven,
}

impl Site {
    pub fn detect(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        if host.ends_with("alphacoders.com") {
            Some(Site::Alphacoders)
        } else if host.ends_with("wallhaven.cc") {
            Some(Site::Wallhaven)
        } else {
            None
        }
    }
}

pub struct GalleryFetcher<C: HttpGet = HttpClient> {
    client: C,
}

impl GalleryFetcher<HttpClient> {
    pub fn new() -> Self {
        Self::with_client(HttpClient::new())
    }
}

impl Default for GalleryFetcher<HttpClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: HttpGet> GalleryFetcher<C> {
    pub fn with_client(client: C) -> Self {
        Self { client }
    }

    /// Scrapes one gallery page. Network and parse problems are logged and
    /// produce an empty list.
    pub fn fetch_from_source(&self, source: &str) -> Vec<String> {
        let page_url = match Url::parse(source) {
            Ok(url) => url,
            Err(e) => {
                log::error!("Invalid source URL {}: {}", source, e);
                return Vec::new();
            }
        };
        let Some(site) = Site::detect(&page_url) else {
            log::warn!("No scraping rules for {}", source);
            return Vec::new();
        };

        let html = match self.client.get_text(source) {
            Ok(html) => html,
            Err(e) => {
                log::error!("Error fetching from source {}: {}", source, e);
                return Vec::new();
            }
        };

        let candidates = match site {
            Site::Alphacoders => parse_alphacoders(&page_url, &html),
            Site::Wallhaven => parse_wallhaven_previews(&page_url, &html)
                .into_iter()
                .filter_map(|detail| self.resolve_wallhaven_detail(&detail))
                .collect(),
        };
        log::info!("Found {} candidates on {}", candidates.len(), source);
        candidates
    }

    fn resolve_wallhaven_detail(&self, detail: &str) -> Option<String> {
        let detail_url = match Url::parse(detail) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Skipping malformed detail link {}: {}", detail, e);
                return None;
            }
        };
        match self.client.get_text(detail) {
            Ok(html) => parse_wallhaven_detail(&detail_url, &html),
            Err(e) => {
                log::warn!("Error processing wallhaven image {}: {}", detail, e);
                None
            }
        }
    }
}

impl<C: HttpGet> CandidateSource for GalleryFetcher<C> {
    fn fetch_candidates(&self, category: Category) -> Vec<String> {
        let Some(source) = category.sources().choose(&mut rand::thread_rng()) else {
            log::error!("No sources configured for {}", category);
            return Vec::new();
        };
        log::info!("Scraping {} wallpapers from {}", category, source);
        self.fetch_from_source(source)
    }
}

/// `src` of every `.img-responsive` element.
pub fn parse_alphacoders(page_url: &Url, html: &str) -> Vec<String> {
    select_attr(page_url, html, ".img-responsive", "src")
}

/// Detail-page links from a wallhaven search listing.
pub fn parse_wallhaven_previews(page_url: &Url, html: &str) -> Vec<String> {
    select_attr(page_url, html, ".preview", "href")
}

/// Full-size image on a wallhaven detail page.
pub fn parse_wallhaven_detail(page_url: &Url, html: &str) -> Option<String> {
    select_attr(page_url, html, "#wallpaper", "src").into_iter().next()
}

/// Resolves protocol-relative and relative links against the page.
pub fn absolutize(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = base.join(raw).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn select_attr(page_url: &Url, html: &str, css: &str, attr: &str) -> Vec<String> {
    let selector = match Selector::parse(css) {
        Ok(selector) => selector,
        Err(e) => {
            log::error!("Invalid selector {}: {}", css, e);
            return Vec::new();
        }
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .filter_map(|value| absolutize(page_url, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeHttp {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeHttp {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpGet for FakeHttp {
        fn get_text(&self, url: &str) -> Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("connection refused: {}", url))
        }

        fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.get_text(url).map(String::into_bytes)
        }
    }

    const ALPHA_PAGE: &str = "https://wall.alphacoders.com/by_category.php?id=15";
    const HAVEN_PAGE: &str = "https://wallhaven.cc/search?q=nature";

    #[test]
    fn alphacoders_images_are_read_inline_and_made_absolute() {
        let html = r#"
            <div class="thumb">
              <img class="img-responsive" src="//images.alphacoders.com/1/one.jpg">
              <img class="img-responsive" src="https://images.alphacoders.com/2/two.png">
              <img class="img-responsive">
              <img class="avatar" src="//images.alphacoders.com/avatar.jpg">
            </div>"#;
        let fetcher = GalleryFetcher::with_client(FakeHttp::new(&[(ALPHA_PAGE, html)]));

        assert_eq!(
            fetcher.fetch_from_source(ALPHA_PAGE),
            vec![
                "https://images.alphacoders.com/1/one.jpg".to_string(),
                "https://images.alphacoders.com/2/two.png".to_string(),
            ]
        );
    }

    #[test]
    fn wallhaven_failed_detail_page_skips_only_that_candidate() {
        let listing = r#"
            <ul>
              <li><a class="preview" href="https://wallhaven.cc/w/aaa"></a></li>
              <li><a class="preview" href="https://wallhaven.cc/w/bbb"></a></li>
              <li><a class="preview" href="https://wallhaven.cc/w/ccc"></a></li>
            </ul>"#;
        let detail_a = r#"<img id="wallpaper" src="https://w.wallhaven.cc/full/aa/wallhaven-aaa.jpg">"#;
        let detail_c = r#"<img id="wallpaper" src="//w.wallhaven.cc/full/cc/wallhaven-ccc.png">"#;
        let http = FakeHttp::new(&[
            (HAVEN_PAGE, listing),
            ("https://wallhaven.cc/w/aaa", detail_a),
            ("https://wallhaven.cc/w/ccc", detail_c),
        ]);
        let fetcher = GalleryFetcher::with_client(http);

        assert_eq!(
            fetcher.fetch_from_source(HAVEN_PAGE),
            vec![
                "https://w.wallhaven.cc/full/aa/wallhaven-aaa.jpg".to_string(),
                "https://w.wallhaven.cc/full/cc/wallhaven-ccc.png".to_string(),
            ]
        );
        assert_eq!(fetcher.client.requested.lock().unwrap().len(), 4);
    }

    #[test]
    fn unreachable_source_gives_empty_list() {
        let fetcher = GalleryFetcher::with_client(FakeHttp::new(&[]));
        assert!(fetcher.fetch_from_source(ALPHA_PAGE).is_empty());
    }

    #[test]
    fn unknown_site_is_not_requested() {
        let fetcher = GalleryFetcher::with_client(FakeHttp::new(&[]));
        assert!(fetcher.fetch_from_source("https://example.com/gallery").is_empty());
        assert!(fetcher.client.requested.lock().unwrap().is_empty());
    }

    #[test]
    fn fetch_candidates_uses_a_catalog_source() {
        let http = FakeHttp::new(&[]);
        let fetcher = GalleryFetcher::with_client(http);
        assert!(fetcher.fetch_candidates(Category::Nature).is_empty());

        let requested = fetcher.client.requested.lock().unwrap();
        assert_eq!(requested.len(), 1);
        assert!(Category::Nature.sources().contains(&requested[0].as_str()));
    }

    #[test]
    fn absolutize_handles_relative_forms() {
        let base = Url::parse("https://wallhaven.cc/search?q=x").unwrap();
        assert_eq!(
            absolutize(&base, "//w.wallhaven.cc/a.jpg").as_deref(),
            Some("https://w.wallhaven.cc/a.jpg")
        );
        assert_eq!(
            absolutize(&base, "/w/abc").as_deref(),
            Some("https://wallhaven.cc/w/abc")
        );
        assert_eq!(absolutize(&base, "   "), None);
        assert_eq!(absolutize(&base, "data:image/png;base64,AAAA"), None);
    }
}
