use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wallpaper theme selectable in the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    VideoGames,
    Nature,
    Abstract,
    Anime,
    SciFi,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::VideoGames,
        Category::Nature,
        Category::Abstract,
        Category::Anime,
        Category::SciFi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::VideoGames => "video_games",
            Category::Nature => "nature",
            Category::Abstract => "abstract",
            Category::Anime => "anime",
            Category::SciFi => "sci_fi",
        }
    }

    /// Gallery search pages scraped for this category.
    pub fn sources(&self) -> &'static [&'static str] {
        match self {
            Category::VideoGames => &[
                "https://wall.alphacoders.com/by_category.php?id=3&name=Video+Game+Wallpapers",
                "https://wallhaven.cc/search?q=video+games&categories=111&purity=100&resolutions=1920x1080,2560x1440,3840x2160&sorting=random",
            ],
            Category::Nature => &[
                "https://wall.alphacoders.com/by_category.php?id=15&name=Nature+Wallpapers",
                "https://wallhaven.cc/search?q=nature&categories=111&purity=100&resolutions=1920x1080,2560x1440,3840x2160&sorting=random",
            ],
            Category::Abstract => &[
                "https://wall.alphacoders.com/by_category.php?id=7&name=Abstract+Wallpapers",
                "https://wallhaven.cc/search?q=abstract&categories=111&purity=100&resolutions=1920x1080,2560x1440,3840x2160&sorting=random",
            ],
            Category::Anime => &[
                "https://wall.alphacoders.com/by_category.php?id=1&name=Anime+Wallpapers",
                "https://wallhaven.cc/search?q=anime&categories=111&purity=100&resolutions=1920x1080,2560x1440,3840x2160&sorting=random",
            ],
            Category::SciFi => &[
                "https://wall.alphacoders.com/by_category.php?id=30&name=Sci+Fi+Wallpapers",
                "https://wallhaven.cc/search?q=sci-fi&categories=111&purity=100&resolutions=1920x1080,2560x1440,3840x2160&sorting=random",
            ],
        }
    }

    /// Parses a stored category name, falling back to the default theme for
    /// anything unrecognised.
    pub fn from_name_or_default(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == s.trim())
            .ok_or_else(|| anyhow::anyhow!("unknown wallpaper category: {}", s))
    }
}
