use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Raw now-playing data as reported by the system media registry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlayingSnapshot {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork: Option<Vec<u8>>,
    pub playback_rate: Option<f64>,
}

/// Artwork decoded from raw bytes, ready for display
#[derive(Debug, Clone)]
pub struct EmbeddedArtwork {
    pub fingerprint: u64,
    pub image: Arc<RgbaImage>,
    pub data_url: Arc<str>,
}

#[derive(Debug, Clone)]
pub enum Artwork {
    Embedded(EmbeddedArtwork),
    /// Image URL scraped from the web player
    Remote(String),
}

impl Artwork {
    /// Source usable by an `<img>` element
    pub fn src(&self) -> &str {
        match self {
            Artwork::Embedded(embedded) => &embedded.data_url,
            Artwork::Remote(url) => url,
        }
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        match self {
            Artwork::Embedded(embedded) => Some(&embedded.image),
            Artwork::Remote(_) => None,
        }
    }
}

impl PartialEq for Artwork {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Artwork::Embedded(a), Artwork::Embedded(b)) => a.fingerprint == b.fingerprint,
            (Artwork::Remote(a), Artwork::Remote(b)) => a == b,
            _ => false,
        }
    }
}

/// Partial update submitted by a producer. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlayingUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork: Option<Artwork>,
    pub playing: Option<bool>,
}

impl NowPlayingUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.artwork.is_none()
            && self.playing.is_none()
    }
}

/// Message posted by the injected scraper script.
/// Every field is optional since the page is an untrusted source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapedTrack {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Disc,
    Browser,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpinFrame {
    pub spinning: bool,
    /// Bumped on every restart; the frontend resets its angle when it changes
    pub epoch: u64,
    /// Angle at the moment the frame was built, in degrees
    pub angle: f32,
    pub degrees_per_second: f32,
}

/// Everything the widget page needs to render one state
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WidgetFrame {
    pub title: String,
    pub artist: String,
    pub artwork: Option<String>,
    pub playing: bool,
    pub mode: ViewMode,
    pub spin: SpinFrame,
}
