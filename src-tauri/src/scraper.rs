use anyhow::{Context, Result};
use tauri::{AppHandle, Manager, Runtime, WebviewUrl, WebviewWindow, WebviewWindowBuilder};

use crate::settings::Settings;
use crate::types::{Artwork, NowPlayingUpdate, ScrapedTrack};
use crate::widget;

pub const PLAYER_LABEL: &str = "player";

const SCRAPER_SCRIPT: &str = include_str!("scripts/scraper.js");

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const BYLINE_DELIMITER: char = '•';
/// Size directive understood by the player's image CDN
const LARGE_ARTWORK_SUFFIX: &str = "=w1200-h1200-l100-rj";

/// Owns the embedded web player and the script that watches it
pub struct WebPlayerScraper;

impl WebPlayerScraper {
    /// Create the hidden player window and start loading the page
    pub fn build<R: Runtime>(app: &AppHandle<R>, settings: &Settings) -> Result<WebviewWindow<R>> {
        let url = settings
            .player_url
            .parse()
            .with_context(|| format!("Invalid player URL: {}", settings.player_url))?;

        // Keeps the login session across restarts. WebKit on macOS persists
        // its default store on its own and ignores this directory.
        let data_dir = app
            .path()
            .app_data_dir()
            .context("Failed to resolve app data directory")?
            .join("player");

        log::info!("Loading web player {} (data in {:?})", settings.player_url, data_dir);

        WebviewWindowBuilder::new(app, PLAYER_LABEL, WebviewUrl::External(url))
            .title("Spindle Browser")
            .inner_size(360.0, 460.0)
            .visible(false)
            .user_agent(settings.user_agent)
            .data_directory(data_dir)
            .initialization_script(SCRAPER_SCRIPT)
            .build()
            .context("Failed to create player window")
    }
}

/// Bridge endpoint for the injected script. Runs on the main thread.
#[tauri::command]
pub fn report_track(app: AppHandle, track: ScrapedTrack) {
    log::debug!("Scraped track: {:?}", track);
    widget::apply_update(&app, normalize(track));
}

/// Validate and clean a scraped message. The page is untrusted, so every
/// field is defaulted or dropped rather than trusted.
pub fn normalize(track: ScrapedTrack) -> NowPlayingUpdate {
    NowPlayingUpdate {
        title: track
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        artist: Some(extract_artist(track.artist.as_deref())),
        artwork: track
            .artwork
            .as_deref()
            .and_then(upsize_artwork)
            .map(Artwork::Remote),
        playing: None,
    }
}

/// First segment of a "Artist • Album • Year" byline
fn extract_artist(byline: Option<&str>) -> String {
    byline
        .filter(|b| b.contains(BYLINE_DELIMITER))
        .and_then(|b| b.split(BYLINE_DELIMITER).next())
        .map(str::trim)
        .filter(|artist| !artist.is_empty())
        .unwrap_or(UNKNOWN_ARTIST)
        .to_string()
}

/// Swap the trailing size directive for a large rendition.
/// Returns `None` for anything that is not an http(s) URL.
fn upsize_artwork(src: &str) -> Option<String> {
    let src = src.trim();
    if !(src.starts_with("https://") || src.starts_with("http://")) {
        return None;
    }

    let last_segment = src.rfind('/').map_or(src, |idx| &src[idx + 1..]);
    if src.contains('?') || !last_segment.contains('=') {
        return Some(src.to_string());
    }

    let cut = src.rfind('=')?;
    Some(format!("{}{}", &src[..cut], LARGE_ARTWORK_SUFFIX))
}
