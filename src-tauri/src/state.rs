use std::sync::Arc;

use parking_lot::RwLock;

use crate::presentation::Presentation;
use crate::types::{Artwork, NowPlayingUpdate};

pub type SharedState = Arc<RwLock<AppState>>;

pub fn create_state() -> SharedState {
    Arc::new(RwLock::new(AppState::default()))
}

#[derive(Debug, Default)]
pub struct AppState {
    pub now_playing: NowPlayingState,
    pub presentation: Presentation,
}

/// The single now-playing record shared by both producers
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingState {
    pub title: String,
    pub artist: String,
    pub artwork: Option<Artwork>,
    pub is_playing: bool,
}

impl Default for NowPlayingState {
    fn default() -> Self {
        Self {
            title: "Not Playing".to_string(),
            artist: String::new(),
            artwork: None,
            is_playing: false,
        }
    }
}

/// Which fields an update actually touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Changes {
    pub title: bool,
    pub artist: bool,
    pub artwork: bool,
    pub playing: bool,
}

impl Changes {
    pub fn any(&self) -> bool {
        self.title || self.artist || self.artwork || self.playing
    }

    /// True when the update names a different track
    pub fn identity(&self) -> bool {
        self.title || self.artist
    }
}

impl NowPlayingState {
    /// Merge a partial update into the record.
    ///
    /// Absent or blank values never clear a populated field, and values equal
    /// to the current one are not rewritten.
    pub fn apply(&mut self, update: NowPlayingUpdate) -> Changes {
        let mut changes = Changes::default();

        if let Some(title) = non_blank(update.title) {
            if title != self.title {
                self.title = title;
                changes.title = true;
            }
        }

        if let Some(artist) = non_blank(update.artist) {
            if artist != self.artist {
                self.artist = artist;
                changes.artist = true;
            }
        }

        if let Some(artwork) = update.artwork {
            let usable = match &artwork {
                Artwork::Remote(url) => !url.trim().is_empty(),
                Artwork::Embedded(embedded) => {
                    embedded.image.width() > 0 && embedded.image.height() > 0
                }
            };
            if usable && self.artwork.as_ref() != Some(&artwork) {
                self.artwork = Some(artwork);
                changes.artwork = true;
            }
        }

        if let Some(playing) = update.playing {
            if playing != self.is_playing {
                self.is_playing = playing;
                changes.playing = true;
            }
        }

        changes
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
