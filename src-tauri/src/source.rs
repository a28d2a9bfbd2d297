use std::sync::Arc;

use thiserror::Error;

use crate::types::NowPlayingSnapshot;

#[derive(Debug, Clone, Error)]
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub enum SourceError {
    #[error("media framework could not be loaded: {0}")]
    FrameworkUnavailable(String),
    #[error("symbol not found in media framework: {0}")]
    SymbolMissing(String),
    #[error("no reply from the media registry in time")]
    Timeout,
}

/// Anything that can be asked for the current now-playing snapshot.
///
/// `Ok(None)` means the source answered but nothing is playing.
pub trait NowPlayingSource: Send + Sync {
    fn fetch(&self) -> Result<Option<NowPlayingSnapshot>, SourceError>;
}

/// The system-wide source for this platform, if there is one
#[cfg(target_os = "macos")]
pub fn system_source() -> Option<Arc<dyn NowPlayingSource>> {
    Some(Arc::new(crate::media_remote::MediaRemoteSource::new()))
}

#[cfg(not(target_os = "macos"))]
pub fn system_source() -> Option<Arc<dyn NowPlayingSource>> {
    log::info!("No system now-playing source on this platform");
    None
}
