use std::mem::discriminant;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tauri::{AppHandle, Runtime};
use tokio::time::MissedTickBehavior;

use crate::compositor;
use crate::source::{NowPlayingSource, SourceError};
use crate::types::{Artwork, NowPlayingSnapshot, NowPlayingUpdate};
use crate::widget;

/// Turns raw snapshots into partial updates, decoding artwork only when the
/// bytes change
#[derive(Default)]
pub struct SnapshotTranslator {
    last_artwork: Option<(u64, Artwork)>,
}

impl SnapshotTranslator {
    pub fn translate(&mut self, snapshot: NowPlayingSnapshot) -> NowPlayingUpdate {
        NowPlayingUpdate {
            title: snapshot.title,
            artist: snapshot.artist,
            artwork: snapshot.artwork.and_then(|bytes| self.artwork(&bytes)),
            playing: snapshot.playback_rate.map(|rate| rate > 0.0),
        }
    }

    fn artwork(&mut self, bytes: &[u8]) -> Option<Artwork> {
        if bytes.is_empty() {
            return None;
        }

        let fingerprint = compositor::fingerprint(bytes);
        if let Some((last, artwork)) = &self.last_artwork {
            if *last == fingerprint {
                return Some(artwork.clone());
            }
        }

        match compositor::decode_artwork(bytes) {
            Ok(embedded) => {
                let artwork = Artwork::Embedded(embedded);
                self.last_artwork = Some((fingerprint, artwork.clone()));
                Some(artwork)
            }
            Err(e) => {
                log::debug!("Keeping previous artwork, decode failed: {:#}", e);
                None
            }
        }
    }
}

/// Polls the system now-playing registry on a fixed period
pub struct SystemMediaPoller {
    source: Arc<dyn NowPlayingSource>,
    interval: Duration,
}

impl SystemMediaPoller {
    pub fn new(source: Arc<dyn NowPlayingSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// Start the tick loop on the async runtime. It runs until process exit.
    pub fn spawn<R: Runtime>(self, app: AppHandle<R>) {
        log::info!("Starting system media poller every {:?}", self.interval);

        tauri::async_runtime::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let translator = Arc::new(Mutex::new(SnapshotTranslator::default()));
            let mut failures = FailureLog::default();

            loop {
                ticker.tick().await;

                let source = self.source.clone();
                let translator = translator.clone();
                let query = move || poll_once(source.as_ref(), &translator);
                let result = match tauri::async_runtime::spawn_blocking(query).await {
                    Ok(result) => result,
                    Err(e) => {
                        log::error!("Now-playing query task failed: {}", e);
                        continue;
                    }
                };

                let update = match result {
                    Ok(Some(update)) => {
                        failures.clear();
                        update
                    }
                    Ok(None) => {
                        failures.clear();
                        continue;
                    }
                    Err(e) => {
                        failures.record(&e);
                        continue;
                    }
                };

                if update.is_empty() {
                    continue;
                }

                let handle = app.clone();
                if let Err(e) = app.run_on_main_thread(move || widget::apply_update(&handle, update)) {
                    log::error!("Failed to hand update to main thread: {}", e);
                }
            }
        });
    }
}

/// Query the source and translate the reply, artwork decode included.
/// Blocks, so the tick loop runs it on the blocking pool.
fn poll_once(
    source: &dyn NowPlayingSource,
    translator: &Mutex<SnapshotTranslator>,
) -> Result<Option<NowPlayingUpdate>, SourceError> {
    let Some(snapshot) = source.fetch()? else {
        log::debug!("Nothing reported as now playing");
        return Ok(None);
    };

    log::debug!(
        "Snapshot: {:?} - {:?} (rate {:?}, artwork {} bytes)",
        snapshot.title,
        snapshot.artist,
        snapshot.playback_rate,
        snapshot.artwork.as_ref().map_or(0, Vec::len)
    );

    Ok(Some(translator.lock().translate(snapshot)))
}

/// Logs a failure loudly once, then quietly until the kind changes
#[derive(Default)]
struct FailureLog {
    last: Option<SourceError>,
}

impl FailureLog {
    fn record(&mut self, error: &SourceError) -> bool {
        let repeated = self
            .last
            .as_ref()
            .is_some_and(|last| discriminant(last) == discriminant(error));

        if repeated {
            log::debug!("Now-playing query skipped: {}", error);
        } else {
            log::warn!("Now-playing query skipped: {}", error);
            self.last = Some(error.clone());
        }
        !repeated
    }

    fn clear(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NowPlayingState;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::collections::VecDeque;
    use std::io::Cursor;

    /// Source that replays a scripted sequence of replies
    struct ScriptedSource {
        replies: Mutex<VecDeque<Result<Option<NowPlayingSnapshot>, SourceError>>>,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Result<Option<NowPlayingSnapshot>, SourceError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    impl NowPlayingSource for ScriptedSource {
        fn fetch(&self) -> Result<Option<NowPlayingSnapshot>, SourceError> {
            self.replies.lock().pop_front().unwrap_or(Ok(None))
        }
    }

    fn png(color: [u8; 4]) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba(color)))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode test image");
        bytes
    }

    fn snapshot(title: &str, artwork: Option<Vec<u8>>, rate: Option<f64>) -> NowPlayingSnapshot {
        NowPlayingSnapshot {
            title: Some(title.to_string()),
            artist: Some("Band".to_string()),
            artwork,
            playback_rate: rate,
        }
    }

    /// Drive the source the way the tick loop does, without a runtime
    fn run_ticks(source: &dyn NowPlayingSource, ticks: usize) -> NowPlayingState {
        let translator = Mutex::new(SnapshotTranslator::default());
        let mut failures = FailureLog::default();
        let mut state = NowPlayingState::default();
        for _ in 0..ticks {
            match poll_once(source, &translator) {
                Ok(Some(update)) => {
                    state.apply(update);
                }
                Ok(None) => {}
                Err(e) => {
                    failures.record(&e);
                }
            }
        }
        state
    }

    #[test]
    fn playback_rate_maps_to_playing_flag() {
        let mut translator = SnapshotTranslator::default();
        assert_eq!(translator.translate(snapshot("A", None, Some(0.0))).playing, Some(false));
        assert_eq!(translator.translate(snapshot("A", None, Some(1.0))).playing, Some(true));
        assert_eq!(translator.translate(snapshot("A", None, None)).playing, None);
    }

    #[test]
    fn undecodable_artwork_keeps_the_last_good_one() {
        let red = png([255, 0, 0, 255]);
        let source = ScriptedSource::new(vec![
            Ok(Some(snapshot("A", Some(red.clone()), Some(1.0)))),
            Ok(Some(snapshot("A", Some(b"garbage".to_vec()), Some(1.0)))),
            Ok(Some(snapshot("B", None, Some(1.0)))),
            Ok(Some(snapshot("B", Some(Vec::new()), None))),
        ]);

        let state = run_ticks(&source, 4);
        assert_eq!(state.title, "B");
        match state.artwork {
            Some(Artwork::Embedded(embedded)) => {
                assert_eq!(embedded.fingerprint, compositor::fingerprint(&red));
            }
            other => panic!("expected embedded artwork, got {:?}", other),
        }
    }

    #[test]
    fn repeated_bytes_reuse_decoded_artwork() {
        let blue = png([0, 0, 255, 255]);
        let mut translator = SnapshotTranslator::default();
        let first = translator.translate(snapshot("A", Some(blue.clone()), None));
        let second = translator.translate(snapshot("A", Some(blue), None));

        match (first.artwork, second.artwork) {
            (Some(Artwork::Embedded(a)), Some(Artwork::Embedded(b))) => {
                assert!(Arc::ptr_eq(&a.image, &b.image));
            }
            other => panic!("expected embedded artwork twice, got {:?}", other),
        }
    }

    #[test]
    fn failed_ticks_leave_state_stale() {
        let source = ScriptedSource::new(vec![
            Ok(Some(snapshot("A", None, Some(1.0)))),
            Err(SourceError::SymbolMissing("MRMediaRemoteGetNowPlayingInfo".into())),
            Err(SourceError::Timeout),
            Ok(None),
        ]);

        let state = run_ticks(&source, 4);
        assert_eq!(state.title, "A");
        assert!(state.is_playing);
    }

    #[test]
    fn repeated_failures_are_logged_once() {
        let mut failures = FailureLog::default();
        assert!(failures.record(&SourceError::FrameworkUnavailable("gone".into())));
        assert!(!failures.record(&SourceError::FrameworkUnavailable("gone".into())));
        assert!(failures.record(&SourceError::Timeout));

        failures.clear();
        assert!(failures.record(&SourceError::Timeout));
    }

    #[test]
    fn failure_log_keeps_the_reason_it_reported() {
        let mut failures = FailureLog::default();
        failures.record(&SourceError::SymbolMissing("MRMediaRemoteGetNowPlayingInfo".into()));
        match &failures.last {
            Some(SourceError::SymbolMissing(reason)) => {
                assert_eq!(reason, "MRMediaRemoteGetNowPlayingInfo");
            }
            other => panic!("expected the recorded error, got {:?}", other),
        }
    }

    #[test]
    fn blocking_query_hands_back_a_decoded_update() {
        let green = png([0, 255, 0, 255]);
        let source = ScriptedSource::new(vec![
            Ok(Some(snapshot("A", Some(green.clone()), Some(1.0)))),
            Ok(None),
            Err(SourceError::Timeout),
        ]);
        let translator = Mutex::new(SnapshotTranslator::default());

        let update = poll_once(&source, &translator).unwrap().unwrap();
        assert_eq!(update.title.as_deref(), Some("A"));
        assert_eq!(update.playing, Some(true));
        match update.artwork {
            Some(Artwork::Embedded(embedded)) => {
                assert_eq!(embedded.fingerprint, compositor::fingerprint(&green));
                assert!(embedded.data_url.starts_with("data:image/png;base64,"));
            }
            other => panic!("expected embedded artwork, got {:?}", other),
        }
        assert!(translator.lock().last_artwork.is_some());

        assert!(poll_once(&source, &translator).unwrap().is_none());
        assert!(matches!(poll_once(&source, &translator), Err(SourceError::Timeout)));
    }
}
