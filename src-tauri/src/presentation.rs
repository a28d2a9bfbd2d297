use std::time::Instant;

use crate::state::{Changes, NowPlayingState};
use crate::types::{SpinFrame, ViewMode, WidgetFrame};

/// One full revolution every eight seconds
const REVOLUTION_SECS: f32 = 8.0;
const DEGREES_PER_SECOND: f32 = 360.0 / REVOLUTION_SECS;

/// Rotation of the disc, restarted explicitly instead of on a timer
#[derive(Debug, Clone)]
pub struct DiscSpin {
    spinning: bool,
    epoch: u64,
    started_at: Instant,
}

impl DiscSpin {
    pub fn new() -> Self {
        Self {
            spinning: true,
            epoch: 0,
            started_at: Instant::now(),
        }
    }

    /// Reset progress to zero and start spinning again
    pub fn restart(&mut self) {
        self.spinning = true;
        self.epoch = self.epoch.wrapping_add(1);
        self.started_at = Instant::now();
    }

    pub fn stop(&mut self) {
        self.spinning = false;
    }

    pub fn is_spinning(&self) -> bool {
        self.spinning
    }

    /// Angle in degrees within `[0, 360)`
    pub fn angle_at(&self, now: Instant) -> f32 {
        if !self.spinning {
            return 0.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f32();
        (elapsed * DEGREES_PER_SECOND).rem_euclid(360.0)
    }

    fn frame(&self) -> SpinFrame {
        SpinFrame {
            spinning: self.spinning,
            epoch: self.epoch,
            angle: self.angle_at(Instant::now()),
            degrees_per_second: DEGREES_PER_SECOND,
        }
    }
}

impl Default for DiscSpin {
    fn default() -> Self {
        Self::new()
    }
}

/// Disc view and browser overlay, with the disc rotation
#[derive(Debug, Clone, Default)]
pub struct Presentation {
    mode: ViewMode,
    spin: DiscSpin,
}

impl Presentation {
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// React to a store update. Returns true if the spin restarted.
    pub fn observe(&mut self, changes: &Changes) -> bool {
        if changes.identity() && self.mode == ViewMode::Disc {
            self.spin.restart();
            return true;
        }
        false
    }

    /// The view a toggle would switch to. Nothing changes until
    /// [`Presentation::set_mode`] is called.
    pub fn next_mode(&self) -> ViewMode {
        match self.mode {
            ViewMode::Disc => ViewMode::Browser,
            ViewMode::Browser => ViewMode::Disc,
        }
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        match mode {
            ViewMode::Browser => self.show_browser(),
            ViewMode::Disc => self.show_disc(),
        }
    }

    pub fn show_browser(&mut self) {
        self.mode = ViewMode::Browser;
        self.spin.stop();
    }

    pub fn show_disc(&mut self) {
        if self.mode == ViewMode::Browser || !self.spin.is_spinning() {
            self.spin.restart();
        }
        self.mode = ViewMode::Disc;
    }

    pub fn frame(&self, now_playing: &NowPlayingState) -> WidgetFrame {
        WidgetFrame {
            title: now_playing.title.clone(),
            artist: now_playing.artist.clone(),
            artwork: now_playing.artwork.as_ref().map(|a| a.src().to_string()),
            playing: now_playing.is_playing,
            mode: self.mode,
            spin: self.spin.frame(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Artwork, NowPlayingUpdate};
    use std::time::Duration;

    #[test]
    fn overlay_round_trip_resumes_spinning() {
        let mut presentation = Presentation::default();
        assert!(presentation.spin.is_spinning());

        presentation.set_mode(presentation.next_mode());
        assert_eq!(presentation.mode(), ViewMode::Browser);
        assert!(!presentation.spin.is_spinning());

        let before = presentation.spin.epoch;
        presentation.set_mode(presentation.next_mode());
        assert_eq!(presentation.mode(), ViewMode::Disc);
        assert!(presentation.spin.is_spinning());
        assert!(presentation.spin.epoch > before);
    }

    #[test]
    fn next_mode_does_not_switch_views() {
        let mut presentation = Presentation::default();
        let epoch = presentation.spin.epoch;

        assert_eq!(presentation.next_mode(), ViewMode::Browser);
        assert_eq!(presentation.mode(), ViewMode::Disc);
        assert!(presentation.spin.is_spinning());
        assert_eq!(presentation.spin.epoch, epoch);

        presentation.show_browser();
        assert_eq!(presentation.next_mode(), ViewMode::Disc);
        assert_eq!(presentation.mode(), ViewMode::Browser);
        assert!(!presentation.spin.is_spinning());
    }

    #[test]
    fn identity_change_restarts_spin() {
        let mut presentation = Presentation::default();
        let epoch = presentation.spin.epoch;

        let restarted = presentation.observe(&Changes {
            title: true,
            ..Default::default()
        });
        assert!(restarted);
        assert_eq!(presentation.spin.epoch, epoch + 1);

        let restarted = presentation.observe(&Changes {
            artwork: true,
            playing: true,
            ..Default::default()
        });
        assert!(!restarted);
        assert_eq!(presentation.spin.epoch, epoch + 1);
    }

    #[test]
    fn hidden_disc_is_not_restarted_by_updates() {
        let mut presentation = Presentation::default();
        presentation.show_browser();
        presentation.observe(&Changes {
            title: true,
            ..Default::default()
        });
        assert!(!presentation.spin.is_spinning());

        presentation.show_disc();
        assert!(presentation.spin.is_spinning());
    }

    #[test]
    fn angle_advances_at_constant_speed() {
        let spin = DiscSpin::new();
        let start = spin.started_at;
        assert_eq!(spin.angle_at(start), 0.0);

        let quarter = spin.angle_at(start + Duration::from_secs(2));
        assert!((quarter - 90.0).abs() < 0.01);

        let wrapped = spin.angle_at(start + Duration::from_secs(10));
        assert!((wrapped - 90.0).abs() < 0.01);
    }

    #[test]
    fn frame_carries_state_and_mode() {
        let mut now_playing = NowPlayingState::default();
        now_playing.apply(NowPlayingUpdate {
            title: Some("Song A".into()),
            artist: Some("Band".into()),
            artwork: Some(Artwork::Remote("https://img/x=w1200-h1200-l100-rj".into())),
            playing: Some(true),
        });

        let presentation = Presentation::default();
        let frame = presentation.frame(&now_playing);
        assert_eq!(frame.title, "Song A");
        assert_eq!(frame.artist, "Band");
        assert_eq!(
            frame.artwork.as_deref(),
            Some("https://img/x=w1200-h1200-l100-rj")
        );
        assert!(frame.playing);
        assert_eq!(frame.mode, ViewMode::Disc);
        assert!(frame.spin.spinning);
    }
}
