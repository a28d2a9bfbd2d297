use std::time::Duration;

/// Page loaded into the player window. `capabilities/player.json` grants
/// `report_track` to this origin and no other.
pub const PLAYER_URL: &str = "https://music.youtube.com";
/// Desktop Safari, so the player serves its full web client
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Which producers feed the now-playing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sources {
    pub system: bool,
    pub web: bool,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            system: true,
            web: true,
        }
    }
}

/// Startup settings. Everything is fixed except the producer selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub player_url: &'static str,
    pub user_agent: &'static str,
    pub poll_interval: Duration,
    pub sources: Sources,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_url: PLAYER_URL,
            user_agent: USER_AGENT,
            poll_interval: POLL_INTERVAL,
            sources: Sources::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Only `SPINDLE_SOURCES` is read; it restricts which producers start.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Settings::default();
        if let Some(raw) = lookup("SPINDLE_SOURCES") {
            settings.sources = parse_sources(&raw);
        }
        settings
    }
}

fn parse_sources(raw: &str) -> Sources {
    let mut sources = Sources {
        system: false,
        web: false,
    };

    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.to_ascii_lowercase().as_str() {
            "system" => sources.system = true,
            "web" => sources.web = true,
            other => log::warn!("Unknown source in SPINDLE_SOURCES: {}", other),
        }
    }

    if !sources.system && !sources.web {
        log::warn!("SPINDLE_SOURCES enabled nothing, falling back to defaults");
        return Sources::default();
    }

    sources
}
