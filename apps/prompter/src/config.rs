use std::env;
use std::time::Duration;

const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8080/ws";
const DEFAULT_ROOM: &str = "default";

/// Timing and geometry knobs shared by every sync component of a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Quiet period after the last user scroll before the position is broadcast.
    pub scroll_debounce: Duration,
    /// Quiet period after the last resize before the view is re-anchored.
    pub resize_debounce: Duration,
    pub checkpoint_interval: Duration,
    pub reconnect_delay: Duration,
    /// How long a resolver-driven jump holds the motion guard.
    pub jump_settle: Duration,
    pub frame_interval: Duration,
    /// Distance of the tracking line below the viewport top, in pixels.
    pub tracking_line_offset: f64,
    pub anchor_text_len: usize,
    /// Autoplay pixels per second at speed 1.0 and the default font size.
    pub base_scroll_rate: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scroll_debounce: Duration::from_millis(250),
            resize_debounce: Duration::from_millis(250),
            checkpoint_interval: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(5),
            jump_settle: Duration::from_millis(600),
            frame_interval: Duration::from_millis(16),
            tracking_line_offset: 100.0,
            anchor_text_len: 60,
            base_scroll_rate: 40.0,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scroll_debounce: env_millis("PROMPTER_SCROLL_DEBOUNCE_MS", defaults.scroll_debounce),
            resize_debounce: env_millis("PROMPTER_RESIZE_DEBOUNCE_MS", defaults.resize_debounce),
            checkpoint_interval: env_millis(
                "PROMPTER_CHECKPOINT_INTERVAL_MS",
                defaults.checkpoint_interval,
            ),
            reconnect_delay: env_millis("PROMPTER_RECONNECT_DELAY_MS", defaults.reconnect_delay),
            ..defaults
        }
    }
}

/// Prompter surface configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub room: String,
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let server_url =
            env::var("PROMPTER_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        // Normalize localhost to IPv4 to avoid IPv6 (::1) preference on macOS
        let server_url = server_url.replacen("//localhost", "//127.0.0.1", 1);
        let room = env::var("PROMPTER_ROOM")
            .ok()
            .filter(|room| !room.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROOM.to_string());
        Self {
            server_url,
            room,
            sync: SyncConfig::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            room: DEFAULT_ROOM.to_string(),
            sync: SyncConfig::default(),
        }
    }
}

fn env_millis(var: &str, default: Duration) -> Duration {
    env::var(var)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
