use url::Url;

use crate::session::SurfaceKind;
use crate::transport::TransportError;

/// Where and as whom a surface joins the relay server.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// The WebSocket URL or bare host
    pub url: String,
    pub room: String,
    pub surface: SurfaceKind,
    /// Whether to use TLS (wss:// vs ws://) for bare hosts
    pub use_tls: bool,
}

impl WebSocketConfig {
    pub fn new(url: impl Into<String>, room: impl Into<String>, surface: SurfaceKind) -> Self {
        let url = url.into();
        // Auto-detect TLS based on URL
        let use_tls = url.starts_with("wss://")
            || (!url.starts_with("ws://")
                && !url.contains("127.0.0.1")
                && !url.contains("localhost"));
        Self {
            url,
            room: room.into(),
            surface,
            use_tls,
        }
    }

    /// Full dial URL with `room` and `role` query parameters.
    pub fn build_url(&self) -> Result<Url, TransportError> {
        let mut raw = self.url.clone();
        if !raw.starts_with("ws://") && !raw.starts_with("wss://") {
            raw = if self.use_tls {
                format!("wss://{raw}")
            } else {
                format!("ws://{raw}")
            };
        }
        // Normalize localhost to avoid IPv6 issues
        raw = raw.replacen("//localhost", "//127.0.0.1", 1);

        let mut url = Url::parse(&raw).map_err(|err| TransportError::Connect(format!("{raw}: {err}")))?;
        url.query_pairs_mut()
            .append_pair("room", &self.room)
            .append_pair("role", self.surface.as_str());
        Ok(url)
    }
}
