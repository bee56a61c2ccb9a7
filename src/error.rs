use thiserror::Error;

use crate::host::HostError;

#[derive(Debug, Error)]
pub enum PopoutError {
    /// The host refused to open the window, usually a popup blocker.
    #[error("failed to open popout window for {url}")]
    WindowOpen {
        url: String,
        #[source]
        source: Option<HostError>,
    },
    #[error("failed to encode popout url: {0}")]
    Url(#[from] serde_urlencoded::ser::Error),
    #[error("failed to close popout window: {0}")]
    Close(#[source] HostError),
    #[error("{event} handler failed: {source}")]
    Handler {
        event: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("malformed message from {origin}: {source}")]
    MalformedMessage {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PopoutError {
    pub fn is_window_open(&self) -> bool {
        matches!(self, PopoutError::WindowOpen { .. })
    }
}
