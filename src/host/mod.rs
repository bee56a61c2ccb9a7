//! Capability interface over the browser primitives the manager needs.
//!
//! The manager never talks to a real browser directly. It opens windows, closes
//! them and posts messages through [`WindowHost`] and [`WindowHandle`], which
//! keeps the lifecycle logic testable against [`memory::MemoryWindowHost`].

pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("window is already closed")]
    Closed,
    #[error("host rejected the request: {0}")]
    Rejected(String),
}

/// Native window events the manager listens for on every popout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowEvent {
    Load,
    Unload,
    Focus,
    Blur,
}

impl WindowEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowEvent::Load => "load",
            WindowEvent::Unload => "unload",
            WindowEvent::Focus => "focus",
            WindowEvent::Blur => "blur",
        }
    }
}

impl fmt::Display for WindowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

pub type WindowListener = Arc<dyn Fn(WindowEvent) + Send + Sync>;

/// The page hosting the manager.
pub trait WindowHost: Send + Sync {
    /// Origin of the current page, e.g. `https://app.example.com`.
    fn origin(&self) -> String;

    fn screen(&self) -> ScreenSize;

    /// Opens a window. `Ok(None)` means the host returned no handle, which is
    /// what a popup blocker does.
    fn open(
        &self,
        url: &str,
        name: &str,
        features: &str,
    ) -> Result<Option<Arc<dyn WindowHandle>>, HostError>;
}

/// A window opened through [`WindowHost::open`].
pub trait WindowHandle: Send + Sync {
    fn is_closed(&self) -> bool;

    fn close(&self) -> Result<(), HostError>;

    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), HostError>;

    fn add_listener(&self, listener: WindowListener);
}
