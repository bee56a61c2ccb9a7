//! In-memory host used by tests and the simulator binary.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::{HostError, ScreenSize, WindowEvent, WindowHandle, WindowHost, WindowListener};
use crate::child::OpenerPort;
use crate::lock;
use crate::manager::PopoutManager;
use crate::message::InboundMessage;

#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub message: Value,
    pub target_origin: String,
}

pub struct MemoryWindow {
    url: String,
    name: String,
    features: String,
    closed: AtomicBool,
    fail_close: AtomicBool,
    posted: Mutex<Vec<PostedMessage>>,
    listeners: Mutex<Vec<WindowListener>>,
}

impl MemoryWindow {
    fn new(url: &str, name: &str, features: &str) -> Self {
        Self {
            url: url.to_string(),
            name: name.to_string(),
            features: features.to_string(),
            closed: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            posted: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &str {
        &self.features
    }

    /// Query parameters of the URL the window was opened with.
    pub fn query_params(&self) -> BTreeMap<String, String> {
        self.url
            .split_once('?')
            .and_then(|(_, query)| serde_urlencoded::from_str(query).ok())
            .unwrap_or_default()
    }

    pub fn posted(&self) -> Vec<PostedMessage> {
        lock(&self.posted).clone()
    }

    /// Dispatches a native event to every attached listener.
    pub fn fire(&self, event: WindowEvent) {
        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            listener(event);
        }
    }

    /// Marks the window closed without running any listener, as when the
    /// process behind it dies.
    pub fn crash(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl WindowHandle for MemoryWindow {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) -> Result<(), HostError> {
        if self.fail_close.swap(false, Ordering::SeqCst) {
            return Err(HostError::Rejected(format!("close of {} refused", self.name)));
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.fire(WindowEvent::Unload);
        Ok(())
    }

    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::Closed);
        }
        lock(&self.posted).push(PostedMessage {
            message: message.clone(),
            target_origin: target_origin.to_string(),
        });
        Ok(())
    }

    fn add_listener(&self, listener: WindowListener) {
        lock(&self.listeners).push(listener);
    }
}

pub struct MemoryWindowHost {
    origin: String,
    screen: ScreenSize,
    block_popups: AtomicBool,
    windows: Mutex<Vec<Arc<MemoryWindow>>>,
}

impl MemoryWindowHost {
    pub fn new(origin: impl Into<String>, screen: ScreenSize) -> Self {
        Self {
            origin: origin.into(),
            screen,
            block_popups: AtomicBool::new(false),
            windows: Mutex::new(Vec::new()),
        }
    }

    /// When set, `open` behaves like a browser with a popup blocker.
    pub fn set_block_popups(&self, block: bool) {
        self.block_popups.store(block, Ordering::SeqCst);
    }

    /// Every window ever opened, in opening order.
    pub fn windows(&self) -> Vec<Arc<MemoryWindow>> {
        lock(&self.windows).clone()
    }

    pub fn window_named(&self, name: &str) -> Option<Arc<MemoryWindow>> {
        lock(&self.windows)
            .iter()
            .find(|window| window.name == name)
            .cloned()
    }
}

impl WindowHost for MemoryWindowHost {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn screen(&self) -> ScreenSize {
        self.screen
    }

    fn open(
        &self,
        url: &str,
        name: &str,
        features: &str,
    ) -> Result<Option<Arc<dyn WindowHandle>>, HostError> {
        if self.block_popups.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let window = Arc::new(MemoryWindow::new(url, name, features));
        lock(&self.windows).push(Arc::clone(&window));
        let handle: Arc<dyn WindowHandle> = window;
        Ok(Some(handle))
    }
}

/// Child-side opener that feeds posts straight into a manager's message
/// listener, stamped with the child's origin.
pub struct ManagerOpener {
    manager: PopoutManager,
    child_origin: String,
}

impl ManagerOpener {
    pub fn new(manager: PopoutManager, child_origin: impl Into<String>) -> Self {
        Self {
            manager,
            child_origin: child_origin.into(),
        }
    }
}

impl OpenerPort for ManagerOpener {
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), HostError> {
        // A browser drops the message when the opener's origin differs from
        // the requested target.
        if target_origin != self.manager.origin() {
            return Ok(());
        }
        self.manager
            .handle_message(InboundMessage::new(self.child_origin.clone(), message.clone()));
        Ok(())
    }
}
