use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::error::PopoutError;
use crate::WindowId;

pub type WindowCallback = Arc<dyn Fn(&WindowId) -> anyhow::Result<()> + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&PopoutError, Option<&WindowId>) + Send + Sync>;
/// Receives each accepted message exactly as the sender posted it.
pub type MessageCallback = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle events with a single, replaceable handler each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Ready,
    Close,
    Focus,
    Blur,
}

impl LifecycleEvent {
    pub fn handler_name(&self) -> &'static str {
        match self {
            LifecycleEvent::Ready => "onReady",
            LifecycleEvent::Close => "onClose",
            LifecycleEvent::Focus => "onFocus",
            LifecycleEvent::Blur => "onBlur",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// One slot per lifecycle event (last registration wins) plus an explicit
/// fan-out list of raw message handlers.
#[derive(Default)]
pub struct EventHandlerTable {
    ready: Option<WindowCallback>,
    close: Option<WindowCallback>,
    focus: Option<WindowCallback>,
    blur: Option<WindowCallback>,
    error: Option<ErrorCallback>,
    messages: Vec<(SubscriptionId, MessageCallback)>,
}

impl EventHandlerTable {
    pub fn set(&mut self, event: LifecycleEvent, callback: WindowCallback) {
        *self.slot_mut(event) = Some(callback);
    }

    pub fn clear(&mut self, event: LifecycleEvent) {
        *self.slot_mut(event) = None;
    }

    pub fn get(&self, event: LifecycleEvent) -> Option<WindowCallback> {
        match event {
            LifecycleEvent::Ready => self.ready.clone(),
            LifecycleEvent::Close => self.close.clone(),
            LifecycleEvent::Focus => self.focus.clone(),
            LifecycleEvent::Blur => self.blur.clone(),
        }
    }

    pub fn set_error(&mut self, callback: ErrorCallback) {
        self.error = Some(callback);
    }

    pub fn error(&self) -> Option<ErrorCallback> {
        self.error.clone()
    }

    pub fn add_message(&mut self, callback: MessageCallback) -> SubscriptionId {
        let id = SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::SeqCst));
        self.messages.push((id, callback));
        id
    }

    pub fn remove_message(&mut self, id: SubscriptionId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|(existing, _)| *existing != id);
        self.messages.len() != before
    }

    pub fn messages(&self) -> Vec<MessageCallback> {
        self.messages
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }

    fn slot_mut(&mut self, event: LifecycleEvent) -> &mut Option<WindowCallback> {
        match event {
            LifecycleEvent::Ready => &mut self.ready,
            LifecycleEvent::Close => &mut self.close,
            LifecycleEvent::Focus => &mut self.focus,
            LifecycleEvent::Blur => &mut self.blur,
        }
    }
}
