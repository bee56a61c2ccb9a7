//! Cross-window messaging: origin-checked inbound dispatch and outbound
//! send/broadcast.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PopoutError;
use crate::host::{HostError, WindowHandle};
use crate::lock;
use crate::manager::PopoutManager;
use crate::message::{ControlMessage, InboundMessage, PopoutMessage, POPOUT_CLOSED};
use crate::WindowId;

impl PopoutManager {
    /// Posts `{type, data}` to one window. A missing or closed window makes
    /// this a no-op.
    pub fn send_message(&self, id: &WindowId, kind: &str, data: Value) {
        self.post(id, &PopoutMessage::with_data(kind, data));
    }

    /// Posts `{type, data}` to every open window.
    pub fn broadcast_message(&self, kind: &str, data: Value) {
        let message = PopoutMessage::with_data(kind, data).to_value();
        let origin = self.inner.host.origin();
        let handles = lock(&self.inner.registry).open_handles();
        for (id, handle) in handles {
            deliver(&id, handle.as_ref(), &message, &origin);
        }
    }

    /// Page-level `message` listener.
    ///
    /// Only messages whose origin equals the page origin are accepted; anything
    /// else is dropped before it can reach a handler or the registry.
    ///
    /// `popout-*` control messages drive child bookkeeping (`popout-closed`
    /// closes the window, ready/focus/blur mark it active). A control message
    /// without a valid `popoutId` is reported as malformed and skips the
    /// bookkeeping. Every accepted message, control or not, is then forwarded
    /// unchanged to every raw message handler.
    pub fn handle_message(&self, event: InboundMessage) {
        let origin = self.inner.host.origin();
        if event.origin != origin {
            debug!(target: "popout::bus", origin = %event.origin, "discarded cross-origin message");
            return;
        }

        let control = match ControlMessage::decode(&event.data) {
            Ok(control) => control,
            Err(source) => {
                let err = PopoutError::MalformedMessage {
                    origin: event.origin.clone(),
                    source,
                };
                self.report_error(&err, None);
                None
            }
        };

        if let Some(control) = &control {
            match control.kind.as_str() {
                POPOUT_CLOSED => self.close_window(&control.popout_id),
                _ => {
                    self.touch(&control.popout_id);
                }
            }
        }

        let popout_id = control.as_ref().map(|control| control.popout_id);
        let handlers = lock(&self.inner.handlers).messages();
        for handler in handlers {
            if let Err(source) = handler(&event.data) {
                let err = PopoutError::Handler {
                    event: "onMessage",
                    source,
                };
                self.report_error(&err, popout_id.as_ref());
            }
        }
    }

    pub(crate) fn post(&self, id: &WindowId, message: &PopoutMessage) {
        let handle = lock(&self.inner.registry)
            .get(id)
            .filter(|record| !record.is_closed())
            .map(|record| Arc::clone(record.handle()));
        let Some(handle) = handle else {
            debug!(target: "popout::bus", popout_id = %id, kind = %message.kind, "no open popout, message dropped");
            return;
        };
        deliver(id, handle.as_ref(), &message.to_value(), &self.inner.host.origin());
    }
}

fn deliver(id: &WindowId, handle: &dyn WindowHandle, message: &Value, origin: &str) {
    match handle.post_message(message, origin) {
        Ok(()) => {}
        Err(HostError::Closed) => {
            debug!(target: "popout::bus", popout_id = %id, "popout closed before delivery");
        }
        Err(err) => {
            warn!(target: "popout::bus", popout_id = %id, error = %err, "failed to post message");
        }
    }
}
