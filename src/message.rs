use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::WindowId;

pub const POPOUT_READY: &str = "popout-ready";
pub const POPOUT_CLOSED: &str = "popout-closed";
pub const POPOUT_FOCUS: &str = "popout-focus";
pub const POPOUT_BLUR: &str = "popout-blur";

/// Wire shape shared by both directions: `{type, data}` from the opener,
/// `{type, popoutId}` from a child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopoutMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(rename = "popoutId", default, skip_serializing_if = "Option::is_none")]
    pub popout_id: Option<WindowId>,
}

impl PopoutMessage {
    pub fn with_data(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data: Some(data),
            popout_id: None,
        }
    }

    pub fn control(kind: impl Into<String>, popout_id: WindowId) -> Self {
        Self {
            kind: kind.into(),
            data: None,
            popout_id: Some(popout_id),
        }
    }

    pub fn to_value(&self) -> Value {
        // Serializing a struct of strings and JSON values cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// `type` of a raw message, if it carries a string one.
pub fn message_kind(data: &Value) -> Option<&str> {
    data.get("type").and_then(Value::as_str)
}

pub fn is_control_kind(kind: &str) -> bool {
    matches!(
        kind,
        POPOUT_READY | POPOUT_CLOSED | POPOUT_FOCUS | POPOUT_BLUR
    )
}

/// The part of a child control message the manager acts on. Only decoded for
/// `popout-*` kinds; everything else is forwarded without inspection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ControlMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "popoutId")]
    pub popout_id: WindowId,
}

impl ControlMessage {
    /// `Ok(None)` for messages that are not control messages.
    pub fn decode(data: &Value) -> Result<Option<Self>, serde_json::Error> {
        match message_kind(data) {
            Some(kind) if is_control_kind(kind) => Self::deserialize(data).map(Some),
            _ => Ok(None),
        }
    }
}

/// A `message` event as received by the page-level listener.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub origin: String,
    pub data: Value,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}
