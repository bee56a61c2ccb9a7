//! The popped-out side: a page that discovers it runs inside a popout and
//! reports its lifecycle back to the opener.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::host::HostError;
use crate::message::{PopoutMessage, POPOUT_BLUR, POPOUT_CLOSED, POPOUT_FOCUS, POPOUT_READY};
use crate::placement::WindowMode;
use crate::WindowId;

#[derive(Debug, Error)]
pub enum ChildError {
    #[error("invalid popout url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid popoutId {value:?}: {source}")]
    InvalidId { value: String, source: uuid::Error },
}

/// `window.opener` as seen from the child.
pub trait OpenerPort: Send + Sync {
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), HostError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildEvent {
    BeforeUnload,
    Focus,
    Blur,
}

impl ChildEvent {
    fn message_kind(&self) -> &'static str {
        match self {
            ChildEvent::BeforeUnload => POPOUT_CLOSED,
            ChildEvent::Focus => POPOUT_FOCUS,
            ChildEvent::Blur => POPOUT_BLUR,
        }
    }
}

/// Chrome and record hints the opener embedded in the popout URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLayout {
    pub mode: WindowMode,
    pub record_id: Option<String>,
    pub hide_header: bool,
    pub hide_aside: bool,
}

pub struct PopoutChild {
    popout_id: WindowId,
    origin: String,
    layout: ChildLayout,
    opener: Arc<dyn OpenerPort>,
}

impl PopoutChild {
    /// Returns `None` when `url` has no `popoutId`, i.e. the page is not a
    /// popout.
    pub fn from_url(url: &str, opener: Arc<dyn OpenerPort>) -> Result<Option<Self>, ChildError> {
        let url = Url::parse(url)?;
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let Some(raw_id) = params.get("popoutId") else {
            return Ok(None);
        };
        let popout_id: WindowId = raw_id.parse().map_err(|source| ChildError::InvalidId {
            value: raw_id.clone(),
            source,
        })?;

        let flag = |name: &str| params.get(name).is_some_and(|value| value == "true");
        let layout = ChildLayout {
            mode: params
                .get("mode")
                .and_then(|mode| WindowMode::parse(mode))
                .unwrap_or_default(),
            record_id: params.get("recordId").filter(|id| !id.is_empty()).cloned(),
            hide_header: flag("hideHeader"),
            hide_aside: flag("hideAside"),
        };

        Ok(Some(Self {
            popout_id,
            origin: url.origin().ascii_serialization(),
            layout,
            opener,
        }))
    }

    pub fn popout_id(&self) -> WindowId {
        self.popout_id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn layout(&self) -> &ChildLayout {
        &self.layout
    }

    pub fn announce_ready(&self) {
        self.post(POPOUT_READY);
    }

    pub fn forward(&self, event: ChildEvent) {
        self.post(event.message_kind());
    }

    fn post(&self, kind: &str) {
        let message = PopoutMessage::control(kind, self.popout_id).to_value();
        match self.opener.post_message(&message, &self.origin) {
            Ok(()) => debug!(target: "popout::child", popout_id = %self.popout_id, kind, "posted to opener"),
            Err(err) => {
                warn!(target: "popout::child", popout_id = %self.popout_id, kind, error = %err, "failed to reach opener")
            }
        }
    }
}

pub fn is_popout_url(url: &str) -> bool {
    Url::parse(url)
        .map(|url| url.query_pairs().any(|(key, _)| key == "popoutId"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingOpener {
        posted: Mutex<Vec<(Value, String)>>,
    }

    impl OpenerPort for RecordingOpener {
        fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), HostError> {
            self.posted
                .lock()
                .unwrap()
                .push((message.clone(), target_origin.to_string()));
            Ok(())
        }
    }

    #[test]
    fn plain_page_is_not_a_popout() {
        let opener = Arc::new(RecordingOpener::default());
        let child = PopoutChild::from_url("https://app.test/shipments?tab=stops", opener).unwrap();
        assert!(child.is_none());
        assert!(!is_popout_url("https://app.test/shipments?tab=stops"));
    }

    #[test]
    fn reads_id_and_layout_from_url() {
        let id = WindowId::new();
        let url = format!(
            "https://app.test:8443/shipments/edit?mode=edit&recordId=shp_9&popoutId={id}&hideHeader=true&hideAside=false"
        );
        let opener = Arc::new(RecordingOpener::default());
        let child = PopoutChild::from_url(&url, opener).unwrap().unwrap();

        assert!(is_popout_url(&url));
        assert_eq!(child.popout_id(), id);
        assert_eq!(child.origin(), "https://app.test:8443");
        assert_eq!(
            child.layout(),
            &ChildLayout {
                mode: WindowMode::Edit,
                record_id: Some("shp_9".into()),
                hide_header: true,
                hide_aside: false,
            }
        );
    }

    #[test]
    fn rejects_garbage_id() {
        let opener = Arc::new(RecordingOpener::default());
        let err = PopoutChild::from_url("https://app.test/x?popoutId=nope", opener)
            .err()
            .unwrap();
        assert!(matches!(err, ChildError::InvalidId { .. }));
    }

    #[test]
    fn forwards_events_to_own_origin() {
        let id = WindowId::new();
        let opener = Arc::new(RecordingOpener::default());
        let child = PopoutChild::from_url(&format!("https://app.test/x?popoutId={id}"), opener.clone())
            .unwrap()
            .unwrap();

        child.announce_ready();
        child.forward(ChildEvent::Focus);
        child.forward(ChildEvent::Blur);
        child.forward(ChildEvent::BeforeUnload);

        let posted = opener.posted.lock().unwrap();
        let kinds: Vec<_> = posted
            .iter()
            .map(|(message, _)| message["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec![POPOUT_READY, POPOUT_FOCUS, POPOUT_BLUR, POPOUT_CLOSED]
        );
        assert!(posted.iter().all(|(message, origin)| {
            origin == "https://app.test" && message["popoutId"] == id.to_string()
        }));
    }
}
