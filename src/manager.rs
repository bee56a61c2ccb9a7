use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::error::PopoutError;
use crate::handlers::{EventHandlerTable, LifecycleEvent, SubscriptionId};
use crate::host::{WindowEvent, WindowHandle, WindowHost};
use crate::lock;
use crate::message::{PopoutMessage, POPOUT_READY};
use crate::placement::{build_url, merge_params, split_path, OpenOptions};
use crate::registry::{WindowHandleRecord, WindowInfo, WindowRegistry};
use crate::time::{Clock, SystemClock};
use crate::WindowId;

pub(crate) struct ManagerInner {
    pub(crate) host: Arc<dyn WindowHost>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: ManagerConfig,
    pub(crate) registry: Mutex<WindowRegistry>,
    pub(crate) handlers: Mutex<EventHandlerTable>,
}

/// Opens, tracks and closes the popout windows of one page.
///
/// Cloning is cheap and every clone shares the same registry and handler
/// table. Locks are never held while host primitives or user handlers run, so
/// handlers may call back into the manager.
#[derive(Clone)]
pub struct PopoutManager {
    pub(crate) inner: Arc<ManagerInner>,
}

#[derive(Clone)]
pub(crate) struct WeakManager(Weak<ManagerInner>);

impl WeakManager {
    pub(crate) fn upgrade(&self) -> Option<PopoutManager> {
        self.0.upgrade().map(|inner| PopoutManager { inner })
    }
}

impl PopoutManager {
    pub fn new(host: Arc<dyn WindowHost>, config: ManagerConfig) -> Self {
        Self::with_clock(host, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        host: Arc<dyn WindowHost>,
        config: ManagerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                host,
                clock,
                config,
                registry: Mutex::new(WindowRegistry::new()),
                handlers: Mutex::new(EventHandlerTable::default()),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Origin of the page that owns this manager.
    pub fn origin(&self) -> String {
        self.inner.host.origin()
    }

    pub(crate) fn downgrade(&self) -> WeakManager {
        WeakManager(Arc::downgrade(&self.inner))
    }

    pub fn on_ready<F>(&self, handler: F)
    where
        F: Fn(&WindowId) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_handler(LifecycleEvent::Ready, handler);
    }

    pub fn on_close<F>(&self, handler: F)
    where
        F: Fn(&WindowId) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_handler(LifecycleEvent::Close, handler);
    }

    pub fn on_focus<F>(&self, handler: F)
    where
        F: Fn(&WindowId) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_handler(LifecycleEvent::Focus, handler);
    }

    pub fn on_blur<F>(&self, handler: F)
    where
        F: Fn(&WindowId) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_handler(LifecycleEvent::Blur, handler);
    }

    /// Replaces whatever handler was registered for `event`.
    pub fn set_handler<F>(&self, event: LifecycleEvent, handler: F)
    where
        F: Fn(&WindowId) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        lock(&self.inner.handlers).set(event, Arc::new(handler));
    }

    pub fn clear_handler(&self, event: LifecycleEvent) {
        lock(&self.inner.handlers).clear(event);
    }

    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&PopoutError, Option<&WindowId>) + Send + Sync + 'static,
    {
        lock(&self.inner.handlers).set_error(Arc::new(handler));
    }

    /// Registers a raw message handler. Unlike lifecycle handlers these fan
    /// out: every registered handler sees every accepted message, verbatim.
    pub fn add_message_handler<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        lock(&self.inner.handlers).add_message(Arc::new(handler))
    }

    pub fn remove_message_handler(&self, id: SubscriptionId) -> bool {
        lock(&self.inner.handlers).remove_message(id)
    }

    /// Opens `path` in a new popout window and starts tracking it.
    ///
    /// `params`, and any query already on `path`, are embedded in the window
    /// URL; the manager's own params (`mode`, `recordId`, `popoutId`,
    /// placement and chrome flags) replace any caller param with the same
    /// name. Fails only when the host returns
    /// no window, in which case nothing is registered.
    pub fn open_window<I, K, V>(
        &self,
        path: &str,
        params: I,
        options: OpenOptions,
    ) -> Result<WindowId, PopoutError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let id = WindowId::new();
        let resolved = options.resolve(&self.inner.config.defaults, self.inner.host.screen());
        let (base, existing) = split_path(path);
        let incoming = existing.into_iter().chain(
            params
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        let query_params = merge_params(incoming, &resolved, &id);
        let url = match build_url(base, &query_params) {
            Ok(url) => url,
            Err(err) => return Err(self.fail_open(err.into())),
        };
        let features = resolved.features();

        let handle = match self.inner.host.open(&url, &id.to_string(), &features) {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                return Err(self.fail_open(PopoutError::WindowOpen { url, source: None }));
            }
            Err(source) => {
                return Err(self.fail_open(PopoutError::WindowOpen {
                    url,
                    source: Some(source),
                }));
            }
        };

        let record = WindowHandleRecord::new(
            id,
            Arc::clone(&handle),
            path.to_string(),
            query_params,
            resolved,
        );
        let now = self.inner.clock.now_ms();
        if !lock(&self.inner.registry).register(record, now) {
            warn!(target: "popout::lifecycle", popout_id = %id, "duplicate popout id");
        }
        self.attach_listeners(id, handle.as_ref());

        info!(target: "popout::lifecycle", popout_id = %id, %url, "opened popout");
        Ok(id)
    }

    /// Closes the window and forgets it. Safe to call any number of times and
    /// for ids that were never registered; failures go to the error handler.
    pub fn close_window(&self, id: &WindowId) {
        let record = lock(&self.inner.registry).delete(id);
        let Some(record) = record else {
            debug!(target: "popout::lifecycle", popout_id = %id, "close of unknown popout ignored");
            return;
        };

        if !record.is_closed() {
            if let Err(err) = record.handle().close() {
                self.report_error(&PopoutError::Close(err), Some(id));
            }
        }
        drop(record);

        info!(target: "popout::lifecycle", popout_id = %id, "closed popout");
        self.fire(LifecycleEvent::Close, id);
    }

    pub fn close_all_windows(&self) {
        let ids = lock(&self.inner.registry).ids();
        for id in ids {
            self.close_window(&id);
        }
    }

    pub fn list_active(&self) -> Vec<WindowId> {
        lock(&self.inner.registry).list_active()
    }

    pub fn window(&self, id: &WindowId) -> Option<WindowInfo> {
        lock(&self.inner.registry).get(id).map(WindowHandleRecord::info)
    }

    /// Entry point for native events of a tracked window. Events for windows
    /// that are no longer registered are dropped.
    pub fn handle_window_event(&self, id: &WindowId, event: WindowEvent) {
        let now = self.inner.clock.now_ms();
        if !lock(&self.inner.registry).touch(id, now) {
            debug!(target: "popout::lifecycle", popout_id = %id, %event, "event for untracked popout");
            return;
        }

        match event {
            WindowEvent::Load => {
                self.post(id, &PopoutMessage::control(POPOUT_READY, *id));
                self.fire(LifecycleEvent::Ready, id);
            }
            WindowEvent::Focus => self.fire(LifecycleEvent::Focus, id),
            WindowEvent::Blur => self.fire(LifecycleEvent::Blur, id),
            WindowEvent::Unload => {}
        }
    }

    pub(crate) fn touch(&self, id: &WindowId) -> bool {
        let now = self.inner.clock.now_ms();
        lock(&self.inner.registry).touch(id, now)
    }

    pub(crate) fn fire(&self, event: LifecycleEvent, id: &WindowId) {
        let handler = lock(&self.inner.handlers).get(event);
        if let Some(handler) = handler {
            if let Err(source) = handler(id) {
                let err = PopoutError::Handler {
                    event: event.handler_name(),
                    source,
                };
                self.report_error(&err, Some(id));
            }
        }
    }

    pub(crate) fn report_error(&self, err: &PopoutError, id: Option<&WindowId>) {
        match id {
            Some(id) => warn!(target: "popout::lifecycle", popout_id = %id, error = %err, "popout error"),
            None => warn!(target: "popout::lifecycle", error = %err, "popout error"),
        }
        let handler = lock(&self.inner.handlers).error();
        if let Some(handler) = handler {
            handler(err, id);
        }
    }

    fn fail_open(&self, err: PopoutError) -> PopoutError {
        self.report_error(&err, None);
        err
    }

    fn attach_listeners(&self, id: WindowId, handle: &dyn WindowHandle) {
        let manager = self.downgrade();
        handle.add_listener(Arc::new(move |event| {
            if let Some(manager) = manager.upgrade() {
                manager.handle_window_event(&id, event);
            }
        }));
    }
}
