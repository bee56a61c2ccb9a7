use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::host::WindowHandle;
use crate::placement::ResolvedOptions;

/// Identifier of a popout window. Generated once per open and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(Uuid);

impl WindowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WindowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

pub struct WindowHandleRecord {
    pub id: WindowId,
    handle: Arc<dyn WindowHandle>,
    pub path: String,
    pub query_params: BTreeMap<String, String>,
    pub options: ResolvedOptions,
    pub created_at: u64,
    pub last_active_at: Option<u64>,
}

impl WindowHandleRecord {
    pub fn new(
        id: WindowId,
        handle: Arc<dyn WindowHandle>,
        path: String,
        query_params: BTreeMap<String, String>,
        options: ResolvedOptions,
    ) -> Self {
        Self {
            id,
            handle,
            path,
            query_params,
            options,
            created_at: 0,
            last_active_at: None,
        }
    }

    pub(crate) fn handle(&self) -> &Arc<dyn WindowHandle> {
        &self.handle
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn info(&self) -> WindowInfo {
        WindowInfo {
            id: self.id,
            path: self.path.clone(),
            query_params: self.query_params.clone(),
            options: self.options.clone(),
            created_at: self.created_at,
            last_active_at: self.last_active_at,
            closed: self.is_closed(),
        }
    }

    fn is_stale(&self, now_ms: u64, ttl_ms: u64) -> bool {
        if self.is_closed() {
            return true;
        }
        self.last_active_at
            .is_some_and(|last| now_ms.saturating_sub(last) > ttl_ms)
    }
}

/// Handle-free snapshot of a registry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub path: String,
    pub query_params: BTreeMap<String, String>,
    pub options: ResolvedOptions,
    pub created_at: u64,
    pub last_active_at: Option<u64>,
    pub closed: bool,
}

#[derive(Default)]
pub struct WindowRegistry {
    records: HashMap<WindowId, WindowHandleRecord>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record` stamped with `now_ms`. A duplicate id is rejected and
    /// the existing record is left alone.
    pub fn register(&mut self, mut record: WindowHandleRecord, now_ms: u64) -> bool {
        if self.records.contains_key(&record.id) {
            return false;
        }
        record.created_at = now_ms;
        self.records.insert(record.id, record);
        true
    }

    pub fn get(&self, id: &WindowId) -> Option<&WindowHandleRecord> {
        self.records.get(id)
    }

    pub fn delete(&mut self, id: &WindowId) -> Option<WindowHandleRecord> {
        self.records.remove(id)
    }

    pub fn touch(&mut self, id: &WindowId, now_ms: u64) -> bool {
        let Some(record) = self.records.get_mut(id) else {
            return false;
        };
        record.last_active_at = Some(record.last_active_at.map_or(now_ms, |last| last.max(now_ms)));
        true
    }

    /// Ids of every record whose window is still open, oldest first.
    pub fn list_active(&self) -> Vec<WindowId> {
        self.sorted()
            .into_iter()
            .filter(|record| !record.is_closed())
            .map(|record| record.id)
            .collect()
    }

    pub fn ids(&self) -> Vec<WindowId> {
        self.sorted().into_iter().map(|record| record.id).collect()
    }

    pub fn stale_ids(&self, now_ms: u64, ttl_ms: u64) -> Vec<WindowId> {
        self.sorted()
            .into_iter()
            .filter(|record| record.is_stale(now_ms, ttl_ms))
            .map(|record| record.id)
            .collect()
    }

    pub(crate) fn open_handles(&self) -> Vec<(WindowId, Arc<dyn WindowHandle>)> {
        self.sorted()
            .into_iter()
            .filter(|record| !record.is_closed())
            .map(|record| (record.id, Arc::clone(&record.handle)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn sorted(&self) -> Vec<&WindowHandleRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }
}
