/// file: src/history.rs
/// description: bounded, age-filtered recent drops persisted across restarts
use crate::clock::{Clock, SystemClock};
use crate::config::HistoryConfig;
use crate::error::LiveDropsError;
use crate::types::DropEvent;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::storage::DurableStorage;

/// Newest-first sequence of drops, never longer than the configured maximum,
/// never holding two entries with the same id.
pub type DropHistory = Vec<DropEvent>;

pub struct DropHistoryStore {
    storage: Arc<dyn DurableStorage>,
    config: HistoryConfig,
    clock: Arc<dyn Clock>,
}

impl DropHistoryStore {
    pub fn new(storage: Arc<dyn DurableStorage>, config: HistoryConfig) -> Self {
        Self::with_clock(storage, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        storage: Arc<dyn DurableStorage>,
        config: HistoryConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            config,
            clock,
        }
    }

    /// Reads the persisted history. Absent or unreadable records load as empty.
    pub fn load(&self) -> DropHistory {
        self.load_at(self.clock.now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> DropHistory {
        let raw = match self.storage.get(&self.config.record) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(record = %self.config.record, error = %e, "failed to read drop history");
                return Vec::new();
            }
        };

        let parsed: Vec<DropEvent> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(record = %self.config.record, error = %e, "discarding unparseable drop history");
                return Vec::new();
            }
        };

        let before = parsed.len();
        let history: DropHistory = self.normalize(
            parsed
                .into_iter()
                .filter(|event| event.id.is_some())
                .filter(|event| !event.is_older_than(self.config.max_age, now)),
        );
        debug!(
            loaded = history.len(),
            discarded = before - history.len(),
            "drop history hydrated"
        );
        history
    }

    /// Prepends `event` unless it is already present or too old, then persists.
    ///
    /// Returns `current` unchanged when the event is filtered out.
    pub fn append(&self, event: &DropEvent, current: &[DropEvent]) -> DropHistory {
        self.append_at(event, current, self.clock.now())
    }

    pub fn append_at(
        &self,
        event: &DropEvent,
        current: &[DropEvent],
        now: DateTime<Utc>,
    ) -> DropHistory {
        let Some(id) = event.id.as_deref() else {
            return current.to_vec();
        };
        if current.iter().any(|existing| existing.id.as_deref() == Some(id)) {
            trace!(drop_id = id, "drop already in history");
            return current.to_vec();
        }
        if event.is_older_than(self.config.stale_after, now) {
            trace!(drop_id = id, "stale drop kept out of history");
            return current.to_vec();
        }

        let mut next = Vec::with_capacity(self.config.max_len);
        next.push(event.clone());
        next.extend(current.iter().cloned());
        next.truncate(self.config.max_len);

        self.persist(&next);
        next
    }

    /// Applies the history invariants to an externally supplied newest-first
    /// list, such as the HTTP seed. Nothing is persisted.
    pub fn normalize(&self, drops: impl IntoIterator<Item = DropEvent>) -> DropHistory {
        let mut seen = HashSet::new();
        drops
            .into_iter()
            .filter(|event| match event.id.as_deref() {
                Some(id) => seen.insert(id.to_string()),
                None => false,
            })
            .take(self.config.max_len)
            .collect()
    }

    // Write failures are logged and swallowed; the in-memory history stays authoritative.
    fn persist(&self, history: &[DropEvent]) {
        let result = serde_json::to_string(history)
            .map_err(LiveDropsError::from)
            .and_then(|json| self.storage.set(&self.config.record, &json));
        if let Err(e) = result {
            let e = LiveDropsError::StorageError {
                record: self.config.record.clone(),
                reason: e.to_string(),
            };
            warn!(error = %e, "failed to persist drop history");
        }
    }
}
