/// file: src/dedup.rs
/// description: short-window duplicate suppression for live drops
use crate::config::DedupConfig;
use crate::types::DropEvent;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Outcome of running a drop through the cache.
///
/// Only `Accepted` lets the event through. The rejections are ordinary
/// filtering results, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    Accepted,
    MissingId,
    MissingDropTime,
    Stale,
    Duplicate,
}

impl DedupVerdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, DedupVerdict::Accepted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DedupVerdict::Accepted => "accepted",
            DedupVerdict::MissingId => "missing_id",
            DedupVerdict::MissingDropTime => "missing_drop_time",
            DedupVerdict::Stale => "stale",
            DedupVerdict::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug)]
pub struct DedupCache {
    config: DedupConfig,
    // dedup key -> first time seen inside the current window
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

impl DedupCache {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            last_seen: HashMap::new(),
        }
    }

    pub fn should_accept(&mut self, event: &DropEvent, now: DateTime<Utc>) -> bool {
        self.check(event, now).is_accepted()
    }

    /// Runs the identity, age and repeat checks, recording the key on acceptance.
    pub fn check(&mut self, event: &DropEvent, now: DateTime<Utc>) -> DedupVerdict {
        self.compact(now);

        let Some(key) = event.dedup_key() else {
            return DedupVerdict::MissingId;
        };

        let Some(drop_time) = event.drop_time else {
            return DedupVerdict::MissingDropTime;
        };
        if now.signed_duration_since(drop_time) > self.config.stale_after {
            return DedupVerdict::Stale;
        }

        if let Some(seen_at) = self.last_seen.get(&key)
            && now.signed_duration_since(*seen_at) < self.config.window
        {
            return DedupVerdict::Duplicate;
        }

        self.last_seen.insert(key, now);
        DedupVerdict::Accepted
    }

    fn compact(&mut self, now: DateTime<Utc>) {
        let retention = self.config.retention;
        self.last_seen
            .retain(|_, seen_at| now.signed_duration_since(*seen_at) <= retention);
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}
