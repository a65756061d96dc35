// store.rs — PolicyStore: the single owner of the live rule set.
//
// The store always has a snapshot to hand out: before persisted
// configuration loads (or when persistence is missing) it serves the
// configured defaults. `refresh()` loads persisted state exactly once —
// concurrent callers await the same load, later callers return at once.
// Change notifications from storage replace the affected half of the rule
// set, re-sanitized exactly as on load.
//
// Each area carries a generation bumped by every notification for it. A
// load only applies an area whose generation is unchanged since the load
// started, so a notification that lands mid-load is never overwritten by
// the older value the load read.
//
// Snapshots are swapped whole under a lock held only for the swap, so
// readers never observe a partially-updated rule set.

use std::sync::{Arc, RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{broadcast, OnceCell};

use crate::clock::Clock;
use crate::engine::{PolicySnapshot, Verdict};
use crate::error::PolicyError;
use crate::grants::TemporaryGrants;
use crate::rules::PolicyConfig;
use crate::section::sections_from_value;
use crate::storage::{KeyValueStore, StorageArea, StorageChange, GRANTS_KEY, SECTIONS_KEY};

struct Slot {
    snapshot: Arc<PolicySnapshot>,
    sync_generation: u64,
    local_generation: u64,
}

/// Owner of the current policy snapshot.
pub struct PolicyStore {
    config: Arc<PolicyConfig>,
    storage: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn Clock>,
    slot: RwLock<Slot>,
    loaded: OnceCell<()>,
}

impl PolicyStore {
    /// Create a store serving defaults until `refresh()` completes.
    ///
    /// Pass `None` for `storage` to run on defaults only.
    pub fn new(
        config: PolicyConfig,
        storage: Option<Arc<dyn KeyValueStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config.normalized());
        let snapshot = Arc::new(PolicySnapshot::defaults(Arc::clone(&config)));
        Self {
            config,
            storage,
            clock,
            slot: RwLock::new(Slot {
                snapshot,
                sync_generation: 0,
                local_generation: 0,
            }),
            loaded: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// True once `refresh()` has completed its load.
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// The current snapshot, as stored. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.slot.read().unwrap_or_else(|e| e.into_inner()).snapshot)
    }

    /// Decide a path at the current instant.
    pub fn decide(&self, path: &str) -> Verdict {
        let now = self.now();
        self.live_snapshot(now).decide_at(path, now)
    }

    /// Permanent sections followed by live grants.
    pub fn effective_sections(&self) -> Vec<String> {
        let now = self.now();
        self.live_snapshot(now).effective_sections(now)
    }

    /// The current snapshot with expired grants pruned from it and from
    /// storage, so neither grows without bound.
    fn live_snapshot(&self, now: DateTime<Utc>) -> Arc<PolicySnapshot> {
        let pruned = {
            let mut slot = self.write_slot();
            if !slot.snapshot.grants().has_expired(now) {
                return Arc::clone(&slot.snapshot);
            }
            let mut grants = slot.snapshot.grants().clone();
            let count = grants.prune(now);
            tracing::debug!(pruned = count, "pruned expired grants");
            slot.snapshot = Arc::new(slot.snapshot.with_grants(grants.clone()));
            (Arc::clone(&slot.snapshot), grants)
        };
        self.persist_grants(&pruned.1);
        pruned.0
    }

    /// Load persisted configuration. Idempotent; concurrent callers share
    /// one in-flight load.
    pub async fn refresh(&self) -> Arc<PolicySnapshot> {
        self.loaded.get_or_init(|| self.load()).await;
        self.snapshot()
    }

    async fn load(&self) {
        let Some(storage) = self.storage.as_ref() else {
            tracing::info!("no persistence configured; serving default sections");
            return;
        };

        let (sync_seen, local_seen) = {
            let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
            (slot.sync_generation, slot.local_generation)
        };

        let defaults = Value::from(self.config.default_sections.clone());
        let sections_value = storage.get(StorageArea::Sync, SECTIONS_KEY, defaults).await;
        let grants_value = storage
            .get(StorageArea::Local, GRANTS_KEY, Value::Array(Vec::new()))
            .await;

        let now = self.now();
        let permanent = sections_from_value(&sections_value, &self.config.default_sections);
        let (grants, dirty) = TemporaryGrants::from_value(&grants_value, now);

        let grants_applied = {
            let mut slot = self.write_slot();
            let mut next = Arc::clone(&slot.snapshot);
            if slot.sync_generation == sync_seen {
                next = Arc::new(next.with_permanent(permanent.clone()));
            } else {
                tracing::debug!("allowlist changed during load; keeping notified value");
            }
            let grants_applied = slot.local_generation == local_seen;
            if grants_applied {
                next = Arc::new(next.with_grants(grants.clone()));
            } else {
                tracing::debug!("grants changed during load; keeping notified value");
            }
            slot.snapshot = next;
            grants_applied
        };

        tracing::info!(
            sections = ?permanent,
            grants = grants.len(),
            "loaded persisted policy"
        );
        if dirty && grants_applied {
            self.persist_grants(&grants);
        }
    }

    /// Apply a storage change notification.
    ///
    /// Returns true when the change touched the rule set.
    pub fn on_external_change(&self, change: &StorageChange) -> bool {
        match (change.area, change.key.as_str()) {
            (StorageArea::Sync, SECTIONS_KEY) => {
                let permanent =
                    sections_from_value(&change.new_value, &self.config.default_sections);
                tracing::info!(sections = ?permanent, "allowlist changed");
                let mut slot = self.write_slot();
                slot.snapshot = Arc::new(slot.snapshot.with_permanent(permanent));
                slot.sync_generation += 1;
            }
            (StorageArea::Local, GRANTS_KEY) => {
                let (grants, _) = TemporaryGrants::from_value(&change.new_value, self.now());
                tracing::info!(grants = grants.len(), "temporary grants changed");
                let mut slot = self.write_slot();
                slot.snapshot = Arc::new(slot.snapshot.with_grants(grants));
                slot.local_generation += 1;
            }
            _ => return false,
        }
        true
    }

    /// Apply change notifications until the channel closes.
    pub async fn follow_changes(&self, mut changes: broadcast::Receiver<StorageChange>) {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    self.on_external_change(&change);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "missed storage notifications");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Subscribe to the backing storage's change feed, if any.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<StorageChange>> {
        self.storage.as_ref().map(|s| s.subscribe())
    }

    /// Grant `section` until `expires_at`, never shortening an existing grant.
    ///
    /// `section` must already be sanitized. Returns true when the grant changed.
    pub fn grant_temporary(&self, section: &str, expires_at: DateTime<Utc>) -> bool {
        let grants = {
            let mut slot = self.write_slot();
            let mut grants = slot.snapshot.grants().clone();
            if !grants.insert(section, expires_at) {
                return false;
            }
            grants.prune(self.now());
            slot.snapshot = Arc::new(slot.snapshot.with_grants(grants.clone()));
            slot.local_generation += 1;
            grants
        };
        self.persist_grants(&grants);
        true
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(|e| e.into_inner())
    }

    fn persist_grants(&self, grants: &TemporaryGrants) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        let result = grants
            .to_value()
            .map_err(PolicyError::from)
            .and_then(|value| storage.set(StorageArea::Local, GRANTS_KEY, value));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist temporary grants");
        }
    }
}
