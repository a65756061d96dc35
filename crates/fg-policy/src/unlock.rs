// unlock.rs — Temporary grant negotiation.
//
// Opening an extra section is deliberately slow: the operator starts an
// unlock for one section, waits out the unlock delay, and only then may
// confirm the grant. Changing the section restarts the countdown. The
// countdown lives in the local storage area so it survives the surface that
// started it being closed.
//
// Confirmed grants are merged into the stored grant list with the same
// rules the PolicyStore applies on load: sanitized section, expired entries
// dropped, later expiry wins.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PolicyError;
use crate::grants::{GrantEntry, TemporaryGrants};
use crate::section::sanitize_section;
use crate::storage::{KeyValueStore, StorageArea, GRANTS_KEY, UNLOCK_KEY};

/// Default wait between starting an unlock and confirming the grant.
pub const DEFAULT_UNLOCK_DELAY_SECS: i64 = 180;
/// Default lifetime of a confirmed grant.
pub const DEFAULT_GRANT_TTL_MINUTES: i64 = 6 * 60;

/// A countdown in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnlockState {
    #[serde(alias = "sub")]
    section: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    started_at: DateTime<Utc>,
}

/// Where the unlock for a given section stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockStatus {
    /// No countdown started.
    Locked,
    /// A countdown exists, but for a different section.
    SectionChanged { pending: String },
    /// The countdown for this section is still running.
    Unlocking { remaining: Duration },
    /// The countdown elapsed; the grant may be confirmed.
    Unlocked,
}

/// Negotiates temporary grants against the shared storage.
pub struct GrantNegotiator {
    storage: Arc<dyn KeyValueStore>,
    unlock_delay: Duration,
    grant_ttl: Duration,
}

impl GrantNegotiator {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            unlock_delay: Duration::seconds(DEFAULT_UNLOCK_DELAY_SECS),
            grant_ttl: Duration::minutes(DEFAULT_GRANT_TTL_MINUTES),
        }
    }

    pub fn with_unlock_delay(mut self, delay: Duration) -> Self {
        self.unlock_delay = delay;
        self
    }

    pub fn with_grant_ttl(mut self, ttl: Duration) -> Self {
        self.grant_ttl = ttl;
        self
    }

    /// Start (or restart) the countdown for `raw_section`.
    ///
    /// Returns the sanitized section name.
    pub fn start(&self, raw_section: &str, now: DateTime<Utc>) -> Result<String, PolicyError> {
        let section = require_section(raw_section)?;
        let state = UnlockState {
            section: section.clone(),
            started_at: now,
        };
        self.storage
            .set(StorageArea::Local, UNLOCK_KEY, serde_json::to_value(&state)?)?;
        tracing::info!(section = %section, "unlock started");
        Ok(section)
    }

    /// Report where the unlock for `raw_section` stands at `now`.
    pub async fn status(
        &self,
        raw_section: &str,
        now: DateTime<Utc>,
    ) -> Result<UnlockStatus, PolicyError> {
        let section = require_section(raw_section)?;
        let Some(state) = self.load_state().await else {
            return Ok(UnlockStatus::Locked);
        };
        if state.section != section {
            return Ok(UnlockStatus::SectionChanged {
                pending: state.section,
            });
        }
        let remaining = self.unlock_delay - (now - state.started_at);
        if remaining > Duration::zero() {
            Ok(UnlockStatus::Unlocking { remaining })
        } else {
            Ok(UnlockStatus::Unlocked)
        }
    }

    /// Confirm the grant for `raw_section`. Only succeeds once the countdown
    /// for that same section has elapsed; clears the countdown afterwards.
    pub async fn confirm(
        &self,
        raw_section: &str,
        now: DateTime<Utc>,
    ) -> Result<GrantEntry, PolicyError> {
        let section = require_section(raw_section)?;
        match self.status(&section, now).await? {
            UnlockStatus::Unlocked => {}
            UnlockStatus::Unlocking { remaining } => {
                return Err(PolicyError::UnlockPending {
                    section,
                    remaining_secs: remaining.num_seconds().max(1),
                })
            }
            UnlockStatus::Locked | UnlockStatus::SectionChanged { .. } => {
                return Err(PolicyError::UnlockMissing { section })
            }
        }

        let mut grants = self.load_grants(now).await;
        grants.insert(section.clone(), now + self.grant_ttl);
        self.storage
            .set(StorageArea::Local, GRANTS_KEY, grants.to_value()?)?;
        self.storage.set(StorageArea::Local, UNLOCK_KEY, Value::Null)?;

        let expires_at = grants.expiry(&section).unwrap_or(now + self.grant_ttl);
        tracing::info!(section = %section, %expires_at, "temporary grant confirmed");
        Ok(GrantEntry {
            section,
            expires_at,
        })
    }

    /// Live grants at `now`. Rewrites storage when anything was pruned.
    pub async fn active_grants(&self, now: DateTime<Utc>) -> Result<Vec<GrantEntry>, PolicyError> {
        let value = self
            .storage
            .get(StorageArea::Local, GRANTS_KEY, Value::Array(Vec::new()))
            .await;
        let (grants, dirty) = TemporaryGrants::from_value(&value, now);
        if dirty {
            self.storage
                .set(StorageArea::Local, GRANTS_KEY, grants.to_value()?)?;
        }
        Ok(grants.entries())
    }

    async fn load_grants(&self, now: DateTime<Utc>) -> TemporaryGrants {
        let value = self
            .storage
            .get(StorageArea::Local, GRANTS_KEY, Value::Array(Vec::new()))
            .await;
        TemporaryGrants::from_value(&value, now).0
    }

    async fn load_state(&self) -> Option<UnlockState> {
        let value = self
            .storage
            .get(StorageArea::Local, UNLOCK_KEY, Value::Null)
            .await;
        if value.is_null() {
            return None;
        }
        match serde_json::from_value::<UnlockState>(value) {
            Ok(mut state) => {
                state.section = sanitize_section(&state.section)?;
                Some(state)
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable unlock state");
                None
            }
        }
    }
}

fn require_section(raw: &str) -> Result<String, PolicyError> {
    sanitize_section(raw).ok_or_else(|| PolicyError::InvalidSection {
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn negotiator(storage: Arc<MemoryStorage>) -> GrantNegotiator {
        GrantNegotiator::new(storage)
            .with_unlock_delay(Duration::minutes(3))
            .with_grant_ttl(Duration::hours(6))
    }

    #[tokio::test]
    async fn confirm_requires_started_unlock() {
        let storage = Arc::new(MemoryStorage::new());
        let n = negotiator(storage);
        let err = n.confirm("forhire", Utc::now()).await.unwrap_err();
        assert!(matches!(err, PolicyError::UnlockMissing { .. }));
    }

    #[tokio::test]
    async fn countdown_must_elapse() {
        let storage = Arc::new(MemoryStorage::new());
        let n = negotiator(storage);
        let t0 = Utc::now();
        assert_eq!(n.start("r/ForHire", t0).unwrap(), "forhire");

        let status = n.status("forhire", t0 + Duration::minutes(1)).await.unwrap();
        assert_eq!(
            status,
            UnlockStatus::Unlocking {
                remaining: Duration::minutes(2)
            }
        );
        let err = n
            .confirm("forhire", t0 + Duration::minutes(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::UnlockPending { remaining_secs: 120, .. }));

        assert_eq!(
            n.status("forhire", t0 + Duration::minutes(3)).await.unwrap(),
            UnlockStatus::Unlocked
        );
    }

    #[tokio::test]
    async fn changing_section_requires_restart() {
        let storage = Arc::new(MemoryStorage::new());
        let n = negotiator(storage);
        let t0 = Utc::now();
        n.start("forhire", t0).unwrap();
        let later = t0 + Duration::minutes(10);
        assert_eq!(
            n.status("jobs", later).await.unwrap(),
            UnlockStatus::SectionChanged {
                pending: "forhire".to_string()
            }
        );
        assert!(n.confirm("jobs", later).await.is_err());
    }

    #[tokio::test]
    async fn confirm_writes_grant_and_clears_countdown() {
        let storage = Arc::new(MemoryStorage::new());
        let n = negotiator(Arc::clone(&storage));
        let t0 = Utc::now();
        n.start("forhire", t0).unwrap();
        let t1 = t0 + Duration::minutes(3);
        let entry = n.confirm("forhire", t1).await.unwrap();
        assert_eq!(entry.section, "forhire");
        assert_eq!(entry.expires_at, t1 + Duration::hours(6));

        assert_eq!(storage.peek(StorageArea::Local, UNLOCK_KEY), Some(Value::Null));
        assert_eq!(n.status("forhire", t1).await.unwrap(), UnlockStatus::Locked);

        let active = n.active_grants(t1).await.unwrap();
        assert_eq!(active, vec![entry]);
    }

    #[tokio::test]
    async fn regrant_keeps_later_expiry() {
        let storage = Arc::new(MemoryStorage::new());
        let n = negotiator(Arc::clone(&storage)).with_grant_ttl(Duration::hours(6));
        let t0 = Utc::now();
        n.start("temp1", t0).unwrap();
        let first = n.confirm("temp1", t0 + Duration::minutes(3)).await.unwrap();

        let short = negotiator(Arc::clone(&storage)).with_grant_ttl(Duration::minutes(30));
        short.start("temp1", t0 + Duration::minutes(5)).unwrap();
        let second = short
            .confirm("temp1", t0 + Duration::minutes(8))
            .await
            .unwrap();
        assert_eq!(second.expires_at, first.expires_at);
    }

    #[tokio::test]
    async fn active_grants_prunes_expired() {
        let storage = Arc::new(MemoryStorage::new());
        let n = negotiator(Arc::clone(&storage)).with_grant_ttl(Duration::minutes(10));
        let t0 = Utc::now();
        n.start("brief", t0).unwrap();
        n.confirm("brief", t0 + Duration::minutes(3)).await.unwrap();

        let after = t0 + Duration::hours(1);
        assert!(n.active_grants(after).await.unwrap().is_empty());
        assert_eq!(
            storage.peek(StorageArea::Local, GRANTS_KEY),
            Some(serde_json::json!([]))
        );
    }

    #[test]
    fn start_rejects_empty_section() {
        let n = negotiator(Arc::new(MemoryStorage::new()));
        assert!(matches!(
            n.start("r/", Utc::now()),
            Err(PolicyError::InvalidSection { .. })
        ));
    }
}
