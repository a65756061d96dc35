// grants.rs — Temporary, time-limited section grants.
//
// A grant opens one extra section until its expiry. Grants are stored in
// the local storage area as an array of `{ section, expiresAt }` objects
// (expiresAt in epoch milliseconds). Older writers used `sub` for the
// section field, which is still accepted on read.
//
// Rules:
// - One expiry per section; re-granting keeps the later expiry.
// - A grant with expiry <= now is logically absent.
// - Entries whose section sanitizes to nothing, or whose expiry isn't a
//   finite number, are dropped on read.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::section::sanitize_section;

/// One persisted grant entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantEntry {
    /// Sanitized section identifier.
    #[serde(alias = "sub")]
    pub section: String,
    /// Instant the grant stops applying.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl GrantEntry {
    /// Parse a stored entry leniently, sanitizing the section name.
    pub fn from_value(value: &Value) -> Option<Self> {
        let raw_section = value
            .get("section")
            .or_else(|| value.get("sub"))
            .and_then(Value::as_str)?;
        let section = sanitize_section(raw_section)?;
        let expires_at = value.get("expiresAt").and_then(expiry_from_value)?;
        Some(Self {
            section,
            expires_at,
        })
    }
}

fn expiry_from_value(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value.as_i64() {
        Some(ms) => ms,
        None => {
            let f = value.as_f64()?;
            if !f.is_finite() {
                return None;
            }
            f as i64
        }
    };
    DateTime::from_timestamp_millis(millis)
}

/// The set of temporary grants, keyed by section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemporaryGrants {
    by_section: BTreeMap<String, DateTime<Utc>>,
}

impl TemporaryGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the stored array, dropping invalid and expired entries.
    ///
    /// The returned flag is true when the stored value should be rewritten
    /// (something was dropped or merged).
    pub fn from_value(value: &Value, now: DateTime<Utc>) -> (Self, bool) {
        let Some(items) = value.as_array() else {
            return (Self::new(), !value.is_null());
        };
        let mut grants = Self::new();
        for entry in items.iter().filter_map(GrantEntry::from_value) {
            if entry.expires_at > now {
                grants.insert(entry.section, entry.expires_at);
            }
        }
        let dirty = grants.len() != items.len();
        (grants, dirty)
    }

    /// Insert or extend a grant. Never shortens an existing one.
    ///
    /// Returns true when the stored expiry changed.
    pub fn insert(&mut self, section: impl Into<String>, expires_at: DateTime<Utc>) -> bool {
        let section = section.into();
        match self.by_section.get(&section) {
            Some(current) if *current >= expires_at => false,
            _ => {
                self.by_section.insert(section, expires_at);
                true
            }
        }
    }

    /// Remove every grant that has expired at `now`. Returns how many went.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.by_section.len();
        self.by_section.retain(|_, expires_at| *expires_at > now);
        before - self.by_section.len()
    }

    /// True when at least one grant has expired at `now`.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.by_section.values().any(|expires_at| *expires_at <= now)
    }

    /// Sections whose grant is still live at `now`, in section order.
    pub fn active(&self, now: DateTime<Utc>) -> impl Iterator<Item = &str> + '_ {
        self.by_section
            .iter()
            .filter(move |(_, expires_at)| **expires_at > now)
            .map(|(section, _)| section.as_str())
    }

    pub fn is_active(&self, section: &str, now: DateTime<Utc>) -> bool {
        self.by_section
            .get(section)
            .is_some_and(|expires_at| *expires_at > now)
    }

    pub fn expiry(&self, section: &str) -> Option<DateTime<Utc>> {
        self.by_section.get(section).copied()
    }

    pub fn len(&self) -> usize {
        self.by_section.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_section.is_empty()
    }

    pub fn entries(&self) -> Vec<GrantEntry> {
        self.by_section
            .iter()
            .map(|(section, expires_at)| GrantEntry {
                section: section.clone(),
                expires_at: *expires_at,
            })
            .collect()
    }

    /// Serialize to the stored array form.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self.entries())
    }
}
