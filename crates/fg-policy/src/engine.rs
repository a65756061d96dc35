// engine.rs — Policy decision point.
//
// Every location check and every link classification flows through
// `PolicySnapshot::decide_at()`, which checks, first match wins:
//
// 1. Normalize the path (trailing separators, empty → "/", lower-case)
// 2. Is it a blocked feed path, or under a blocked feed prefix? → Deny
// 3. Is it /<root>/<section> (or below) for an effective section? → Allow
// 4. Is it under a utility prefix? → Allow
// 5. No match → Deny
//
// Feed blocking runs first so no allowlist entry can re-open a feed.
// A snapshot is immutable; the only inputs besides the path are the
// snapshot itself and "now" (for grant expiry), so the function is pure.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grants::TemporaryGrants;
use crate::path::{is_nested_under, normalize_path};
use crate::rules::PolicyConfig;

/// Why a path was allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AllowBasis {
    /// Path lives under this allowlisted (or granted) section.
    Section(String),
    /// Path lives under this utility prefix.
    Utility(String),
}

/// Why a path was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DenyReason {
    /// Path matched this feed path or prefix.
    FeedBlocked(String),
    /// Path matched nothing on the allowlist.
    NotAllowlisted,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::FeedBlocked(rule) => write!(f, "feed path blocked ({rule})"),
            DenyReason::NotAllowlisted => write!(f, "not on the allowlist"),
        }
    }
}

/// The outcome of a policy decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Allow { basis: AllowBasis },
    Deny { reason: DenyReason },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow { .. })
    }
}

/// A step in the decision chain, for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationStep {
    /// Which check was performed (e.g., "feed_block", "section_match").
    pub check: String,
    /// The outcome of this check.
    pub outcome: String,
    /// Whether this step decided the verdict.
    pub terminal: bool,
}

/// Verdict plus every check the engine ran to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationTrace {
    pub path: String,
    pub normalized_path: String,
    pub verdict: Verdict,
    pub steps: Vec<EvaluationStep>,
}

/// An immutable view of the full rule set.
///
/// The store swaps whole snapshots; readers hold an `Arc` and never see a
/// half-applied update.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    config: Arc<PolicyConfig>,
    permanent: Vec<String>,
    grants: TemporaryGrants,
}

impl PolicySnapshot {
    /// Build a snapshot. `config` must already be normalized and
    /// `permanent` already sanitized.
    pub fn new(config: Arc<PolicyConfig>, permanent: Vec<String>, grants: TemporaryGrants) -> Self {
        Self {
            config,
            permanent,
            grants,
        }
    }

    /// Snapshot holding only the configured defaults.
    pub fn defaults(config: Arc<PolicyConfig>) -> Self {
        let permanent = config.default_sections.clone();
        Self::new(config, permanent, TemporaryGrants::new())
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn permanent_sections(&self) -> &[String] {
        &self.permanent
    }

    pub fn grants(&self) -> &TemporaryGrants {
        &self.grants
    }

    pub(crate) fn with_permanent(&self, permanent: Vec<String>) -> Self {
        Self::new(Arc::clone(&self.config), permanent, self.grants.clone())
    }

    pub(crate) fn with_grants(&self, grants: TemporaryGrants) -> Self {
        Self::new(Arc::clone(&self.config), self.permanent.clone(), grants)
    }

    /// Permanent sections (configured order) followed by live grants.
    pub fn effective_sections(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut out = self.permanent.clone();
        for section in self.grants.active(now) {
            if !out.iter().any(|s| s == section) {
                out.push(section.to_string());
            }
        }
        out
    }

    /// Decide whether `path` may be shown at instant `now`.
    pub fn decide_at(&self, path: &str, now: DateTime<Utc>) -> Verdict {
        self.evaluate(path, now, None)
    }

    /// Same as `decide_at()` but records every check.
    pub fn decide_with_trace(&self, path: &str, now: DateTime<Utc>) -> EvaluationTrace {
        let mut steps = Vec::new();
        let verdict = self.evaluate(path, now, Some(&mut steps));
        EvaluationTrace {
            path: path.to_string(),
            normalized_path: normalize_path(path),
            verdict,
            steps,
        }
    }

    fn evaluate(
        &self,
        path: &str,
        now: DateTime<Utc>,
        mut steps: Option<&mut Vec<EvaluationStep>>,
    ) -> Verdict {
        let mut record = |check: &str, outcome: String, terminal: bool| {
            if let Some(steps) = steps.as_deref_mut() {
                steps.push(EvaluationStep {
                    check: check.to_string(),
                    outcome,
                    terminal,
                });
            }
        };

        // Step 1: normalize.
        let p = normalize_path(path);

        // Step 2: feed block.
        let feed_rule = self
            .config
            .blocked_feed_paths
            .iter()
            .find(|blocked| **blocked == p)
            .or_else(|| {
                self.config
                    .blocked_feed_prefixes
                    .iter()
                    .find(|prefix| is_nested_under(&p, prefix))
            });
        if let Some(rule) = feed_rule {
            record("feed_block", format!("denied: matches '{rule}'"), true);
            return Verdict::Deny {
                reason: DenyReason::FeedBlocked(rule.clone()),
            };
        }
        record("feed_block", "passed".to_string(), false);

        // Step 3: sections (permanent + live grants).
        let sections = self.effective_sections(now);
        if let Some(section) = sections
            .iter()
            .find(|s| is_nested_under(&p, &self.config.section_path(s)))
        {
            record("section_match", format!("allowed: section '{section}'"), true);
            return Verdict::Allow {
                basis: AllowBasis::Section(section.clone()),
            };
        }
        record(
            "section_match",
            format!("no match among {} section(s)", sections.len()),
            false,
        );

        // Step 4: utility prefixes.
        if let Some(prefix) = self
            .config
            .utility_prefixes
            .iter()
            .find(|prefix| is_nested_under(&p, prefix))
        {
            record("utility_match", format!("allowed: utility '{prefix}'"), true);
            return Verdict::Allow {
                basis: AllowBasis::Utility(prefix.clone()),
            };
        }
        record("utility_match", "no match".to_string(), false);

        // Step 5: default deny.
        record("default", "denied: not on the allowlist".to_string(), true);
        Verdict::Deny {
            reason: DenyReason::NotAllowlisted,
        }
    }
}
