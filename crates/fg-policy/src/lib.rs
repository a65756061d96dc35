//! # fg-policy
//!
//! Section allowlist and navigation policy for Feedgate.
//!
//! Implements the "default deny" boundary for a single target site: a page
//! path is only reachable when it lives under an allowlisted section or a
//! utility route, and algorithmic feed entry points are denied no matter
//! what else matches. The [`PolicyStore`] owns the current rule set and
//! hands out immutable [`PolicySnapshot`]s; [`PolicySnapshot::decide_at`] is
//! the pure decision point every other component consults.
//!
//! ## Key invariants
//!
//! - **Feed block wins**: a blocked feed path is denied even when it also
//!   matches an allowed section or utility prefix.
//! - **Sanitized sections only**: every section identifier is lower-cased,
//!   stripped of its `/r/` marker and filtered to `[a-z0-9_]` before it
//!   enters a rule set.
//! - **Grants only grow**: re-granting a section keeps the later expiry, and
//!   expired grants are logically absent and pruned from storage.
//! - **Never unavailable**: when persistence is missing or failing the store
//!   keeps serving compiled-in defaults.

pub mod clock;
pub mod editor;
pub mod engine;
pub mod error;
pub mod grants;
pub mod path;
pub mod rules;
pub mod section;
pub mod storage;
pub mod store;
pub mod unlock;

pub use clock::{Clock, ManualClock, SystemClock};
pub use editor::SectionsEditor;
pub use engine::{
    AllowBasis, DenyReason, EvaluationStep, EvaluationTrace, PolicySnapshot, Verdict,
};
pub use error::PolicyError;
pub use grants::{GrantEntry, TemporaryGrants};
pub use rules::PolicyConfig;
pub use storage::{
    JsonFileStorage, KeyValueStore, MemoryStorage, StorageArea, StorageChange, GRANTS_KEY,
    SECTIONS_KEY, UNLOCK_KEY,
};
pub use store::PolicyStore;
pub use unlock::{GrantNegotiator, UnlockStatus};
