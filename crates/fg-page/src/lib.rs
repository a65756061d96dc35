//! # fg-page
//!
//! The in-page half of Feedgate: everything that runs against a live
//! document on the target site.
//!
//! A [`PageRuntime`] owns one [`NavigationGate`] (location enforcement and
//! redirects), one [`Reconciler`] (debounced link locking and rail
//! suppression) and the navigation watch. It reaches the page only through
//! the [`Document`] and [`PageHost`] traits, so the same pipeline runs in a
//! browser binding and against [`MemoryDocument`] in tests.
//!
//! ## Key invariants
//!
//! - **Location first**: no DOM work runs while the location is off-policy;
//!   a flush that wakes up on a denied location discards its work.
//! - **Bounded work**: each flush classifies at most `max_batch` roots.
//! - **Classify once**: flagged anchors and rail elements are never
//!   re-examined.
//! - **Primary content is never hidden**.

pub mod click;
pub mod config;
pub mod dom;
pub mod error;
pub mod gate;
pub mod host;
pub mod links;
pub mod memory_dom;
pub mod navigation;
pub mod rail;
pub mod reconciler;
pub mod runtime;
pub mod scheduler;
pub mod site;

pub use click::{ClickEvent, ClickGuard, ClickVerdict, Modifiers, MouseButton};
pub use config::{FeedgateConfig, GrantsConfig};
pub use dom::{Document, Rect};
pub use error::PageError;
pub use gate::{GatePhase, NavigationGate, NavigationState, Redirect, RedirectReason};
pub use host::{MemoryHost, PageHost, ReasonChannel, SessionReasonSlot};
pub use links::{LinkDenial, LinkInterceptor, LinkVerdict, ScanReport};
pub use memory_dom::{ElementId, MemoryDocument};
pub use navigation::{
    navigation_channel, HistoryMethod, NavigationConfig, NavigationSignal, NavigationSignals,
    UrlPoller,
};
pub use rail::{HeuristicRailSuppressor, NoopRailSuppressor, RailConfig, RailSuppressor};
pub use reconciler::{FlushReport, Reconciler};
pub use runtime::PageRuntime;
pub use scheduler::{FlushPlan, MutationRecord, ReconcileScheduler, SchedulerConfig};
pub use site::{SiteConfig, SiteProfile};
