// navigation.rs — Navigation watch.
//
// Single-page navigations don't reload the page, so three adapters report
// them into one channel:
//
// - the history hook wraps programmatic pushState/replaceState,
// - popstate covers back/forward,
// - the URL poller catches anything the other two miss.
//
// The hook only *sends* a signal after the wrapped call has returned; the
// consumer runs later, on its own task, never inside the interception point.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use url::Url;

/// Default URL polling interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// Default lifetime of a displayed redirect reason.
pub const DEFAULT_REASON_TTL_MS: u64 = 5000;

/// Navigation watch tuning (`[navigation]` in feedgate.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long a banner carrying a redirect reason stays up.
    #[serde(default = "default_reason_ttl_ms")]
    pub reason_ttl_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            reason_ttl_ms: default_reason_ttl_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_reason_ttl_ms() -> u64 {
    DEFAULT_REASON_TTL_MS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMethod {
    PushState,
    ReplaceState,
}

/// Which adapter noticed a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSignal {
    History(HistoryMethod),
    PopState,
    UrlPolled,
}

/// Sending half shared by the adapters.
#[derive(Debug, Clone)]
pub struct NavigationSignals {
    tx: mpsc::UnboundedSender<NavigationSignal>,
}

/// Create the navigation channel.
pub fn navigation_channel() -> (NavigationSignals, mpsc::UnboundedReceiver<NavigationSignal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NavigationSignals { tx }, rx)
}

impl NavigationSignals {
    /// Run the original history method, then report the navigation.
    ///
    /// The original's return value is passed through unchanged.
    pub fn history_hook<R>(&self, method: HistoryMethod, original: impl FnOnce() -> R) -> R {
        let ret = original();
        self.emit(NavigationSignal::History(method));
        ret
    }

    /// Back/forward navigation.
    pub fn popstate(&self) {
        self.emit(NavigationSignal::PopState);
    }

    pub(crate) fn url_polled(&self) {
        self.emit(NavigationSignal::UrlPolled);
    }

    fn emit(&self, signal: NavigationSignal) {
        if self.tx.send(signal).is_err() {
            tracing::debug!(?signal, "navigation consumer gone; signal dropped");
        }
    }
}

/// Polling fallback: remembers the last URL seen.
#[derive(Debug, Clone)]
pub struct UrlPoller {
    last_seen: Url,
}

impl UrlPoller {
    pub fn new(current: Url) -> Self {
        Self { last_seen: current }
    }

    /// True when `current` differs from the last URL seen.
    pub fn poll(&mut self, current: &Url) -> bool {
        if *current == self.last_seen {
            return false;
        }
        self.last_seen = current.clone();
        true
    }

    pub fn last_seen(&self) -> &Url {
        &self.last_seen
    }
}
