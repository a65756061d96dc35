// gate.rs — NavigationGate: keeps the page location inside the allowed zone.
//
// On the target domain every location must be on the canonical host and
// allowed by the policy store; anything else is replace-navigated to the
// home section (`/<root>/<first effective section>/`). Other hosts are not
// the gate's business.
//
// The gate starts in `Evaluating`: the first check runs against whatever
// snapshot the store holds (defaults before persisted policy loads). The
// runtime calls `settle()` once the persisted policy is in and enforces
// again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use url::Url;

use fg_policy::section::DEFAULT_SECTIONS;
use fg_policy::{DenyReason, PolicyStore, Verdict};

use crate::host::{PageHost, ReasonChannel};
use crate::site::SiteProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    /// Decisions so far used the snapshot available at start.
    Evaluating,
    /// Persisted policy has been applied.
    Settled,
}

/// Why the gate navigated away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectReason {
    /// The page was on a non-canonical host of the target domain.
    HostMismatch { from: String, to: String },
    /// The policy store denied the path.
    BlockedPath { path: String, reason: DenyReason },
}

impl fmt::Display for RedirectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectReason::HostMismatch { from, to } => {
                write!(f, "Forced canonical host ({from} → {to})")
            }
            RedirectReason::BlockedPath { path, .. } => write!(f, "Blocked path: {path}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: Url,
    pub reason: RedirectReason,
}

/// What the gate last saw and did.
#[derive(Debug, Clone)]
pub struct NavigationState {
    pub current_url: Url,
    pub last_verdict: Option<Verdict>,
    pub last_redirect: Option<Redirect>,
}

pub struct NavigationGate {
    store: Arc<PolicyStore>,
    site: SiteProfile,
    host: Rc<dyn PageHost>,
    reasons: Rc<dyn ReasonChannel>,
    phase: Cell<GatePhase>,
    state: RefCell<NavigationState>,
}

impl NavigationGate {
    pub fn new(
        store: Arc<PolicyStore>,
        site: SiteProfile,
        host: Rc<dyn PageHost>,
        reasons: Rc<dyn ReasonChannel>,
    ) -> Self {
        let current_url = host.location();
        Self {
            store,
            site,
            host,
            reasons,
            phase: Cell::new(GatePhase::Evaluating),
            state: RefCell::new(NavigationState {
                current_url,
                last_verdict: None,
                last_redirect: None,
            }),
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase.get()
    }

    pub fn settle(&self) {
        if self.phase.replace(GatePhase::Settled) == GatePhase::Evaluating {
            tracing::debug!("navigation gate settled on persisted policy");
        }
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Check the current location and redirect if it is off-policy.
    ///
    /// Returns true when the page may stay (including every non-target
    /// host), false when a redirect was issued or the location is
    /// otherwise off-policy.
    pub fn enforce(&self) -> bool {
        let location = self.host.location();
        self.state.borrow_mut().current_url = location.clone();

        let Some(host) = location.host_str() else {
            return true;
        };
        if !self.site.is_target_host(host) {
            return true;
        }

        if !self.site.is_canonical_host(host) {
            self.redirect(RedirectReason::HostMismatch {
                from: host.to_string(),
                to: self.site.canonical_host().to_string(),
            });
            return false;
        }

        let path = location.path();
        let verdict = self.store.decide(path);
        self.state.borrow_mut().last_verdict = Some(verdict.clone());
        match verdict {
            Verdict::Allow { basis } => {
                tracing::debug!(path, ?basis, phase = ?self.phase(), "location allowed");
                true
            }
            Verdict::Deny { reason } => {
                self.redirect(RedirectReason::BlockedPath {
                    path: path.to_string(),
                    reason,
                });
                false
            }
        }
    }

    /// Location-only check: target host, canonical, and allowed.
    pub fn in_allowed_zone(&self) -> bool {
        let location = self.host.location();
        let Some(host) = location.host_str() else {
            return false;
        };
        self.site.is_target_host(host)
            && self.site.is_canonical_host(host)
            && self.store.decide(location.path()).is_allowed()
    }

    /// `https://<canonical>/<root>/<first effective section>/`
    pub fn home_url(&self) -> Url {
        let sections = self.store.effective_sections();
        let first = sections
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_SECTIONS[0]);
        self.site
            .section_url(&self.store.config().section_root, first)
    }

    /// Post `reason`, then replace-navigate home.
    ///
    /// Does nothing when the page is already at the home URL; that only
    /// happens when the home section is itself denied.
    pub fn redirect(&self, reason: RedirectReason) -> Option<Redirect> {
        let target = self.home_url();
        let current = self.host.location();
        if target == current {
            tracing::warn!(url = %current, %reason, "home section is off-policy; not redirecting");
            return None;
        }

        let message = reason.to_string();
        tracing::info!(from = %current, to = %target, reason = %message, "redirecting");
        self.reasons.post(&message);
        self.host.replace_location(&target);

        let redirect = Redirect { target, reason };
        self.state.borrow_mut().last_redirect = Some(redirect.clone());
        Some(redirect)
    }

    /// Redirect for a blocked click. The reason text is the caller's.
    pub(crate) fn redirect_with_message(&self, target: &Url, message: &str) {
        tracing::info!(to = %target, reason = message, "redirecting after blocked click");
        self.reasons.post(message);
        self.host.replace_location(target);
    }

    pub fn state(&self) -> NavigationState {
        self.state.borrow().clone()
    }

    pub(crate) fn take_posted_reason(&self) -> Option<String> {
        self.reasons.take()
    }
}
