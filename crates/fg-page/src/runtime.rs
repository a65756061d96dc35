// runtime.rs — PageRuntime: wires gate, reconciler and navigation watch.
//
// Runs single-threaded inside a tokio `LocalSet`; every handler runs to
// completion before the next one starts, so page state lives in plain
// `RefCell`s. `start()` must be called from within the `LocalSet`.
//
// Lifecycle:
//
//   start ─► on_navigate (default snapshot)
//        ├─► task: refresh persisted policy ─► settle ─► on_navigate
//        ├─► task: follow storage change notifications
//        ├─► task: consume navigation signals ─► on_navigate
//        └─► task: poll the URL ─► signal on change
//
// Mutation bursts arrive through `notify_mutations()`; each armed flush is
// a sleeping task that re-checks the location when it wakes. A banner that
// carries a redirect reason is cleared again after the reason TTL unless a
// later navigation has replaced it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use fg_policy::PolicyStore;

use crate::click::{ClickEvent, ClickGuard, ClickVerdict};
use crate::config::FeedgateConfig;
use crate::dom::Document;
use crate::error::PageError;
use crate::gate::NavigationGate;
use crate::host::{PageHost, ReasonChannel};
use crate::links::LinkInterceptor;
use crate::navigation::{navigation_channel, NavigationSignal, NavigationSignals, UrlPoller};
use crate::rail::{HeuristicRailSuppressor, NoopRailSuppressor, RailSuppressor};
use crate::reconciler::{FlushReport, Reconciler};
use crate::scheduler::MutationRecord;
use crate::site::SiteProfile;

struct Inner<D: Document> {
    doc: Rc<D>,
    host: Rc<dyn PageHost>,
    gate: NavigationGate,
    clicks: ClickGuard,
    reconciler: RefCell<Reconciler<D>>,
    signals: NavigationSignals,
    signal_rx: RefCell<Option<mpsc::UnboundedReceiver<NavigationSignal>>>,
    poll_interval: Duration,
    reason_ttl: Duration,
    banner_epoch: Cell<u64>,
    tasks: RefCell<Vec<JoinHandle<()>>>,
}

/// The content-script pipeline for one page.
pub struct PageRuntime<D: Document> {
    inner: Rc<Inner<D>>,
}

impl<D: Document> Clone for PageRuntime<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<D: Document + 'static> PageRuntime<D> {
    pub fn new(
        config: &FeedgateConfig,
        store: Arc<PolicyStore>,
        doc: Rc<D>,
        host: Rc<dyn PageHost>,
        reasons: Rc<dyn ReasonChannel>,
    ) -> Result<Self, PageError> {
        let site = SiteProfile::new(&config.site)?;
        let interceptor = LinkInterceptor::new(Arc::clone(&store), site.clone());
        let rail: Box<dyn RailSuppressor<D>> = if config.rail.enabled {
            Box::new(HeuristicRailSuppressor::new(&config.rail)?)
        } else {
            Box::new(NoopRailSuppressor)
        };
        let gate = NavigationGate::new(store, site, Rc::clone(&host), reasons);
        let (signals, signal_rx) = navigation_channel();

        Ok(Self {
            inner: Rc::new(Inner {
                doc,
                host,
                gate,
                clicks: ClickGuard::new(interceptor.clone()),
                reconciler: RefCell::new(Reconciler::new(&config.scheduler, interceptor, rail)),
                signals,
                signal_rx: RefCell::new(Some(signal_rx)),
                poll_interval: Duration::from_millis(config.navigation.poll_interval_ms.max(1)),
                reason_ttl: Duration::from_millis(config.navigation.reason_ttl_ms),
                banner_epoch: Cell::new(0),
                tasks: RefCell::new(Vec::new()),
            }),
        })
    }

    pub fn gate(&self) -> &NavigationGate {
        &self.inner.gate
    }

    /// Sender for the host's history hook and popstate listener.
    pub fn signals(&self) -> NavigationSignals {
        self.inner.signals.clone()
    }

    /// Enforce once, then start the background tasks. Returns whether the
    /// initial location was allowed.
    pub fn start(&self) -> bool {
        let allowed = self.on_navigate();

        let this = self.clone();
        self.spawn(async move {
            this.inner.gate.store().refresh().await;
            this.inner.gate.settle();
            this.on_navigate();
        });

        if let Some(changes) = self.inner.gate.store().subscribe() {
            let store = Arc::clone(self.inner.gate.store());
            self.spawn(async move { store.follow_changes(changes).await });
        }

        if let Some(mut rx) = self.inner.signal_rx.borrow_mut().take() {
            let this = self.clone();
            self.spawn(async move {
                while let Some(signal) = rx.recv().await {
                    tracing::debug!(?signal, "navigation signal");
                    this.on_navigate();
                }
            });
        }

        let this = self.clone();
        self.spawn(async move {
            let mut poller = UrlPoller::new(this.inner.host.location());
            let mut ticks = tokio::time::interval(this.inner.poll_interval);
            loop {
                ticks.tick().await;
                if poller.poll(&this.inner.host.location()) {
                    this.inner.signals.url_polled();
                }
            }
        });

        allowed
    }

    /// Abort every background task and pending flush.
    pub fn shutdown(&self) {
        for task in self.inner.tasks.borrow_mut().drain(..) {
            task.abort();
        }
    }

    /// Enforce the location; when allowed, show the banner and run one full
    /// pass over the document.
    pub fn on_navigate(&self) -> bool {
        let inner = &self.inner;
        if !inner.gate.enforce() {
            return false;
        }

        let message = inner
            .gate
            .take_posted_reason()
            .map(|reason| format!("Redirected: {reason}"));
        inner.host.show_banner(message.as_deref());
        let epoch = inner.banner_epoch.get() + 1;
        inner.banner_epoch.set(epoch);
        if message.is_some() {
            self.clear_banner_after(epoch);
        }

        let page = inner.host.location();
        let report = inner.reconciler.borrow_mut().full_pass(&*inner.doc, &page);
        tracing::info!(
            url = %page,
            locked = report.links.locked,
            rail_hidden = report.rail_hidden,
            "page allowed"
        );
        true
    }

    /// Feed one mutation-observer callback's records.
    pub fn notify_mutations(&self, records: Vec<MutationRecord<D::Element>>) {
        if !self.inner.gate.in_allowed_zone() {
            return;
        }
        let armed = self.inner.reconciler.borrow_mut().on_mutations(records);
        if let Some(delay) = armed {
            self.arm_flush(delay);
        }
    }

    /// Run a flush now. Normally called by the armed timer.
    pub fn flush(&self) -> FlushReport {
        let inner = &self.inner;
        let allowed = inner.gate.in_allowed_zone();
        let page = inner.host.location();
        let (report, delay) = {
            let mut reconciler = inner.reconciler.borrow_mut();
            let report = reconciler.flush(&*inner.doc, allowed, &page);
            (report, reconciler.flush_delay())
        };
        if report.reschedule {
            self.arm_flush(delay);
        }
        report
    }

    /// Capture-phase click handler. On a redirecting block the reason is
    /// posted and the page sent home.
    pub fn handle_click(&self, event: &ClickEvent<D::Element>) -> ClickVerdict {
        let inner = &self.inner;
        let page = inner.host.location();
        let verdict = inner
            .clicks
            .on_click(&*inner.doc, event, &page, || inner.gate.home_url());
        if let ClickVerdict::Block {
            redirect_to: Some(target),
            reason,
        } = &verdict
        {
            inner.gate.redirect_with_message(target, reason);
        }
        verdict
    }

    fn clear_banner_after(&self, epoch: u64) {
        let this = self.clone();
        self.spawn(async move {
            tokio::time::sleep(this.inner.reason_ttl).await;
            if this.inner.banner_epoch.get() == epoch {
                this.inner.host.show_banner(None);
            }
        });
    }

    fn arm_flush(&self, delay: Duration) {
        let this = self.clone();
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            this.flush();
        });
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + 'static,
    {
        let mut tasks = self.inner.tasks.borrow_mut();
        tasks.retain(|t| !t.is_finished());
        tasks.push(tokio::task::spawn_local(task));
    }
}
