// reconciler.rs — Executes scheduler plans against the document.

use std::time::Duration;

use url::Url;

use crate::dom::Document;
use crate::links::{LinkInterceptor, ScanReport};
use crate::rail::RailSuppressor;
use crate::scheduler::{MutationRecord, ReconcileScheduler, SchedulerConfig};

/// What one flush (or full pass) did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Roots classified.
    pub roots: usize,
    pub links: ScanReport,
    pub rail_ran: bool,
    pub rail_hidden: usize,
    /// Roots dropped because the location was off-policy.
    pub discarded: usize,
    /// Another flush must run after `flush_delay`.
    pub reschedule: bool,
}

pub struct Reconciler<D: Document> {
    scheduler: ReconcileScheduler<D::Element>,
    interceptor: LinkInterceptor,
    rail: Box<dyn RailSuppressor<D>>,
}

impl<D: Document> Reconciler<D> {
    pub fn new(
        config: &SchedulerConfig,
        interceptor: LinkInterceptor,
        rail: Box<dyn RailSuppressor<D>>,
    ) -> Self {
        Self {
            scheduler: ReconcileScheduler::new(config),
            interceptor,
            rail,
        }
    }

    /// Queue inserted roots. Returns a delay when the caller must arm a flush.
    pub fn on_mutations<I>(&mut self, records: I) -> Option<Duration>
    where
        I: IntoIterator<Item = MutationRecord<D::Element>>,
    {
        self.scheduler.on_mutations(records)
    }

    pub fn flush_delay(&self) -> Duration {
        self.scheduler.flush_delay()
    }

    pub fn pending_len(&self) -> usize {
        self.scheduler.pending_len()
    }

    /// Run the armed flush.
    pub fn flush(&mut self, doc: &D, location_allowed: bool, page: &Url) -> FlushReport {
        let plan = self.scheduler.take_flush(location_allowed);
        if plan.discarded > 0 {
            tracing::debug!(discarded = plan.discarded, "off-policy flush dropped pending work");
        }

        let mut report = FlushReport {
            discarded: plan.discarded,
            reschedule: plan.reschedule,
            ..FlushReport::default()
        };
        if plan.run_rail {
            report.rail_ran = true;
            report.rail_hidden = self.rail.suppress(doc, &doc.root());
        }
        for root in &plan.batch {
            report.roots += 1;
            // Roots removed again before the flush have nothing to classify.
            if doc.is_connected(root) {
                report
                    .links
                    .merge(self.interceptor.classify_and_lock(doc, root, page));
            }
        }
        report
    }

    /// One pass over the whole document, used after navigation.
    pub fn full_pass(&mut self, doc: &D, page: &Url) -> FlushReport {
        let root = doc.root();
        let rail_hidden = self.rail.suppress(doc, &root);
        let links = self.interceptor.classify_and_lock(doc, &root, page);
        tracing::debug!(rail_hidden, locked = links.locked, "full document pass");
        FlushReport {
            roots: 1,
            links,
            rail_ran: true,
            rail_hidden,
            discarded: 0,
            reschedule: false,
        }
    }
}
