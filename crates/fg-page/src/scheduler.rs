// scheduler.rs — Debounced, bounded reconciliation of DOM mutations.
//
// The target site mutates its DOM constantly while scrolling. Classifying
// every inserted subtree synchronously would pin the main thread, so work
// is split into three explicit pieces:
//
//   mutation records → pending set (+ rail dirty flag) → debounced flush
//
// - Only insertions create work. Removals and attribute changes are ignored.
// - The pending set de-duplicates and keeps insertion order.
// - A flush is armed only if none is armed already.
// - A flush on a disallowed location drops all pending work.
// - A flush runs the rail pass at most once, then drains at most
//   `max_batch` roots; leftovers stay pending and another flush is armed.
//
// The scheduler owns no timers and touches no DOM: it hands back plans and
// the caller executes them.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default debounce delay before a flush runs.
pub const DEFAULT_FLUSH_DELAY_MS: u64 = 120;
/// Default cap on roots classified per flush.
pub const DEFAULT_MAX_BATCH: usize = 60;

/// Scheduler tuning (`[scheduler]` in feedgate.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_flush_delay_ms")]
    pub flush_delay_ms: u64,
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flush_delay_ms: default_flush_delay_ms(),
            max_batch: default_max_batch(),
        }
    }
}

fn default_flush_delay_ms() -> u64 {
    DEFAULT_FLUSH_DELAY_MS
}

fn default_max_batch() -> usize {
    DEFAULT_MAX_BATCH
}

/// One observed DOM change, as a subtree observer reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord<E> {
    /// `E` (and its subtree) was inserted.
    Inserted(E),
    /// `E` was removed.
    Removed(E),
    /// An attribute on `E` changed.
    AttributeChanged(E),
}

/// What a flush should do. Produced by [`ReconcileScheduler::take_flush`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushPlan<E> {
    /// Run the rail suppressor once before classifying.
    pub run_rail: bool,
    /// Roots to classify, in insertion order.
    pub batch: Vec<E>,
    /// Roots still pending after this batch.
    pub remaining: usize,
    /// Arm another flush after this one.
    pub reschedule: bool,
    /// Pending roots dropped because the location is off-policy.
    pub discarded: usize,
}

/// Pending-work bookkeeping for the reconciler.
#[derive(Debug)]
pub struct ReconcileScheduler<E> {
    pending: VecDeque<E>,
    queued: HashSet<E>,
    rail_dirty: bool,
    flush_armed: bool,
    flush_delay: Duration,
    max_batch: usize,
}

impl<E: Clone + Eq + Hash> ReconcileScheduler<E> {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            pending: VecDeque::new(),
            queued: HashSet::new(),
            rail_dirty: false,
            flush_armed: false,
            flush_delay: Duration::from_millis(config.flush_delay_ms),
            max_batch: config.max_batch.max(1),
        }
    }

    /// Record a burst of mutation records.
    ///
    /// Returns the delay after which the caller must call `take_flush()`,
    /// or `None` when a flush is already armed (or there is nothing to do).
    pub fn on_mutations<I>(&mut self, records: I) -> Option<Duration>
    where
        I: IntoIterator<Item = MutationRecord<E>>,
    {
        let mut inserted = false;
        for record in records {
            if let MutationRecord::Inserted(el) = record {
                inserted = true;
                if self.queued.insert(el.clone()) {
                    self.pending.push_back(el);
                }
            }
        }
        if !inserted {
            return None;
        }
        self.rail_dirty = true;
        self.arm()
    }

    /// Consume the armed flush and plan its work.
    ///
    /// `location_allowed` must reflect the location *now*, not when the
    /// flush was armed.
    pub fn take_flush(&mut self, location_allowed: bool) -> FlushPlan<E> {
        self.flush_armed = false;

        if !location_allowed {
            let discarded = self.pending.len();
            self.pending.clear();
            self.queued.clear();
            self.rail_dirty = false;
            return FlushPlan {
                run_rail: false,
                batch: Vec::new(),
                remaining: 0,
                reschedule: false,
                discarded,
            };
        }

        let run_rail = std::mem::take(&mut self.rail_dirty);
        let take = self.pending.len().min(self.max_batch);
        let batch: Vec<E> = self.pending.drain(..take).collect();
        for el in &batch {
            self.queued.remove(el);
        }
        let remaining = self.pending.len();
        let reschedule = remaining > 0;
        if reschedule {
            self.flush_armed = true;
        }
        FlushPlan {
            run_rail,
            batch,
            remaining,
            reschedule,
            discarded: 0,
        }
    }

    pub fn flush_delay(&self) -> Duration {
        self.flush_delay
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_rail_dirty(&self) -> bool {
        self.rail_dirty
    }

    pub fn is_flush_armed(&self) -> bool {
        self.flush_armed
    }

    fn arm(&mut self) -> Option<Duration> {
        if self.flush_armed {
            None
        } else {
            self.flush_armed = true;
            Some(self.flush_delay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(max_batch: usize) -> ReconcileScheduler<u32> {
        ReconcileScheduler::new(&SchedulerConfig {
            flush_delay_ms: 120,
            max_batch,
        })
    }

    fn inserted(ids: impl IntoIterator<Item = u32>) -> Vec<MutationRecord<u32>> {
        ids.into_iter().map(MutationRecord::Inserted).collect()
    }

    #[test]
    fn first_burst_arms_once() {
        let mut s = scheduler(60);
        assert_eq!(s.on_mutations(inserted([1, 2])), Some(Duration::from_millis(120)));
        assert_eq!(s.on_mutations(inserted([3])), None);
        assert_eq!(s.pending_len(), 3);
        assert!(s.is_rail_dirty());
    }

    #[test]
    fn removals_and_attribute_changes_create_no_work() {
        let mut s = scheduler(60);
        let records = vec![MutationRecord::Removed(1), MutationRecord::AttributeChanged(2)];
        assert_eq!(s.on_mutations(records), None);
        assert_eq!(s.pending_len(), 0);
        assert!(!s.is_rail_dirty());
        assert!(!s.is_flush_armed());
    }

    #[test]
    fn duplicates_are_queued_once() {
        let mut s = scheduler(60);
        s.on_mutations(inserted([1, 2, 1, 2, 3]));
        let plan = s.take_flush(true);
        assert_eq!(plan.batch, vec![1, 2, 3]);
    }

    #[test]
    fn off_policy_flush_discards_everything() {
        let mut s = scheduler(60);
        s.on_mutations(inserted(0..10));
        let plan = s.take_flush(false);
        assert!(plan.batch.is_empty());
        assert!(!plan.run_rail);
        assert!(!plan.reschedule);
        assert_eq!(plan.discarded, 10);
        assert_eq!(s.pending_len(), 0);
        assert!(!s.is_rail_dirty());
        assert!(!s.is_flush_armed());
    }

    #[test]
    fn large_burst_is_drained_in_capped_slices() {
        let mut s = scheduler(60);
        s.on_mutations(inserted(0..150));

        let first = s.take_flush(true);
        assert_eq!(first.batch.len(), 60);
        assert!(first.run_rail);
        assert!(first.reschedule);
        assert_eq!(first.remaining, 90);
        assert!(s.is_flush_armed());

        let second = s.take_flush(true);
        assert_eq!(second.batch.len(), 60);
        assert!(!second.run_rail);

        let third = s.take_flush(true);
        assert_eq!(third.batch.len(), 30);
        assert!(!third.reschedule);
        assert!(!s.is_flush_armed());

        let mut all: Vec<u32> = first.batch;
        all.extend(second.batch);
        all.extend(third.batch);
        assert_eq!(all, (0..150).collect::<Vec<_>>());
    }

    #[test]
    fn mutations_during_reschedule_do_not_double_arm() {
        let mut s = scheduler(2);
        s.on_mutations(inserted([1, 2, 3]));
        let plan = s.take_flush(true);
        assert!(plan.reschedule);
        // A flush is already armed by the reschedule.
        assert_eq!(s.on_mutations(inserted([4])), None);
        let plan = s.take_flush(true);
        assert_eq!(plan.batch, vec![3, 4]);
        assert!(plan.run_rail);
    }

    #[test]
    fn processed_element_can_be_queued_again_after_reinsertion() {
        let mut s = scheduler(60);
        s.on_mutations(inserted([7]));
        assert_eq!(s.take_flush(true).batch, vec![7]);
        assert!(s.on_mutations(inserted([7])).is_some());
        assert_eq!(s.take_flush(true).batch, vec![7]);
    }
}
