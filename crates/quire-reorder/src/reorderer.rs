//! Delivers versioned items to a sink in strictly increasing version order.
//!
//! Items that arrive ahead of the next expected version are buffered. When a
//! gap stays open for longer than the configured timeout, the timeout
//! callback is told the last version that made it through so that the
//! caller can recover (typically by re-requesting the missing range and
//! calling [`Reorderer::skip_to_version`]).

use crate::config::ReordererConfig;
use crate::error::{ReorderError, Result};
use crate::timer::{Timer, TimerFactory};
use crate::Version;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Receives items in version order.
pub trait ItemSink<T>: Send {
    fn on_item(&mut self, item: T, version: Version);
}

impl<T, F> ItemSink<T> for F
where
    F: FnMut(T, Version) + Send,
{
    fn on_item(&mut self, item: T, version: Version) {
        self(item, version)
    }
}

/// Buffers out-of-order items and releases them in order.
pub struct Reorderer<T> {
    next_expected: Arc<AtomicU64>,
    pending: BTreeMap<Version, T>,
    sink: Box<dyn ItemSink<T>>,
    timeout: Duration,
    timeout_enabled: bool,
    queueing_until_skip: bool,
    timer: Box<dyn Timer>,
}

impl<T> Reorderer<T> {
    /// Create a reorderer expecting `first_version` next.
    ///
    /// `timeout_callback` receives the last dispatched version, or `None`
    /// when nothing before `first_version` exists.
    pub fn new<S, C>(
        first_version: Version,
        sink: S,
        timeout: Duration,
        timeout_callback: C,
        timer_factory: &dyn TimerFactory,
    ) -> Result<Self>
    where
        S: ItemSink<T> + 'static,
        C: Fn(Option<Version>) + Send + Sync + 'static,
    {
        let config = ReordererConfig {
            first_version,
            timeout,
            ..ReordererConfig::default()
        };
        Self::from_config(config, sink, timeout_callback, timer_factory)
    }

    pub fn from_config<S, C>(
        config: ReordererConfig,
        sink: S,
        timeout_callback: C,
        timer_factory: &dyn TimerFactory,
    ) -> Result<Self>
    where
        S: ItemSink<T> + 'static,
        C: Fn(Option<Version>) + Send + Sync + 'static,
    {
        if config.timeout.is_zero() {
            return Err(ReorderError::InvalidTimeout);
        }

        let next_expected = Arc::new(AtomicU64::new(config.first_version));
        let shared = next_expected.clone();
        let timer = timer_factory.create_timer(Arc::new(move || {
            let last_dispatched = shared.load(Ordering::SeqCst).checked_sub(1);
            warn!(?last_dispatched, "Gap timeout expired");
            timeout_callback(last_dispatched);
        }));

        Ok(Self {
            next_expected,
            pending: BTreeMap::new(),
            sink: Box::new(sink),
            timeout: config.timeout,
            timeout_enabled: config.timeout_enabled,
            queueing_until_skip: false,
            timer,
        })
    }

    pub fn next_expected_version(&self) -> Version {
        self.next_expected.load(Ordering::SeqCst)
    }

    /// Number of buffered items waiting on a gap.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Buffered versions in ascending order.
    pub fn pending_versions(&self) -> Vec<Version> {
        self.pending.keys().copied().collect()
    }

    pub fn is_timeout_enabled(&self) -> bool {
        self.timeout_enabled
    }

    pub fn is_queueing_until_skip(&self) -> bool {
        self.queueing_until_skip
    }

    /// Offer an item. Stale versions are dropped.
    pub fn accept_item(&mut self, item: T, version: Version) {
        let next = self.next_expected_version();
        if version < next {
            trace!(version, next, "Dropping stale item");
            return;
        }

        let was_empty = self.pending.is_empty();
        self.pending.insert(version, item);

        if self.queueing_until_skip {
            return;
        }

        if version == next {
            self.timer.cancel();
            self.dispatch_ready();
            if !self.pending.is_empty() {
                self.schedule_timeout();
            }
        } else {
            debug!(version, next, "Buffering item ahead of gap");
            if was_empty {
                self.schedule_timeout();
            }
        }
    }

    /// Treat everything before `version` as delivered and resume from it.
    pub fn skip_to_version(&mut self, version: Version) {
        debug!(version, "Skipping to version");
        self.next_expected.store(version, Ordering::SeqCst);
        self.queueing_until_skip = false;
        self.timer.cancel();

        self.pending = self.pending.split_off(&version);
        self.dispatch_ready();
        if !self.pending.is_empty() {
            self.schedule_timeout();
        }
    }

    /// Buffer everything until the next [`skip_to_version`](Self::skip_to_version).
    pub fn queue_until_skip_to_version_is_called(&mut self) {
        self.queueing_until_skip = true;
        self.timer.cancel();
    }

    pub fn set_timeout_enabled(&mut self, enabled: bool) {
        self.timeout_enabled = enabled;
        if enabled {
            if !self.pending.is_empty() {
                self.schedule_timeout();
            }
        } else {
            self.timer.cancel();
        }
    }

    /// Stop the gap timer. Buffered items are kept.
    pub fn cleanup(&mut self) {
        self.set_timeout_enabled(false);
    }

    fn schedule_timeout(&mut self) {
        if self.timeout_enabled && !self.queueing_until_skip {
            self.timer.schedule(self.timeout);
        }
    }

    fn dispatch_ready(&mut self) {
        let mut next = self.next_expected_version();
        while let Some(item) = self.pending.remove(&next) {
            self.sink.on_item(item, next);
            next += 1;
            self.next_expected.store(next, Ordering::SeqCst);
        }
    }
}

impl<T> std::fmt::Debug for Reorderer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reorderer")
            .field("next_expected", &self.next_expected_version())
            .field("pending", &self.pending_versions())
            .field("timeout", &self.timeout)
            .field("timeout_enabled", &self.timeout_enabled)
            .field("queueing_until_skip", &self.queueing_until_skip)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{ManualTimer, ManualTimerFactory};
    use parking_lot::Mutex;

    struct Harness {
        reorderer: Reorderer<&'static str>,
        dispatched: Arc<Mutex<Vec<Version>>>,
        timeouts: Arc<Mutex<Vec<Option<Version>>>>,
        timer: ManualTimer,
    }

    impl Harness {
        fn new(first_version: Version) -> Self {
            let factory = ManualTimerFactory::new();
            let dispatched = Arc::new(Mutex::new(Vec::new()));
            let timeouts = Arc::new(Mutex::new(Vec::new()));
            let sink = {
                let dispatched = dispatched.clone();
                move |_item: &'static str, version: Version| dispatched.lock().push(version)
            };
            let callback = {
                let timeouts = timeouts.clone();
                move |last: Option<Version>| timeouts.lock().push(last)
            };
            let reorderer = Reorderer::new(
                first_version,
                sink,
                Duration::from_millis(100),
                callback,
                &factory,
            )
            .unwrap();
            let timer = factory.last_timer().unwrap();
            Self {
                reorderer,
                dispatched,
                timeouts,
                timer,
            }
        }

        fn accept_all(&mut self, versions: &[Version]) {
            for &v in versions {
                self.reorderer.accept_item("item", v);
            }
        }

        fn dispatched(&self) -> Vec<Version> {
            self.dispatched.lock().clone()
        }

        fn timeouts(&self) -> Vec<Option<Version>> {
            self.timeouts.lock().clone()
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let factory = ManualTimerFactory::new();
        let result = Reorderer::<()>::new(0, |_: (), _: Version| {}, Duration::ZERO, |_| {}, &factory);
        assert_eq!(result.unwrap_err(), ReorderError::InvalidTimeout);
    }

    #[test]
    fn test_in_order_from_one() {
        let mut h = Harness::new(1);
        h.accept_all(&[1, 2, 3]);
        assert_eq!(h.dispatched(), vec![1, 2, 3]);
        assert!(!h.timer.is_armed());
    }

    #[test]
    fn test_in_order_from_three() {
        let mut h = Harness::new(3);
        h.accept_all(&[3, 4, 5]);
        assert_eq!(h.dispatched(), vec![3, 4, 5]);
        assert_eq!(h.reorderer.next_expected_version(), 6);
    }

    #[test]
    fn test_swapped_pair() {
        let mut h = Harness::new(1);
        h.accept_all(&[2, 1]);
        assert_eq!(h.dispatched(), vec![1, 2]);
        assert!(!h.timer.is_armed());
    }

    #[test]
    fn test_out_of_order_runs() {
        let mut h = Harness::new(1);
        h.accept_all(&[1, 2, 5, 4, 3]);
        assert_eq!(h.dispatched(), vec![1, 2, 3, 4, 5]);

        let mut h = Harness::new(1);
        h.accept_all(&[5, 3, 1, 4, 2]);
        assert_eq!(h.dispatched(), vec![1, 2, 3, 4, 5]);
        assert_eq!(h.reorderer.pending_count(), 0);
        assert!(!h.timer.is_armed());
    }

    #[test]
    fn test_three_five_four() {
        let mut h = Harness::new(3);
        h.accept_all(&[3, 5]);
        assert_eq!(h.dispatched(), vec![3]);
        assert!(h.timer.is_armed());
        h.accept_all(&[4]);
        assert_eq!(h.dispatched(), vec![3, 4, 5]);
        assert!(!h.timer.is_armed());
    }

    #[test]
    fn test_stale_versions_dropped() {
        let mut h = Harness::new(1);
        h.accept_all(&[1, 2, 1, 0]);
        assert_eq!(h.dispatched(), vec![1, 2]);
        assert_eq!(h.reorderer.pending_count(), 0);
    }

    #[test]
    fn test_timeout_reports_last_dispatched() {
        let mut h = Harness::new(1);
        h.accept_all(&[1, 2, 3, 5]);
        assert_eq!(h.timer.armed_delay(), Some(Duration::from_millis(100)));
        assert!(h.timer.fire());
        assert_eq!(h.timeouts(), vec![Some(3)]);
        assert_eq!(h.reorderer.pending_versions(), vec![5]);
    }

    #[test]
    fn test_lone_item_ahead_of_first_version() {
        let mut h = Harness::new(3);
        h.accept_all(&[5]);
        assert!(h.timer.fire());
        assert_eq!(h.timeouts(), vec![Some(2)]);
        assert!(h.dispatched().is_empty());
        assert_eq!(h.reorderer.pending_versions(), vec![5]);
    }

    #[test]
    fn test_timeout_before_anything_dispatched_from_zero() {
        let mut h = Harness::new(0);
        h.accept_all(&[2]);
        assert!(h.timer.fire());
        assert_eq!(h.timeouts(), vec![None]);
    }

    #[test]
    fn test_filled_gap_rearms_for_next_gap() {
        let mut h = Harness::new(1);
        h.accept_all(&[1, 3, 4, 6]);
        assert_eq!(h.timer.schedule_count(), 1);
        h.accept_all(&[2]);
        assert_eq!(h.dispatched(), vec![1, 2, 3, 4]);
        assert!(h.timer.is_armed());
        assert_eq!(h.timer.schedule_count(), 2);
        assert!(h.timer.fire());
        assert_eq!(h.timeouts(), vec![Some(4)]);
    }

    #[test]
    fn test_timeout_disabled() {
        let mut h = Harness::new(1);
        h.reorderer.set_timeout_enabled(false);
        h.accept_all(&[1, 2, 3, 5]);
        assert!(!h.timer.is_armed());
        assert!(!h.timer.fire());
        assert!(h.timeouts().is_empty());
    }

    #[test]
    fn test_timeout_enabled_after_gap() {
        let mut h = Harness::new(1);
        h.reorderer.set_timeout_enabled(false);
        h.accept_all(&[1, 2, 3, 5]);
        h.reorderer.set_timeout_enabled(true);
        assert!(h.timer.is_armed());
        assert!(h.timer.fire());
        assert_eq!(h.timeouts(), vec![Some(3)]);
    }

    #[test]
    fn test_skip_drains_buffer() {
        let mut h = Harness::new(1);
        h.accept_all(&[1, 2, 3, 5, 6, 8, 7]);
        assert_eq!(h.dispatched(), vec![1, 2, 3]);
        h.reorderer.skip_to_version(5);
        assert_eq!(h.dispatched(), vec![1, 2, 3, 5, 6, 7, 8]);
        assert!(!h.timer.is_armed());
        assert!(h.timeouts().is_empty());
    }

    #[test]
    fn test_skip_discards_older_and_keeps_gap() {
        let mut h = Harness::new(1);
        h.accept_all(&[3, 4, 7]);
        h.reorderer.skip_to_version(4);
        assert_eq!(h.dispatched(), vec![4]);
        assert_eq!(h.reorderer.pending_versions(), vec![7]);
        assert!(h.timer.is_armed());
    }

    #[test]
    fn test_queue_until_skip() {
        let mut h = Harness::new(0);
        h.reorderer.queue_until_skip_to_version_is_called();
        h.accept_all(&[5, 6, 7]);
        assert!(h.dispatched().is_empty());
        assert!(!h.timer.is_armed());

        h.reorderer.skip_to_version(5);
        assert!(!h.reorderer.is_queueing_until_skip());
        assert_eq!(h.dispatched(), vec![5, 6, 7]);
        assert_eq!(h.reorderer.next_expected_version(), 8);
    }

    #[test]
    fn test_cleanup_keeps_buffer() {
        let mut h = Harness::new(1);
        h.accept_all(&[2, 3]);
        h.reorderer.cleanup();
        assert!(!h.timer.is_armed());
        assert!(!h.reorderer.is_timeout_enabled());
        assert_eq!(h.reorderer.pending_versions(), vec![2, 3]);
    }
}
