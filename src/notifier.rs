use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, error};

/// Returned by an observer that could not handle an update.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Called with `true` after a successful pipeline run, `false` after a failed one.
pub type Observer = Arc<dyn Fn(bool) -> Result<(), ObserverError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReport {
    pub notified: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    list: Vec<(SubscriptionId, Observer)>,
}

/// Fans out pipeline results to registered observers, in subscription order.
/// A failing or panicking observer never affects the others or the caller.
#[derive(Default)]
pub struct UpdateNotifier {
    subscribers: Mutex<Subscribers>,
}

impl UpdateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(bool) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        let mut subs = self.lock();
        subs.next_id += 1;
        let id = SubscriptionId(subs.next_id);
        subs.list.push((id, observer));
        debug!(id = id.0, total = subs.list.len(), "Observer subscribed");
        id
    }

    /// False if `id` was not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.lock();
        let before = subs.list.len();
        subs.list.retain(|(sid, _)| *sid != id);
        subs.list.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().list.len()
    }

    pub fn publish(&self, success: bool) -> PublishReport {
        // Observers run outside the lock so they may (un)subscribe themselves.
        let snapshot: Vec<(SubscriptionId, Observer)> = self.lock().list.clone();
        let mut report = PublishReport::default();

        for (id, observer) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| observer(success))) {
                Ok(Ok(())) => report.notified += 1,
                Ok(Err(e)) => {
                    error!(id = id.0, success, "Observer failed: {e}");
                    report.failed += 1;
                }
                Err(_) => {
                    error!(id = id.0, success, "Observer panicked");
                    report.failed += 1;
                }
            }
        }

        debug!(notified = report.notified, failed = report.failed, success, "Published update");
        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        // A poisoned list is still a valid list; observers never run under this lock.
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(bool) -> Result<(), ObserverError> + Send + Sync) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        (hits, move |_: bool| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok::<(), ObserverError>(())
        })
    }

    #[test]
    fn failing_observer_does_not_block_others() {
        let notifier = UpdateNotifier::new();
        notifier.subscribe(|_| Err(ObserverError::new("widget gone")));
        let (hits, ok) = counter();
        notifier.subscribe(ok);

        let report = notifier.publish(true);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(report, PublishReport { notified: 1, failed: 1 });
    }

    #[test]
    fn panicking_observer_is_contained() {
        let notifier = UpdateNotifier::new();
        notifier.subscribe(|_| panic!("observer bug"));
        let (hits, ok) = counter();
        notifier.subscribe(ok);

        let report = notifier.publish(false);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn observers_receive_the_outcome_in_order() {
        let notifier = UpdateNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            notifier.subscribe(move |success| {
                seen.lock().unwrap().push((tag, success));
                Ok(())
            });
        }
        notifier.publish(false);
        assert_eq!(*seen.lock().unwrap(), vec![("a", false), ("b", false), ("c", false)]);
    }

    #[test]
    fn unsubscribe_removes_only_that_observer() {
        let notifier = UpdateNotifier::new();
        let (hits_a, a) = counter();
        let (hits_b, b) = counter();
        let id_a = notifier.subscribe(a);
        notifier.subscribe(b);

        assert!(notifier.unsubscribe(id_a));
        assert!(!notifier.unsubscribe(id_a));
        assert_eq!(notifier.subscriber_count(), 1);

        notifier.publish(true);
        assert_eq!(hits_a.load(Ordering::SeqCst), 0);
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observer_may_resubscribe_during_publish() {
        let notifier = Arc::new(UpdateNotifier::new());
        let own_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let (late_hits, late) = counter();
        let late = Arc::new(Mutex::new(Some(late)));

        let id = {
            let inner = Arc::clone(&notifier);
            let own_id = Arc::clone(&own_id);
            let late = Arc::clone(&late);
            notifier.subscribe(move |_| {
                if let Some(id) = own_id.lock().unwrap().take() {
                    inner.unsubscribe(id);
                }
                if let Some(observer) = late.lock().unwrap().take() {
                    inner.subscribe(observer);
                }
                Ok(())
            })
        };
        *own_id.lock().unwrap() = Some(id);
        let (hits, next) = counter();
        notifier.subscribe(next);

        let report = notifier.publish(true);
        assert_eq!(report, PublishReport { notified: 2, failed: 0 });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0, "joined after the snapshot");
        assert_eq!(notifier.subscriber_count(), 2);

        notifier.publish(true);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn publish_with_no_observers_is_a_no_op() {
        assert_eq!(UpdateNotifier::new().publish(true), PublishReport::default());
    }

    #[test]
    fn publish_from_many_threads() {
        let notifier = Arc::new(UpdateNotifier::new());
        let (hits, ok) = counter();
        notifier.subscribe(ok);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let n = Arc::clone(&notifier);
                std::thread::spawn(move || n.publish(true))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 8);
    }
}
