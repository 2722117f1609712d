//! Change notification shared by every registry.
//!
//! Registries publish a [`RegistryChange`] after each mutation. While a batch
//! is open (historical replay), publishing is a no-op; closing the outermost
//! batch publishes a single [`RegistryChange::BatchCompleted`] so observers
//! re-read final state once instead of once per line.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryChange {
    Commander,
    Missions,
    Targets,
    Mining,
    Destroyed,
    /// Every registry may have changed; re-read all of them.
    BatchCompleted,
}

/// Receives change notifications on the thread that caused the change.
///
/// Observers that drive a UI marshal to their own thread.
pub trait RegistryObserver: Send + Sync {
    fn on_change(&self, change: RegistryChange);
}

impl<F> RegistryObserver for F
where
    F: Fn(RegistryChange) + Send + Sync,
{
    fn on_change(&self, change: RegistryChange) {
        self(change)
    }
}

#[derive(Default)]
pub struct ChangeBus {
    batch_depth: AtomicUsize,
    observers: RwLock<Vec<Arc<dyn RegistryObserver>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn RegistryObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    pub fn is_batch_loading(&self) -> bool {
        self.batch_depth.load(Ordering::SeqCst) > 0
    }

    /// Raises the batch flag until the returned guard drops.
    ///
    /// Guards nest; the flag lowers when the outermost one drops, including
    /// during unwinding.
    pub fn begin_batch(&self) -> BatchGuard<'_> {
        self.batch_depth.fetch_add(1, Ordering::SeqCst);
        BatchGuard { bus: self }
    }

    pub fn publish(&self, change: RegistryChange) {
        if self.is_batch_loading() {
            return;
        }
        self.deliver(change);
    }

    fn deliver(&self, change: RegistryChange) {
        // Snapshot so observers can subscribe from inside a callback.
        let observers: Vec<Arc<dyn RegistryObserver>> = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for observer in observers {
            observer.on_change(change);
        }
    }
}

pub struct BatchGuard<'a> {
    bus: &'a ChangeBus,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.bus.batch_depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.bus.deliver(RegistryChange::BatchCompleted);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Observer that records every change it sees.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub(crate) changes: Mutex<Vec<RegistryChange>>,
    }

    impl Recorder {
        pub(crate) fn taken(&self) -> Vec<RegistryChange> {
            std::mem::take(&mut *self.changes.lock().unwrap())
        }
    }

    impl RegistryObserver for Recorder {
        fn on_change(&self, change: RegistryChange) {
            self.changes.lock().unwrap().push(change);
        }
    }

    #[test]
    fn publishes_immediately_outside_batch() {
        let bus = ChangeBus::new();
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(recorder.clone());

        bus.publish(RegistryChange::Missions);
        bus.publish(RegistryChange::Targets);

        assert_eq!(
            recorder.taken(),
            vec![RegistryChange::Missions, RegistryChange::Targets]
        );
    }

    #[test]
    fn batch_suppresses_until_outermost_guard_drops() {
        let bus = ChangeBus::new();
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(recorder.clone());

        {
            let _outer = bus.begin_batch();
            bus.publish(RegistryChange::Missions);
            {
                let _inner = bus.begin_batch();
                bus.publish(RegistryChange::Mining);
            }
            assert!(bus.is_batch_loading());
            assert!(recorder.taken().is_empty());
        }

        assert!(!bus.is_batch_loading());
        assert_eq!(recorder.taken(), vec![RegistryChange::BatchCompleted]);
    }

    #[test]
    fn batch_flag_lowers_when_replay_panics() {
        let bus = ChangeBus::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _batch = bus.begin_batch();
            panic!("replay blew up");
        }));

        assert!(result.is_err());
        assert!(!bus.is_batch_loading());
    }

    #[test]
    fn closures_are_observers() {
        let bus = ChangeBus::new();
        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        bus.subscribe(Arc::new(move |_change: RegistryChange| {
            *counter.lock().unwrap() += 1;
        }));

        bus.publish(RegistryChange::Commander);
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
