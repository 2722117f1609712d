use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use super::bus::{ChangeBus, RegistryChange};
use super::{read, write};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipTarget {
    pub pilot_name: String,
    pub ship: Option<String>,
    pub faction: Option<String>,
    pub bounty: u64,
    /// Pilot is wanted in the current jurisdiction.
    pub wanted: bool,
    pub targeted_at: DateTime<Utc>,
}

/// Recently targeted ships keyed by pilot name.
///
/// Ordered by last update; past `capacity` the stalest entry is evicted.
pub struct TargetRegistry {
    entries: RwLock<VecDeque<ShipTarget>>,
    capacity: usize,
    bus: Arc<ChangeBus>,
}

impl TargetRegistry {
    pub fn new(bus: Arc<ChangeBus>, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            bus,
        }
    }

    pub fn upsert(&self, target: ShipTarget) {
        {
            let mut entries = write(&self.entries);
            entries.retain(|existing| existing.pilot_name != target.pilot_name);
            entries.push_back(target);
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }
        self.bus.publish(RegistryChange::Targets);
    }

    pub fn remove(&self, pilot_name: &str) -> bool {
        let removed = {
            let mut entries = write(&self.entries);
            let before = entries.len();
            entries.retain(|existing| existing.pilot_name != pilot_name);
            entries.len() != before
        };
        if removed {
            self.bus.publish(RegistryChange::Targets);
        }
        removed
    }

    pub fn get(&self, pilot_name: &str) -> Option<ShipTarget> {
        read(&self.entries)
            .iter()
            .find(|target| target.pilot_name == pilot_name)
            .cloned()
    }

    /// Targets, most recently updated last.
    pub fn snapshot(&self) -> Vec<ShipTarget> {
        read(&self.entries).iter().cloned().collect()
    }

    pub fn clear(&self) {
        write(&self.entries).clear();
        self.bus.publish(RegistryChange::Targets);
    }
}
