use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use super::bus::{ChangeBus, RegistryChange};
use super::{read, write};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestroyedEntity {
    pub name: String,
    pub victim_faction: Option<String>,
    pub reward: u64,
    pub destroyed_at: DateTime<Utc>,
}

/// Bounded log of ships destroyed for a bounty, oldest first.
pub struct DestroyedRegistry {
    entries: RwLock<VecDeque<DestroyedEntity>>,
    capacity: usize,
    bus: Arc<ChangeBus>,
}

impl DestroyedRegistry {
    pub fn new(bus: Arc<ChangeBus>, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
            bus,
        }
    }

    pub fn record(&self, entity: DestroyedEntity) {
        {
            let mut entries = write(&self.entries);
            entries.push_back(entity);
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }
        self.bus.publish(RegistryChange::Destroyed);
    }

    pub fn snapshot(&self) -> Vec<DestroyedEntity> {
        read(&self.entries).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }

    /// Sum of rewards still in the log.
    pub fn total_reward(&self) -> u64 {
        read(&self.entries).iter().map(|entity| entity.reward).sum()
    }

    pub fn clear(&self) {
        write(&self.entries).clear();
        self.bus.publish(RegistryChange::Destroyed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn keeps_newest_entries_in_order() {
        let registry = DestroyedRegistry::new(Arc::new(ChangeBus::new()), 2);
        for (index, name) in ["A", "B", "C"].into_iter().enumerate() {
            registry.record(DestroyedEntity {
                name: name.to_string(),
                victim_faction: None,
                reward: 10 * (index as u64 + 1),
                destroyed_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, index as u32).unwrap(),
            });
        }

        let names: Vec<String> = registry.snapshot().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert_eq!(registry.total_reward(), 50);
    }
}
