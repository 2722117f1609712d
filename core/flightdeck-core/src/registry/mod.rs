//! Process-wide keyed stores rebuilt from the journal.
//!
//! Replay, the tailer thread and the watcher thread all mutate these, so each
//! store guards its data with an `RwLock` and hands out cloned snapshots.
//! Lock poisoning is recovered rather than propagated: a panicked handler
//! leaves at worst one half-applied event behind.
//!
//! # Module Structure
//!
//! - [`bus`]: change notification and the batch-loading flag
//! - [`commander`]: who is playing and where they are
//! - [`missions`]: mission lifecycle and kill attribution
//! - [`targets`]: bounded set of recently targeted ships
//! - [`destroyed`]: bounded log of ships destroyed for a bounty
//! - [`mining`]: current and retained mining sessions

pub mod bus;
pub mod commander;
pub mod destroyed;
pub mod mining;
pub mod missions;
pub mod targets;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use bus::{BatchGuard, ChangeBus, RegistryChange, RegistryObserver};
pub use commander::{CommanderRegistry, CommanderStatus};
pub use destroyed::{DestroyedEntity, DestroyedRegistry};
pub use mining::{
    MiningLocation, MiningRegistry, MiningSession, RefinedEvent, SessionEnd, SessionPhase,
    SuspensionPeriod,
};
pub use missions::{
    AnomalyKind, KillCredit, Mission, MissionAnomaly, MissionRegistry, MissionStatus,
};
pub use targets::{ShipTarget, TargetRegistry};

/// Every registry the handlers write to, sharing one [`ChangeBus`].
pub struct Registries {
    pub bus: Arc<ChangeBus>,
    pub commander: CommanderRegistry,
    pub missions: MissionRegistry,
    pub targets: TargetRegistry,
    pub destroyed: DestroyedRegistry,
    pub mining: MiningRegistry,
}

impl Registries {
    pub fn new(target_capacity: usize, destroyed_capacity: usize) -> Self {
        let bus = Arc::new(ChangeBus::new());
        Self {
            commander: CommanderRegistry::new(bus.clone()),
            missions: MissionRegistry::new(bus.clone()),
            targets: TargetRegistry::new(bus.clone(), target_capacity),
            destroyed: DestroyedRegistry::new(bus.clone(), destroyed_capacity),
            mining: MiningRegistry::new(bus.clone()),
            bus,
        }
    }

    /// Empties every store. Used before a full re-ingest.
    pub fn clear(&self) {
        self.commander.clear();
        self.missions.clear();
        self.targets.clear();
        self.destroyed.clear();
        self.mining.clear();
    }
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
