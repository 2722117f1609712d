use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};

use super::bus::{ChangeBus, RegistryChange};
use super::{read, write};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommanderStatus {
    pub player_id: Option<String>,
    pub name: Option<String>,
    pub system: Option<String>,
    pub station: Option<String>,
    pub online: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Singleton status of the player, mutated by identity and location events.
pub struct CommanderRegistry {
    status: RwLock<CommanderStatus>,
    bus: Arc<ChangeBus>,
}

impl CommanderRegistry {
    pub fn new(bus: Arc<ChangeBus>) -> Self {
        Self {
            status: RwLock::new(CommanderStatus::default()),
            bus,
        }
    }

    pub fn snapshot(&self) -> CommanderStatus {
        read(&self.status).clone()
    }

    pub fn player_id(&self) -> Option<String> {
        read(&self.status).player_id.clone()
    }

    pub fn current_system(&self) -> Option<String> {
        read(&self.status).system.clone()
    }

    pub fn set_identity(&self, player_id: &str, name: Option<&str>, at: DateTime<Utc>) {
        self.update(at, |status| {
            if status.player_id.as_deref() != Some(player_id) {
                // A different player: whatever we knew about location is theirs.
                status.system = None;
                status.station = None;
            }
            status.player_id = Some(player_id.to_string());
            if let Some(name) = name {
                status.name = Some(name.to_string());
            }
            status.online = true;
        });
    }

    pub fn set_online(&self, online: bool, at: DateTime<Utc>) {
        self.update(at, |status| status.online = online);
    }

    /// Records a system arrival. `station` is only known when the arrival
    /// happens docked; otherwise the station is cleared.
    pub fn set_location(&self, system: &str, station: Option<&str>, at: DateTime<Utc>) {
        self.update(at, |status| {
            status.system = Some(system.to_string());
            status.station = station.map(str::to_string);
        });
    }

    pub fn set_station(&self, station: Option<&str>, at: DateTime<Utc>) {
        self.update(at, |status| status.station = station.map(str::to_string));
    }

    pub fn clear(&self) {
        *write(&self.status) = CommanderStatus::default();
        self.bus.publish(RegistryChange::Commander);
    }

    fn update(&self, at: DateTime<Utc>, apply: impl FnOnce(&mut CommanderStatus)) {
        let changed = {
            let mut status = write(&self.status);
            let before = status.clone();
            apply(&mut status);
            let changed = *status != before;
            status.updated_at = Some(at);
            changed
        };
        if changed {
            self.bus.publish(RegistryChange::Commander);
        }
    }
}
