//! Mission lifecycle and kill attribution.
//!
//! ```text
//!             ┌──► Completed
//!             ├──► Failed
//! Active ─────┼──► Expired
//!             └──► Abandoned
//! ```
//!
//! Missions are never deleted; terminal states absorb every later event.
//! `current_count` only grows and never passes `target_count`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use super::bus::{ChangeBus, RegistryChange};
use super::{read, write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Active,
    Completed,
    Failed,
    Expired,
    Abandoned,
}

impl MissionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MissionStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Active => "active",
            MissionStatus::Completed => "completed",
            MissionStatus::Failed => "failed",
            MissionStatus::Expired => "expired",
            MissionStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mission {
    pub id: u64,
    pub name: String,
    pub status: MissionStatus,
    pub source_faction: String,
    pub target_faction: Option<String>,
    pub destination_system: Option<String>,
    pub target_count: u32,
    pub current_count: u32,
    pub accepted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub wing: bool,
    pub reward: Option<u64>,
}

impl Mission {
    pub fn remaining(&self) -> u32 {
        self.target_count.saturating_sub(self.current_count)
    }

    pub fn is_active(&self) -> bool {
        self.status == MissionStatus::Active
    }

    fn accepts_kill(&self, victim_faction: &str, current_system: Option<&str>) -> bool {
        if !self.is_active() || self.remaining() == 0 {
            return false;
        }
        if self.target_faction.as_deref() != Some(victim_faction) {
            return false;
        }
        match (self.destination_system.as_deref(), current_system) {
            (Some(destination), Some(current)) => destination.eq_ignore_ascii_case(current),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// The game redirected the mission home before we counted enough kills.
    RedirectedBeforeTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionAnomaly {
    pub mission_id: u64,
    pub kind: AnomalyKind,
    pub observed_count: u32,
    pub target_count: u32,
    pub at: DateTime<Utc>,
}

/// One mission advanced by a kill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillCredit {
    pub mission_id: u64,
    pub source_faction: String,
    pub current_count: u32,
}

#[derive(Default)]
struct MissionState {
    missions: HashMap<u64, Mission>,
    anomalies: Vec<MissionAnomaly>,
}

pub struct MissionRegistry {
    state: RwLock<MissionState>,
    bus: Arc<ChangeBus>,
}

impl MissionRegistry {
    pub fn new(bus: Arc<ChangeBus>) -> Self {
        Self {
            state: RwLock::new(MissionState::default()),
            bus,
        }
    }

    /// Adds a newly accepted mission. Returns false if the id is already known.
    pub fn accept(&self, mission: Mission) -> bool {
        let inserted = {
            let mut state = write(&self.state);
            if state.missions.contains_key(&mission.id) {
                false
            } else {
                state.missions.insert(mission.id, mission);
                true
            }
        };
        if inserted {
            self.bus.publish(RegistryChange::Missions);
        }
        inserted
    }

    /// Raises the count to `count`, clamped to the target. Never lowers it.
    pub fn apply_progress(&self, mission_id: u64, count: u32) -> Option<u32> {
        let (updated, changed) = {
            let mut state = write(&self.state);
            let mission = state
                .missions
                .get_mut(&mission_id)
                .filter(|mission| mission.is_active())?;
            let next = count.min(mission.target_count).max(mission.current_count);
            let changed = next != mission.current_count;
            mission.current_count = next;
            (next, changed)
        };
        if changed {
            self.bus.publish(RegistryChange::Missions);
        }
        Some(updated)
    }

    /// Attributes one kill of a `victim_faction` ship.
    ///
    /// Every source faction with an eligible mission advances exactly one of
    /// its missions: the one accepted earliest. Selection and increment
    /// happen under one write lock so concurrent kills cannot both claim the
    /// last slot of a mission.
    pub fn credit_kill(&self, victim_faction: &str, current_system: Option<&str>) -> Vec<KillCredit> {
        let credits = {
            let mut state = write(&self.state);

            let mut oldest_by_source: BTreeMap<&str, (DateTime<Utc>, u64)> = BTreeMap::new();
            for mission in state.missions.values() {
                if !mission.accepts_kill(victim_faction, current_system) {
                    continue;
                }
                let candidate = (mission.accepted_at, mission.id);
                oldest_by_source
                    .entry(mission.source_faction.as_str())
                    .and_modify(|best| {
                        if candidate < *best {
                            *best = candidate;
                        }
                    })
                    .or_insert(candidate);
            }

            let chosen: Vec<u64> = oldest_by_source.values().map(|(_, id)| *id).collect();
            let mut credits = Vec::with_capacity(chosen.len());
            for id in chosen {
                if let Some(mission) = state.missions.get_mut(&id) {
                    mission.current_count = (mission.current_count + 1).min(mission.target_count);
                    credits.push(KillCredit {
                        mission_id: id,
                        source_faction: mission.source_faction.clone(),
                        current_count: mission.current_count,
                    });
                }
            }
            credits
        };
        if !credits.is_empty() {
            self.bus.publish(RegistryChange::Missions);
        }
        credits
    }

    /// Completion forces the count to target.
    pub fn complete(&self, mission_id: u64) -> bool {
        self.terminate(mission_id, MissionStatus::Completed)
    }

    pub fn fail(&self, mission_id: u64) -> bool {
        self.terminate(mission_id, MissionStatus::Failed)
    }

    pub fn abandon(&self, mission_id: u64) -> bool {
        self.terminate(mission_id, MissionStatus::Abandoned)
    }

    pub fn expire(&self, mission_id: u64) -> bool {
        self.terminate(mission_id, MissionStatus::Expired)
    }

    /// Expires every Active mission whose expiry is at or before `now`.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Vec<u64> {
        let mut expired = {
            let mut state = write(&self.state);
            let mut expired = Vec::new();
            for mission in state.missions.values_mut() {
                let overdue = mission.expires_at.is_some_and(|expiry| expiry <= now);
                if mission.is_active() && overdue {
                    mission.status = MissionStatus::Expired;
                    expired.push(mission.id);
                }
            }
            expired
        };
        if !expired.is_empty() {
            self.bus.publish(RegistryChange::Missions);
        }
        expired.sort_unstable();
        expired
    }

    /// Repairs an Active mission the game says is done but whose count
    /// falls short. Returns the recorded anomaly, if any.
    pub fn repair_redirected(&self, mission_id: u64, at: DateTime<Utc>) -> Option<MissionAnomaly> {
        let anomaly = {
            let mut state = write(&self.state);
            let mission = state
                .missions
                .get_mut(&mission_id)
                .filter(|mission| mission.is_active() && mission.remaining() > 0)?;
            let anomaly = MissionAnomaly {
                mission_id,
                kind: AnomalyKind::RedirectedBeforeTarget,
                observed_count: mission.current_count,
                target_count: mission.target_count,
                at,
            };
            mission.current_count = mission.target_count;
            state.anomalies.push(anomaly.clone());
            anomaly
        };
        self.bus.publish(RegistryChange::Missions);
        Some(anomaly)
    }

    pub fn get(&self, mission_id: u64) -> Option<Mission> {
        read(&self.state).missions.get(&mission_id).cloned()
    }

    /// All missions, oldest acceptance first.
    pub fn snapshot(&self) -> Vec<Mission> {
        let mut missions: Vec<Mission> = read(&self.state).missions.values().cloned().collect();
        missions.sort_by(|a, b| a.accepted_at.cmp(&b.accepted_at).then(a.id.cmp(&b.id)));
        missions
    }

    pub fn active(&self) -> Vec<Mission> {
        self.snapshot()
            .into_iter()
            .filter(Mission::is_active)
            .collect()
    }

    pub fn anomalies(&self) -> Vec<MissionAnomaly> {
        read(&self.state).anomalies.clone()
    }

    pub fn clear(&self) {
        *write(&self.state) = MissionState::default();
        self.bus.publish(RegistryChange::Missions);
    }

    fn terminate(&self, mission_id: u64, status: MissionStatus) -> bool {
        let changed = {
            let mut state = write(&self.state);
            match state.missions.get_mut(&mission_id) {
                Some(mission) if mission.is_active() => {
                    mission.status = status;
                    if status == MissionStatus::Completed {
                        mission.current_count = mission.target_count;
                    }
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.bus.publish(RegistryChange::Missions);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn mission(id: u64, source: &str, target: u32, accepted_minute: i64) -> Mission {
        Mission {
            id,
            name: format!("Massacre {}", id),
            status: MissionStatus::Active,
            source_faction: source.to_string(),
            target_faction: Some("Pirates".to_string()),
            destination_system: Some("Sol".to_string()),
            target_count: target,
            current_count: 0,
            accepted_at: at(accepted_minute),
            expires_at: Some(at(accepted_minute + 60)),
            wing: false,
            reward: Some(1_000_000),
        }
    }

    fn registry() -> MissionRegistry {
        MissionRegistry::new(Arc::new(ChangeBus::new()))
    }

    #[test]
    fn accept_ignores_duplicate_ids() {
        let registry = registry();
        assert!(registry.accept(mission(1, "Alpha", 5, 0)));
        let mut again = mission(1, "Alpha", 9, 1);
        again.current_count = 3;
        assert!(!registry.accept(again));
        assert_eq!(registry.get(1).expect("mission").target_count, 5);
    }

    #[test]
    fn kill_credits_oldest_mission_per_source_faction() {
        let registry = registry();
        registry.accept(mission(1, "Alpha", 2, 10));
        registry.accept(mission(2, "Alpha", 2, 5));
        registry.accept(mission(3, "Beta", 2, 20));

        let credits = registry.credit_kill("Pirates", Some("Sol"));

        let mut credited: Vec<u64> = credits.iter().map(|c| c.mission_id).collect();
        credited.sort_unstable();
        assert_eq!(credited, vec![2, 3]);
        assert_eq!(registry.get(1).expect("m1").current_count, 0);
        assert_eq!(registry.get(2).expect("m2").current_count, 1);
        assert_eq!(registry.get(3).expect("m3").current_count, 1);
    }

    #[test]
    fn kill_moves_to_next_mission_once_oldest_is_full() {
        let registry = registry();
        registry.accept(mission(1, "Alpha", 1, 0));
        registry.accept(mission(2, "Alpha", 2, 1));

        for _ in 0..5 {
            registry.credit_kill("Pirates", Some("Sol"));
        }

        let m1 = registry.get(1).expect("m1");
        let m2 = registry.get(2).expect("m2");
        assert_eq!((m1.current_count, m1.target_count), (1, 1));
        assert_eq!((m2.current_count, m2.target_count), (2, 2));
        assert!(m1.is_active() && m2.is_active());
    }

    #[test]
    fn kill_requires_matching_faction_and_system() {
        let registry = registry();
        registry.accept(mission(1, "Alpha", 3, 0));

        assert!(registry.credit_kill("Traders", Some("Sol")).is_empty());
        assert!(registry.credit_kill("Pirates", Some("Lave")).is_empty());
        assert_eq!(registry.credit_kill("Pirates", Some("sol")).len(), 1);
        // Unknown location does not block attribution.
        assert_eq!(registry.credit_kill("Pirates", None).len(), 1);
        assert_eq!(registry.get(1).expect("m1").current_count, 2);
    }

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let registry = registry();
        registry.accept(mission(1, "Alpha", 4, 0));

        assert_eq!(registry.apply_progress(1, 3), Some(3));
        assert_eq!(registry.apply_progress(1, 1), Some(3));
        assert_eq!(registry.apply_progress(1, 40), Some(4));
        assert_eq!(registry.apply_progress(99, 1), None);
    }

    #[test]
    fn terminal_states_absorb_later_events() {
        let registry = registry();
        registry.accept(mission(1, "Alpha", 4, 0));
        registry.accept(mission(2, "Alpha", 4, 1));

        assert!(registry.complete(1));
        assert!(registry.abandon(2));
        assert!(!registry.fail(1));
        assert!(registry.credit_kill("Pirates", Some("Sol")).is_empty());

        let completed = registry.get(1).expect("m1");
        assert_eq!(completed.status, MissionStatus::Completed);
        assert_eq!(completed.current_count, 4);
        assert_eq!(registry.get(2).expect("m2").status, MissionStatus::Abandoned);
        assert!(registry.active().is_empty());
    }

    #[test]
    fn expire_overdue_only_touches_active_missions() {
        let registry = registry();
        registry.accept(mission(1, "Alpha", 4, 0));
        registry.accept(mission(2, "Alpha", 4, 30));
        registry.accept(mission(3, "Alpha", 4, 0));
        registry.complete(3);

        assert_eq!(registry.expire_overdue(at(60)), vec![1]);
        assert_eq!(registry.get(1).expect("m1").status, MissionStatus::Expired);
        assert_eq!(registry.get(2).expect("m2").status, MissionStatus::Active);
        assert_eq!(registry.get(3).expect("m3").status, MissionStatus::Completed);
    }

    #[test]
    fn redirect_repairs_short_count_and_records_anomaly() {
        let registry = registry();
        registry.accept(mission(1, "Alpha", 4, 0));
        registry.credit_kill("Pirates", Some("Sol"));

        let anomaly = registry.repair_redirected(1, at(5)).expect("anomaly");
        assert_eq!(anomaly.observed_count, 1);
        assert_eq!(anomaly.target_count, 4);

        let repaired = registry.get(1).expect("m1");
        assert_eq!(repaired.current_count, 4);
        assert!(repaired.is_active());
        assert_eq!(registry.anomalies(), vec![anomaly]);

        // Already at target: nothing to repair.
        assert!(registry.repair_redirected(1, at(6)).is_none());
        assert_eq!(registry.anomalies().len(), 1);
    }
}
