use flightdeck_journal::EventRecord;

use super::count;
use crate::registry::{Mission, MissionStatus, Registries};

pub(super) fn on_accepted(registries: &Registries, record: &EventRecord) {
    let Some(id) = record.u64("MissionID") else {
        tracing::debug!("MissionAccepted without MissionID");
        return;
    };
    let name = record
        .str("LocalisedName")
        .or_else(|| record.str("Name"))
        .unwrap_or("Unknown mission");
    let mission = Mission {
        id,
        name: name.to_string(),
        status: MissionStatus::Active,
        source_faction: record.str("Faction").unwrap_or_default().to_string(),
        target_faction: record.str("TargetFaction").map(str::to_string),
        destination_system: record.str("DestinationSystem").map(str::to_string),
        target_count: record.u64("KillCount").map(count).unwrap_or(0),
        current_count: 0,
        accepted_at: record.timestamp(),
        expires_at: record.time("Expiry"),
        wing: record.bool("Wing").unwrap_or(false),
        reward: record.u64("Reward"),
    };
    if !registries.missions.accept(mission) {
        tracing::debug!(mission_id = id, "Mission already known; ignoring re-accept");
    }
}

pub(super) fn on_progress(registries: &Registries, record: &EventRecord) {
    let (Some(id), Some(progress)) = (record.u64("MissionID"), record.u64("Count")) else {
        return;
    };
    registries.missions.apply_progress(id, count(progress));
}

pub(super) fn on_redirected(registries: &Registries, record: &EventRecord) {
    let Some(id) = record.u64("MissionID") else {
        return;
    };
    if let Some(anomaly) = registries.missions.repair_redirected(id, record.timestamp()) {
        tracing::warn!(
            mission_id = anomaly.mission_id,
            observed = anomaly.observed_count,
            target = anomaly.target_count,
            "Mission redirected before all kills were counted; forcing count to target"
        );
    }
}

pub(super) fn on_completed(registries: &Registries, record: &EventRecord) {
    if let Some(id) = record.u64("MissionID") {
        registries.missions.complete(id);
    }
}

pub(super) fn on_failed(registries: &Registries, record: &EventRecord) {
    if let Some(id) = record.u64("MissionID") {
        registries.missions.fail(id);
    }
}

pub(super) fn on_abandoned(registries: &Registries, record: &EventRecord) {
    if let Some(id) = record.u64("MissionID") {
        registries.missions.abandon(id);
    }
}

pub(super) fn on_expired(registries: &Registries, record: &EventRecord) {
    if let Some(id) = record.u64("MissionID") {
        registries.missions.expire(id);
    }
}

/// The game lists missions at login; anything of ours past its expiry by
/// then has expired.
pub(super) fn on_missions_snapshot(registries: &Registries, record: &EventRecord) {
    let expired = registries.missions.expire_overdue(record.timestamp());
    if !expired.is_empty() {
        tracing::debug!(count = expired.len(), "Expired overdue missions");
    }
}

#[cfg(test)]
mod tests {
    use crate::dispatch::Dispatcher;
    use crate::registry::{AnomalyKind, MissionStatus, Registries};
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        Dispatcher::standard(Arc::new(Registries::new(10, 10)))
    }

    fn feed(dispatcher: &Dispatcher, lines: &[&str]) {
        for line in lines {
            assert!(dispatcher.dispatch_line(line), "line should parse: {}", line);
        }
    }

    const ACCEPT_1: &str = r#"{"timestamp":"2024-03-01T10:00:00Z","event":"MissionAccepted","MissionID":1,"Name":"Mission_Massacre","LocalisedName":"Kill Pirates","Faction":"Alpha","TargetFaction":"Pirates","KillCount":3,"Expiry":"2024-03-02T10:00:00Z","Wing":false,"Reward":1000000}"#;
    const ACCEPT_2: &str = r#"{"timestamp":"2024-03-01T10:05:00Z","event":"MissionAccepted","MissionID":2,"Name":"Mission_Massacre","Faction":"Alpha","TargetFaction":"Pirates","KillCount":2}"#;
    const ACCEPT_3: &str = r#"{"timestamp":"2024-03-01T10:10:00Z","event":"MissionAccepted","MissionID":3,"Name":"Mission_Massacre","Faction":"Beta","TargetFaction":"Pirates","KillCount":2}"#;

    fn bounty(second: u32) -> String {
        format!(
            r#"{{"timestamp":"2024-03-01T11:00:{:02}Z","event":"Bounty","Target":"viper","PilotName_Localised":"Pilot {}","VictimFaction":"Pirates","TotalReward":5000}}"#,
            second, second
        )
    }

    #[test]
    fn accepted_mission_is_active_with_fields() {
        let dispatcher = dispatcher();
        feed(&dispatcher, &[ACCEPT_1]);

        let mission = dispatcher.registries().missions.get(1).expect("mission 1");
        assert_eq!(mission.name, "Kill Pirates");
        assert_eq!(mission.status, MissionStatus::Active);
        assert_eq!(mission.source_faction, "Alpha");
        assert_eq!(mission.target_faction.as_deref(), Some("Pirates"));
        assert_eq!(mission.target_count, 3);
        assert_eq!(mission.reward, Some(1_000_000));
        assert!(mission.expires_at.is_some());
    }

    #[test]
    fn kills_fill_oldest_mission_per_source_faction() {
        let dispatcher = dispatcher();
        feed(&dispatcher, &[ACCEPT_1, ACCEPT_2, ACCEPT_3]);

        for second in 0..4 {
            dispatcher.dispatch_line(&bounty(second));
        }

        let missions = &dispatcher.registries().missions;
        // Alpha: mission 1 fills (3) before mission 2 gets the fourth kill.
        assert_eq!(missions.get(1).expect("1").current_count, 3);
        assert_eq!(missions.get(2).expect("2").current_count, 1);
        // Beta stacks independently and caps at its target.
        assert_eq!(missions.get(3).expect("3").current_count, 2);
    }

    #[test]
    fn progress_never_decreases_or_overshoots() {
        let dispatcher = dispatcher();
        feed(&dispatcher, &[ACCEPT_1]);
        feed(
            &dispatcher,
            &[
                r#"{"timestamp":"2024-03-01T11:00:00Z","event":"MissionProgress","MissionID":1,"Count":2}"#,
                r#"{"timestamp":"2024-03-01T11:01:00Z","event":"MissionProgress","MissionID":1,"Count":1}"#,
            ],
        );
        assert_eq!(dispatcher.registries().missions.get(1).expect("1").current_count, 2);

        feed(
            &dispatcher,
            &[r#"{"timestamp":"2024-03-01T11:02:00Z","event":"MissionProgress","MissionID":1,"Count":9}"#],
        );
        assert_eq!(dispatcher.registries().missions.get(1).expect("1").current_count, 3);
    }

    #[test]
    fn redirect_short_of_target_records_anomaly() {
        let dispatcher = dispatcher();
        feed(&dispatcher, &[ACCEPT_1]);
        dispatcher.dispatch_line(&bounty(0));
        feed(
            &dispatcher,
            &[r#"{"timestamp":"2024-03-01T12:00:00Z","event":"MissionRedirected","MissionID":1,"NewDestinationSystem":"Lave"}"#],
        );

        let missions = &dispatcher.registries().missions;
        let mission = missions.get(1).expect("1");
        assert_eq!(mission.current_count, 3);
        assert_eq!(mission.status, MissionStatus::Active);

        let anomalies = missions.anomalies();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::RedirectedBeforeTarget);
        assert_eq!(anomalies[0].observed_count, 1);
    }

    #[test]
    fn redirect_at_target_changes_nothing() {
        let dispatcher = dispatcher();
        feed(&dispatcher, &[ACCEPT_2]);
        dispatcher.dispatch_line(&bounty(0));
        dispatcher.dispatch_line(&bounty(1));
        feed(
            &dispatcher,
            &[r#"{"timestamp":"2024-03-01T12:00:00Z","event":"MissionRedirected","MissionID":2}"#],
        );
        assert!(dispatcher.registries().missions.anomalies().is_empty());
    }

    #[test]
    fn terminal_transitions_absorb_later_events() {
        let dispatcher = dispatcher();
        feed(
            &dispatcher,
            &[
                ACCEPT_1,
                ACCEPT_2,
                ACCEPT_3,
                r#"{"timestamp":"2024-03-01T12:00:00Z","event":"MissionCompleted","MissionID":1}"#,
                r#"{"timestamp":"2024-03-01T12:01:00Z","event":"MissionFailed","MissionID":2}"#,
                r#"{"timestamp":"2024-03-01T12:02:00Z","event":"MissionAbandoned","MissionID":3}"#,
                r#"{"timestamp":"2024-03-01T12:03:00Z","event":"MissionFailed","MissionID":1}"#,
            ],
        );

        let missions = &dispatcher.registries().missions;
        let completed = missions.get(1).expect("1");
        assert_eq!(completed.status, MissionStatus::Completed);
        assert_eq!(completed.current_count, completed.target_count);
        assert_eq!(missions.get(2).expect("2").status, MissionStatus::Failed);
        assert_eq!(missions.get(3).expect("3").status, MissionStatus::Abandoned);
    }

    #[test]
    fn missions_snapshot_expires_overdue_missions() {
        let dispatcher = dispatcher();
        feed(
            &dispatcher,
            &[
                ACCEPT_1,
                ACCEPT_2,
                r#"{"timestamp":"2024-03-02T10:00:00Z","event":"Missions","Active":[],"Failed":[],"Complete":[]}"#,
            ],
        );

        let missions = &dispatcher.registries().missions;
        assert_eq!(missions.get(1).expect("1").status, MissionStatus::Expired);
        // No expiry recorded, so it stays active.
        assert_eq!(missions.get(2).expect("2").status, MissionStatus::Active);

        feed(
            &dispatcher,
            &[r#"{"timestamp":"2024-03-02T11:00:00Z","event":"MissionExpired","MissionID":2}"#],
        );
        assert_eq!(missions.get(2).expect("2").status, MissionStatus::Expired);
    }
}
