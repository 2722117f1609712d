use flightdeck_journal::EventRecord;

use crate::registry::{DestroyedEntity, Registries, ShipTarget};

/// `Bounty`: a ship died for a bounty. Credits massacre missions, logs the
/// kill and forgets the pilot as a target.
pub(super) fn on_bounty(registries: &Registries, record: &EventRecord) {
    let victim_faction = record.str("VictimFaction");
    if let Some(faction) = victim_faction {
        let system = registries.commander.current_system();
        let credits = registries.missions.credit_kill(faction, system.as_deref());
        for credit in &credits {
            tracing::debug!(
                mission_id = credit.mission_id,
                source_faction = %credit.source_faction,
                count = credit.current_count,
                "Kill credited"
            );
        }
    }

    let pilot = record.localised("PilotName");
    let name = pilot
        .or_else(|| record.localised("Target"))
        .unwrap_or("Unknown");
    registries.destroyed.record(DestroyedEntity {
        name: name.to_string(),
        victim_faction: victim_faction.map(str::to_string),
        reward: record
            .u64("TotalReward")
            .or_else(|| record.u64("Reward"))
            .unwrap_or(0),
        destroyed_at: record.timestamp(),
    });

    if let Some(pilot) = pilot {
        registries.targets.remove(pilot);
    }
}

/// `ShipTargeted`: only a locked target scanned far enough to reveal the
/// pilot is worth keeping.
pub(super) fn on_ship_targeted(registries: &Registries, record: &EventRecord) {
    if !record.bool("TargetLocked").unwrap_or(false) {
        return;
    }
    let Some(pilot_name) = record.localised("PilotName") else {
        return;
    };
    registries.targets.upsert(ShipTarget {
        pilot_name: pilot_name.to_string(),
        ship: record.localised("Ship").map(str::to_string),
        faction: record.str("Faction").map(str::to_string),
        bounty: record.u64("Bounty").unwrap_or(0),
        wanted: record.str("LegalStatus") == Some("Wanted"),
        targeted_at: record.timestamp(),
    });
}

#[cfg(test)]
mod tests {
    use crate::dispatch::Dispatcher;
    use crate::registry::Registries;
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        Dispatcher::standard(Arc::new(Registries::new(10, 10)))
    }

    const TARGETED: &str = r#"{"timestamp":"2024-03-01T11:00:00Z","event":"ShipTargeted","TargetLocked":true,"Ship":"viper","Ship_Localised":"Viper Mk III","ScanStage":3,"PilotName":"$npc_name_decorate:#name=Kurt;","PilotName_Localised":"Kurt","PilotRank":"Competent","Faction":"Pirates","LegalStatus":"Wanted","Bounty":40000}"#;

    #[test]
    fn locked_scanned_target_is_recorded() {
        let dispatcher = dispatcher();
        dispatcher.dispatch_line(TARGETED);

        let target = dispatcher.registries().targets.get("Kurt").expect("target");
        assert_eq!(target.ship.as_deref(), Some("Viper Mk III"));
        assert_eq!(target.faction.as_deref(), Some("Pirates"));
        assert_eq!(target.bounty, 40000);
        assert!(target.wanted);
    }

    #[test]
    fn unlocked_or_unscanned_targets_are_ignored() {
        let dispatcher = dispatcher();
        dispatcher.dispatch_line(
            r#"{"timestamp":"2024-03-01T11:00:00Z","event":"ShipTargeted","TargetLocked":false}"#,
        );
        dispatcher.dispatch_line(
            r#"{"timestamp":"2024-03-01T11:00:01Z","event":"ShipTargeted","TargetLocked":true,"Ship":"viper","ScanStage":0}"#,
        );
        assert!(dispatcher.registries().targets.snapshot().is_empty());
    }

    #[test]
    fn bounty_logs_kill_and_drops_target() {
        let dispatcher = dispatcher();
        dispatcher.dispatch_line(TARGETED);
        dispatcher.dispatch_line(
            r#"{"timestamp":"2024-03-01T11:01:00Z","event":"Bounty","Rewards":[{"Faction":"Alpha","Reward":40000}],"Target":"viper","Target_Localised":"Viper Mk III","TotalReward":40000,"VictimFaction":"Pirates","PilotName":"$npc_name_decorate:#name=Kurt;","PilotName_Localised":"Kurt"}"#,
        );

        let registries = dispatcher.registries();
        assert!(registries.targets.get("Kurt").is_none());
        let destroyed = registries.destroyed.snapshot();
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0].name, "Kurt");
        assert_eq!(destroyed[0].victim_faction.as_deref(), Some("Pirates"));
        assert_eq!(destroyed[0].reward, 40000);
    }

    #[test]
    fn kill_outside_destination_system_is_not_credited() {
        let dispatcher = dispatcher();
        for line in [
            r#"{"timestamp":"2024-03-01T10:00:00Z","event":"MissionAccepted","MissionID":7,"Name":"Mission_Massacre","Faction":"Alpha","TargetFaction":"Pirates","KillCount":4,"DestinationSystem":"Lave"}"#,
            r#"{"timestamp":"2024-03-01T10:30:00Z","event":"FSDJump","StarSystem":"Diso"}"#,
            r#"{"timestamp":"2024-03-01T11:00:00Z","event":"Bounty","Target":"viper","TotalReward":100,"VictimFaction":"Pirates"}"#,
            r#"{"timestamp":"2024-03-01T11:30:00Z","event":"FSDJump","StarSystem":"lave"}"#,
            r#"{"timestamp":"2024-03-01T12:00:00Z","event":"Bounty","Target":"viper","TotalReward":100,"VictimFaction":"Pirates"}"#,
        ] {
            dispatcher.dispatch_line(line);
        }

        let mission = dispatcher.registries().missions.get(7).expect("mission 7");
        assert_eq!(mission.current_count, 1);
        assert_eq!(dispatcher.registries().destroyed.len(), 2);
    }
}
