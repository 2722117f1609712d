use flightdeck_journal::{identity_of, EventRecord};

use crate::registry::Registries;

/// `Commander` / `LoadGame`: the game (re)started for a player. A suspended
/// mining session picks up again here.
pub(super) fn on_identity(registries: &Registries, record: &EventRecord) {
    let at = record.timestamp();
    match identity_of(record) {
        Some(identity) => {
            registries
                .commander
                .set_identity(&identity.player_id, identity.name.as_deref(), at);
        }
        None => {
            tracing::debug!(event = record.event(), "Identity event without player id");
            registries.commander.set_online(true, at);
        }
    }
    registries.mining.resume(at);
}

pub(super) fn on_location(registries: &Registries, record: &EventRecord) {
    let Some(system) = record.str("StarSystem") else {
        return;
    };
    let station = if record.bool("Docked").unwrap_or(false) {
        record.str("StationName")
    } else {
        None
    };
    registries
        .commander
        .set_location(system, station, record.timestamp());
}

pub(super) fn on_fsd_jump(registries: &Registries, record: &EventRecord) {
    registries.mining.end(record.timestamp());
    on_location(registries, record);
}

pub(super) fn on_docked(registries: &Registries, record: &EventRecord) {
    let at = record.timestamp();
    registries.mining.end(at);
    match record.str("StarSystem") {
        Some(system) => registries
            .commander
            .set_location(system, record.str("StationName"), at),
        None => registries.commander.set_station(record.str("StationName"), at),
    }
}

pub(super) fn on_undocked(registries: &Registries, record: &EventRecord) {
    registries.commander.set_station(None, record.timestamp());
}

pub(super) fn on_shutdown(registries: &Registries, record: &EventRecord) {
    let at = record.timestamp();
    registries.commander.set_online(false, at);
    registries.mining.suspend(at);
}

#[cfg(test)]
mod tests {
    use crate::dispatch::Dispatcher;
    use crate::registry::Registries;
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        Dispatcher::standard(Arc::new(Registries::new(10, 10)))
    }

    #[test]
    fn tracks_identity_and_location_through_a_session() {
        let dispatcher = dispatcher();
        for line in [
            r#"{"timestamp":"2024-03-01T12:00:00Z","event":"Commander","FID":"F1","Name":"Jameson"}"#,
            r#"{"timestamp":"2024-03-01T12:00:01Z","event":"Location","StarSystem":"Lave","Docked":true,"StationName":"Lave Station"}"#,
        ] {
            dispatcher.dispatch_line(line);
        }
        let status = dispatcher.registries().commander.snapshot();
        assert_eq!(status.player_id.as_deref(), Some("F1"));
        assert_eq!(status.system.as_deref(), Some("Lave"));
        assert_eq!(status.station.as_deref(), Some("Lave Station"));
        assert!(status.online);

        dispatcher.dispatch_line(
            r#"{"timestamp":"2024-03-01T12:05:00Z","event":"Undocked","StationName":"Lave Station"}"#,
        );
        dispatcher.dispatch_line(
            r#"{"timestamp":"2024-03-01T12:10:00Z","event":"FSDJump","StarSystem":"Diso"}"#,
        );
        dispatcher.dispatch_line(
            r#"{"timestamp":"2024-03-01T12:20:00Z","event":"Docked","StarSystem":"Diso","StationName":"Shifnalport"}"#,
        );
        let docked = dispatcher.registries().commander.snapshot();
        assert_eq!(docked.system.as_deref(), Some("Diso"));
        assert_eq!(docked.station.as_deref(), Some("Shifnalport"));

        dispatcher.dispatch_line(r#"{"timestamp":"2024-03-01T12:30:00Z","event":"Shutdown"}"#);
        assert!(!dispatcher.registries().commander.snapshot().online);
    }

    #[test]
    fn undocked_location_clears_station() {
        let dispatcher = dispatcher();
        dispatcher.dispatch_line(
            r#"{"timestamp":"2024-03-01T12:00:01Z","event":"Location","StarSystem":"Lave","Docked":true,"StationName":"Lave Station"}"#,
        );
        dispatcher.dispatch_line(
            r#"{"timestamp":"2024-03-01T12:00:02Z","event":"Location","StarSystem":"Lave","Docked":false}"#,
        );
        assert!(dispatcher.registries().commander.snapshot().station.is_none());
    }
}
