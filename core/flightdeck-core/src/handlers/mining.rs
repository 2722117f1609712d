use flightdeck_journal::EventRecord;

use crate::registry::{MiningLocation, Registries};

const RING_BODY_TYPE: &str = "PlanetaryRing";

/// Dropping out of supercruise at a ring is where mining starts.
pub(super) fn on_supercruise_exit(registries: &Registries, record: &EventRecord) {
    if record.str("BodyType") != Some(RING_BODY_TYPE) {
        return;
    }
    let Some(ring) = record.str("Body") else {
        return;
    };
    let system = record
        .str("StarSystem")
        .map(str::to_string)
        .or_else(|| registries.commander.current_system());
    let location = MiningLocation::at_ring(system.as_deref(), ring);
    let session_id = registries.mining.start(location, record.timestamp());
    tracing::debug!(session_id, ring, "Mining session at ring");
}

pub(super) fn on_prospected(registries: &Registries, record: &EventRecord) {
    registries.mining.record_prospected(record.timestamp());
}

pub(super) fn on_refined(registries: &Registries, record: &EventRecord) {
    let mineral = record.localised("Type").unwrap_or("Unknown");
    registries.mining.record_refined(mineral, record.timestamp());
}

pub(super) fn on_died(registries: &Registries, record: &EventRecord) {
    registries.mining.end(record.timestamp());
}
