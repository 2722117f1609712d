//! State-machine handlers, one per journal event.
//!
//! Each handler reads what it needs from the record and applies it to one or
//! a few registries. Missing fields make a handler do nothing rather than
//! guess; the journal is written by a game, not by us.

mod combat;
mod commander;
mod mining;
mod missions;

use crate::dispatch::Dispatcher;

pub(crate) fn register_all(dispatcher: &mut Dispatcher) {
    dispatcher
        .register("Commander", commander::on_identity)
        .register("LoadGame", commander::on_identity)
        .register("Location", commander::on_location)
        .register("FSDJump", commander::on_fsd_jump)
        .register("Docked", commander::on_docked)
        .register("Undocked", commander::on_undocked)
        .register("Shutdown", commander::on_shutdown)
        .register("MissionAccepted", missions::on_accepted)
        .register("MissionProgress", missions::on_progress)
        .register("MissionRedirected", missions::on_redirected)
        .register("MissionCompleted", missions::on_completed)
        .register("MissionFailed", missions::on_failed)
        .register("MissionAbandoned", missions::on_abandoned)
        .register("MissionExpired", missions::on_expired)
        .register("Missions", missions::on_missions_snapshot)
        .register("Bounty", combat::on_bounty)
        .register("ShipTargeted", combat::on_ship_targeted)
        .register("SupercruiseExit", mining::on_supercruise_exit)
        .register("ProspectedAsteroid", mining::on_prospected)
        .register("MiningRefined", mining::on_refined)
        .register("Died", mining::on_died);
}

/// Journal integers are unsigned 64-bit; counts we keep are 32-bit.
fn count(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
