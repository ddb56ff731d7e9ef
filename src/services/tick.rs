//! Fixed-rate simulation loop driving one room.

use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::{
    services::match_reporter::ReporterHandle,
    state::{
        geometry::TICK_INTERVAL,
        room::{Room, SharedRoom, TickHandle, TickOutcome},
    },
};

/// Start the tick loop of `room` if it has just become ready to play.
///
/// `room` must be the locked content of `shared`. The spawned loop blocks on
/// that same lock, so it cannot step before the caller releases it.
pub fn ensure_running(shared: &SharedRoom, room: &mut Room, reporter: &ReporterHandle) -> bool {
    if !room.should_tick() {
        return false;
    }

    let task = tokio::spawn(run(shared.clone(), reporter.clone()));
    room.attach_tick(TickHandle::new(task.abort_handle()));
    debug!(room = %room.code(), "tick loop started");
    true
}

async fn run(shared: SharedRoom, reporter: ReporterHandle) {
    let mut ticker = time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let mut room = shared.lock().await;
        if room.advance(&reporter) == TickOutcome::Concluded {
            break;
        }
    }
}
