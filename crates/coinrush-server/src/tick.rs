use std::time::Instant;

use tokio::time::{interval, MissedTickBehavior};

use crate::state::ServerState;

/// Drive the world simulation of every open lobby at the configured tick rate.
/// Runs for as long as the server does.
pub async fn run(state: ServerState) {
    let mut ticker = interval(state.config().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!("Simulating at {} ticks per second", state.config().tick_rate);

    loop {
        let now = ticker.tick().await.into_std();
        tick_lobbies(&state, now);
    }
}

/// Queue one tick for every lobby open at this moment. Lobbies opened or closed while
/// this runs are picked up next time. Returns how many lobbies accepted the tick.
pub fn tick_lobbies(state: &ServerState, now: Instant) -> usize {
    let lobbies = state.lobby_handle_providers();
    let total = lobbies.len();
    let accepted = lobbies.iter().filter(|lobby| lobby.tick(now)).count();
    if accepted < total {
        tracing::trace!("{} of {total} lobbies missed a tick", total - accepted);
    }
    accepted
}
