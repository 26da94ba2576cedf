//! Background tasks started by the binary.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::app_state::AppState;
use crate::obs::resources;

/// Re-scan the model directory every `every`.
pub fn spawn_refresh_loop(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick fires immediately; the startup scan already ran
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = state.refresh_models().await {
                tracing::error!(error = %e, "periodic model refresh failed");
            }
        }
    })
}

/// Start every task enabled in the config.
pub fn spawn_all(state: &AppState) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    let refresh_ms = state.cfg().registry.refresh_interval_ms;
    if refresh_ms > 0 {
        tasks.push(spawn_refresh_loop(state.clone(), Duration::from_millis(refresh_ms)));
    }

    let sample_ms = state.cfg().metrics.resource_sample_interval_ms;
    if sample_ms > 0 {
        tasks.push(resources::spawn_sampler(state.clone(), Duration::from_millis(sample_ms)));
    }

    tasks
}
