//! `vigild run` — host the engine until Ctrl-C.

use anyhow::{Context, Result};
use tracing::info;
use vigil_core::{AppState, VigilConfig};
use vigil_health::Vigil;

pub async fn run(config: &VigilConfig) -> Result<()> {
    config
        .ensure_state_dir()
        .with_context(|| format!("creating state directory {}", config.state.dir.display()))?;

    let vigil = Vigil::from_config(config);
    info!(
        dir = ?config.state.dir,
        dynamic_ha = config.ha.dynamic,
        pause_ms = config.pause().as_millis() as u64,
        "vigil starting"
    );

    vigil.start();
    vigil.set_main_app_state(AppState::Ready);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");

    let state = withdraw(&vigil).await?;
    info!(%state, "final state persisted");
    Ok(())
}

/// Stop the runner and persist a final `FAULTY` state, withdrawing the
/// usable marker so fencers stop routing here. An active override does not
/// keep the marker alive.
async fn withdraw(vigil: &Vigil) -> Result<AppState> {
    vigil.shutdown().await;
    let aggregator = vigil.aggregator().clone();
    tokio::task::spawn_blocking(move || aggregator.persist_shutdown())
        .await
        .context("persisting final state")
}
