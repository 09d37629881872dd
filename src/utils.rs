// utils.rs
use super::models::AppState;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

pub fn record_session_count(state: &AppState) {
    metrics::gauge!("bridge_sessions").set(state.sessions.len() as f64);
}

pub async fn cleanup_session(session_id: Uuid, state: &AppState) -> bool {
    let removed = state.sessions.remove(&session_id).is_some();
    if removed {
        info!("Session {} closed", session_id);
    }
    record_session_count(state);
    removed
}

/// Periodically drops sessions that have been idle longer than `ttl`.
pub fn spawn_session_sweeper(state: Arc<AppState>, ttl: Duration) -> JoinHandle<()> {
    let period = (ttl / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let expired = state.sweep_idle(ttl);
            if expired > 0 {
                info!(expired, "Expired idle sessions");
                record_session_count(&state);
            }
        }
    })
}
