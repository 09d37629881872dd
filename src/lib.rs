// lib.rs
pub mod backend;
pub mod bridge;
pub mod commands;
pub mod config;
pub mod docs;
pub mod error;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod utils;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};
use std::{sync::Arc, time::Duration};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    backend::{Backend, MockBackend, MockFixtures},
    bridge::DeviceBridge,
    config::{BackendKind, BridgeSettings},
    handlers::*,
    models::AppState,
};

pub fn build_backend(settings: &BridgeSettings) -> anyhow::Result<Arc<dyn Backend>> {
    match settings.backend {
        BackendKind::Mock => {
            let mut backend =
                MockBackend::new().with_latency(Duration::from_millis(settings.mock_latency_ms));
            if settings.mock_fixtures {
                backend = backend.with_fixtures(MockFixtures::demo());
            }
            Ok(Arc::new(backend))
        }
        BackendKind::Vendor => anyhow::bail!(
            "vendor backend requires a linked SDK binding; none is available in this build"
        ),
    }
}

pub fn build_bridge(settings: &BridgeSettings) -> anyhow::Result<DeviceBridge> {
    let backend = build_backend(settings)?;
    let bridge = DeviceBridge::new(backend).with_policy(settings.init_policy);

    for name in events::ALL {
        bridge.events().subscribe(name, |event, data| {
            tracing::info!(event, %data, "Bridge event");
        });
    }
    Ok(bridge)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::permanent("/docs") }))
        .route("/ws/bridge", get(handle_bridge_ws_upgrade))
        .route("/api/methods", get(list_methods))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/calls", post(call_session))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", docs::ApiDoc::openapi()))
        .with_state(state)
}
