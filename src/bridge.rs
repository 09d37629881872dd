// bridge.rs
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::{
    backend::Backend,
    error::{BridgeError, ErrorCode},
    events::{self, EventBus},
    models::{ControlCommand, Credentials, DeviceDescriptor, DeviceStatus, Session},
};

/// Which operations refuse to run on an uninitialized session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitPolicy {
    #[default]
    DiscoveryOnly,
    AllOperations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Discovery,
    Other,
}

pub struct DeviceBridge {
    backend: Arc<dyn Backend>,
    policy: InitPolicy,
    events: Arc<EventBus>,
}

impl DeviceBridge {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            policy: InitPolicy::default(),
            events: Arc::new(EventBus::new()),
        }
    }

    pub fn with_policy(mut self, policy: InitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn ensure_initialized(&self, session: &Session, gate: Gate) -> Result<(), BridgeError> {
        let gated = match self.policy {
            InitPolicy::DiscoveryOnly => gate == Gate::Discovery,
            InitPolicy::AllOperations => true,
        };
        if gated && !session.initialized {
            return Err(BridgeError::not_initialized());
        }
        Ok(())
    }

    pub async fn initialize(
        &self,
        session: &mut Session,
        credentials: Credentials,
    ) -> Result<bool, BridgeError> {
        self.backend
            .initialize(&credentials)
            .await
            .map_err(|e| e.into_bridge(ErrorCode::InitError, "Failed to initialize device SDK"))?;

        session.initialized = true;
        session.region = Some(credentials.region.clone());
        info!(session = %session.id, region = %credentials.region, "Device SDK initialized");
        self.events.publish(
            events::SDK_INITIALIZED,
            json!({ "session": session.id, "region": credentials.region }),
        );
        Ok(true)
    }

    pub async fn start_discovery(&self, session: &Session) -> Result<bool, BridgeError> {
        self.ensure_initialized(session, Gate::Discovery)?;
        self.backend
            .start_discovery()
            .await
            .map_err(|e| {
                e.into_bridge(ErrorCode::DiscoveryError, "Failed to start device discovery")
            })?;
        self.events
            .publish(events::DISCOVERY_STARTED, json!({ "session": session.id }));
        Ok(true)
    }

    pub async fn stop_discovery(&self, session: &Session) -> Result<bool, BridgeError> {
        self.ensure_initialized(session, Gate::Other)?;
        self.backend
            .stop_discovery()
            .await
            .map_err(|e| e.into_bridge(ErrorCode::StopError, "Failed to stop device discovery"))?;
        self.events
            .publish(events::DISCOVERY_STOPPED, json!({ "session": session.id }));
        Ok(true)
    }

    pub async fn discovered_devices(
        &self,
        session: &Session,
    ) -> Result<Vec<DeviceDescriptor>, BridgeError> {
        self.ensure_initialized(session, Gate::Other)?;
        self.backend
            .discovered_devices()
            .await
            .map_err(|e| {
                e.into_bridge(ErrorCode::GetDevicesError, "Failed to get discovered devices")
            })
    }

    pub async fn add_device(
        &self,
        session: &Session,
        device_id: &str,
        ssid: &str,
        password: &str,
    ) -> Result<bool, BridgeError> {
        self.ensure_initialized(session, Gate::Other)?;
        self.backend
            .add_device(device_id, ssid, password)
            .await
            .map_err(|e| e.into_bridge(ErrorCode::AddDeviceError, "Failed to add device"))?;
        self.events.publish(
            events::DEVICE_ADDED,
            json!({ "session": session.id, "deviceId": device_id, "ssid": ssid }),
        );
        Ok(true)
    }

    pub async fn registered_devices(
        &self,
        session: &Session,
    ) -> Result<Vec<DeviceDescriptor>, BridgeError> {
        self.ensure_initialized(session, Gate::Other)?;
        self.backend
            .registered_devices()
            .await
            .map_err(|e| e.into_bridge(ErrorCode::GetDeviceListError, "Failed to get device list"))
    }

    pub async fn send_command(
        &self,
        session: &Session,
        device_id: &str,
        command: &ControlCommand,
    ) -> Result<bool, BridgeError> {
        self.ensure_initialized(session, Gate::Other)?;
        self.backend
            .send_command(device_id, command)
            .await
            .map_err(|e| e.into_bridge(ErrorCode::ControlError, "Failed to control device"))?;
        self.events.publish(
            events::DEVICE_COMMANDED,
            json!({ "session": session.id, "deviceId": device_id, "command": command }),
        );
        Ok(true)
    }

    pub async fn device_status(
        &self,
        session: &Session,
        device_id: &str,
    ) -> Result<DeviceStatus, BridgeError> {
        self.ensure_initialized(session, Gate::Other)?;
        self.backend
            .device_status(device_id)
            .await
            .map_err(|e| e.into_bridge(ErrorCode::GetStatusError, "Failed to get device status"))
    }
}
