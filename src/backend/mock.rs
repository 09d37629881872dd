// mock.rs
use async_trait::async_trait;
use serde_json::json;
use std::{collections::HashMap, time::Duration};
use tokio::sync::RwLock;

use crate::{
    error::BackendError,
    models::{ControlCommand, Credentials, DeviceDescriptor, DeviceStatus},
};

const CANNED_STATUS_NAME: &str = "Test Device";

/// Demo device inventory for the mock backend.
#[derive(Debug, Clone, Default)]
pub struct MockFixtures {
    pub registered: Vec<DeviceDescriptor>,
    pub discovered: Vec<DeviceDescriptor>,
    /// Per-device telemetry reported by `device_status`, keyed by device id.
    pub telemetry: HashMap<String, ControlCommand>,
}

fn telemetry(value: serde_json::Value) -> ControlCommand {
    match value {
        serde_json::Value::Object(map) => map,
        _ => ControlCommand::new(),
    }
}

impl MockFixtures {
    pub fn demo() -> Self {
        Self {
            registered: vec![
                DeviceDescriptor::registered(
                    "device_001",
                    "Smart Thermometer",
                    "temp_sensor_001",
                    true,
                ),
                DeviceDescriptor::registered("device_002", "Smart Light", "smart_light_001", true),
                DeviceDescriptor::registered("device_003", "Smart Pump", "water_pump_001", false),
            ],
            discovered: vec![
                DeviceDescriptor::discovered(
                    "new_device_001",
                    "New Smart Device",
                    "new_sensor_001",
                ),
                DeviceDescriptor::discovered(
                    "new_device_002",
                    "Smart Soil Sensor",
                    "soil_sensor_001",
                ),
            ],
            telemetry: HashMap::from([
                (
                    "device_001".to_string(),
                    telemetry(json!({"temperature": 25.5, "humidity": 60})),
                ),
                (
                    "device_002".to_string(),
                    telemetry(json!({"power": true, "brightness": 80})),
                ),
                (
                    "device_003".to_string(),
                    telemetry(json!({"power": false, "flowRate": 0})),
                ),
            ]),
        }
    }
}

/// Stand-in backend. Without fixtures every call succeeds with a canned result.
pub struct MockBackend {
    latency: Duration,
    fixtures: Option<RwLock<MockFixtures>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            fixtures: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_fixtures(mut self, fixtures: MockFixtures) -> Self {
        self.fixtures = Some(RwLock::new(fixtures));
        self
    }

    async fn simulate(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Backend for MockBackend {
    async fn initialize(&self, _credentials: &Credentials) -> Result<(), BackendError> {
        self.simulate().await;
        Ok(())
    }

    async fn start_discovery(&self) -> Result<(), BackendError> {
        self.simulate().await;
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn discovered_devices(&self) -> Result<Vec<DeviceDescriptor>, BackendError> {
        match &self.fixtures {
            Some(fixtures) => Ok(fixtures.read().await.discovered.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn add_device(
        &self,
        device_id: &str,
        _ssid: &str,
        _password: &str,
    ) -> Result<(), BackendError> {
        self.simulate().await;
        let Some(fixtures) = &self.fixtures else {
            return Ok(());
        };

        let mut fixtures = fixtures.write().await;
        let pos = fixtures
            .discovered
            .iter()
            .position(|d| d.id == device_id)
            .ok_or(BackendError::NotFound)?;
        let mut device = fixtures.discovered.remove(pos);
        device.online = Some(true);
        fixtures.registered.push(device);
        Ok(())
    }

    async fn registered_devices(&self) -> Result<Vec<DeviceDescriptor>, BackendError> {
        match &self.fixtures {
            Some(fixtures) => Ok(fixtures.read().await.registered.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn send_command(
        &self,
        device_id: &str,
        command: &ControlCommand,
    ) -> Result<(), BackendError> {
        self.simulate().await;
        let Some(fixtures) = &self.fixtures else {
            return Ok(());
        };

        let mut fixtures = fixtures.write().await;
        if !fixtures.registered.iter().any(|d| d.id == device_id) {
            return Err(BackendError::NotFound);
        }
        // Commands merge into the device telemetry.
        let state = fixtures.telemetry.entry(device_id.to_string()).or_default();
        for (key, value) in command {
            state.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn device_status(&self, device_id: &str) -> Result<DeviceStatus, BackendError> {
        let Some(fixtures) = &self.fixtures else {
            return Ok(DeviceStatus::new(true, CANNED_STATUS_NAME));
        };

        let fixtures = fixtures.read().await;
        let device = fixtures
            .registered
            .iter()
            .find(|d| d.id == device_id)
            .ok_or(BackendError::NotFound)?;
        Ok(DeviceStatus {
            online: device.online.unwrap_or(false),
            name: device.name.clone(),
            status: fixtures.telemetry.get(device_id).cloned(),
        })
    }
}
