// commands/mod.rs
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

use crate::{
    bridge::DeviceBridge,
    error::{BridgeError, ErrorCode},
    models::{BridgeCall, BridgeResponse, ControlCommand, Credentials, Session},
};

#[async_trait]
pub trait Operation: Send + Sync {
    async fn execute(
        &self,
        bridge: &DeviceBridge,
        session: &mut Session,
    ) -> Result<Value, BridgeError>;
}

/// Builds an operation from a method's positional parameters.
pub trait OperationFactory: Sync {
    fn method(&self) -> &'static str;
    fn create(&self, params: &[Value]) -> Result<Box<dyn Operation>, BridgeError>;
}

inventory::collect!(&'static dyn OperationFactory);

pub fn find(method: &str) -> Option<&'static dyn OperationFactory> {
    inventory::iter::<&'static dyn OperationFactory>
        .into_iter()
        .find(|factory| factory.method() == method)
        .copied()
}

pub fn methods() -> Vec<&'static str> {
    let mut names: Vec<_> = inventory::iter::<&'static dyn OperationFactory>
        .into_iter()
        .map(|factory| factory.method())
        .collect();
    names.sort_unstable();
    names
}

/// Runs one call to completion. Every call yields exactly one response
/// carrying the call's id.
pub async fn dispatch(
    bridge: &DeviceBridge,
    session: &mut Session,
    call: BridgeCall,
) -> BridgeResponse {
    let started = Instant::now();
    let factory = find(&call.method);
    let method = factory.map(|f| f.method()).unwrap_or("unknown");

    let result = match factory {
        Some(factory) => match factory.create(&call.params) {
            Ok(operation) => operation.execute(bridge, session).await,
            Err(e) => Err(e),
        },
        None => Err(BridgeError::new(
            ErrorCode::UnknownMethod,
            format!("Unknown method: {}", call.method),
        )),
    };

    let elapsed = started.elapsed().as_secs_f64();
    metrics::histogram!("bridge_call_duration_seconds", "method" => method).record(elapsed);

    match result {
        Ok(value) => {
            metrics::counter!("bridge_calls_total", "method" => method, "outcome" => "resolved")
                .increment(1);
            info!(id = %call.id, session = %session.id, method, "Call resolved");
            BridgeResponse::resolved(call.id, value)
        }
        Err(e) => {
            metrics::counter!("bridge_calls_total", "method" => method, "outcome" => "rejected")
                .increment(1);
            warn!(
                id = %call.id,
                session = %session.id,
                method,
                code = %e.code,
                message = %e.message,
                "Call rejected"
            );
            BridgeResponse::rejected(call.id, e.code, e.message)
        }
    }
}

fn expect_arity(method: &str, params: &[Value], expected: usize) -> Result<(), BridgeError> {
    if params.len() != expected {
        return Err(BridgeError::invalid_params(format!(
            "{method} expects {expected} parameter(s), got {}",
            params.len()
        )));
    }
    Ok(())
}

fn string_param(params: &[Value], index: usize, name: &str) -> Result<String, BridgeError> {
    params
        .get(index)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| BridgeError::invalid_params(format!("{name} must be a string")))
}

fn object_param(params: &[Value], index: usize, name: &str) -> Result<ControlCommand, BridgeError> {
    params
        .get(index)
        .and_then(|v| v.as_object())
        .cloned()
        .ok_or_else(|| BridgeError::invalid_params(format!("{name} must be an object")))
}

fn to_json<T: Serialize>(value: T, code: ErrorCode) -> Result<Value, BridgeError> {
    serde_json::to_value(value)
        .map_err(|e| BridgeError::new(code, format!("Failed to encode result: {e}")))
}

pub struct InitSdk {
    credentials: Credentials,
}

#[async_trait]
impl Operation for InitSdk {
    async fn execute(
        &self,
        bridge: &DeviceBridge,
        session: &mut Session,
    ) -> Result<Value, BridgeError> {
        let ok = bridge.initialize(session, self.credentials.clone()).await?;
        Ok(Value::Bool(ok))
    }
}

pub struct InitSdkFactory;

impl OperationFactory for InitSdkFactory {
    fn method(&self) -> &'static str {
        "initSDK"
    }

    fn create(&self, params: &[Value]) -> Result<Box<dyn Operation>, BridgeError> {
        expect_arity(self.method(), params, 3)?;
        Ok(Box::new(InitSdk {
            credentials: Credentials::new(
                string_param(params, 0, "appKey")?,
                string_param(params, 1, "secretKey")?,
                string_param(params, 2, "region")?,
            ),
        }))
    }
}

pub struct StartDiscovery;

#[async_trait]
impl Operation for StartDiscovery {
    async fn execute(
        &self,
        bridge: &DeviceBridge,
        session: &mut Session,
    ) -> Result<Value, BridgeError> {
        Ok(Value::Bool(bridge.start_discovery(session).await?))
    }
}

pub struct StartDiscoveryFactory;

impl OperationFactory for StartDiscoveryFactory {
    fn method(&self) -> &'static str {
        "startDeviceDiscovery"
    }

    fn create(&self, params: &[Value]) -> Result<Box<dyn Operation>, BridgeError> {
        expect_arity(self.method(), params, 0)?;
        Ok(Box::new(StartDiscovery))
    }
}

pub struct StopDiscovery;

#[async_trait]
impl Operation for StopDiscovery {
    async fn execute(
        &self,
        bridge: &DeviceBridge,
        session: &mut Session,
    ) -> Result<Value, BridgeError> {
        Ok(Value::Bool(bridge.stop_discovery(session).await?))
    }
}

pub struct StopDiscoveryFactory;

impl OperationFactory for StopDiscoveryFactory {
    fn method(&self) -> &'static str {
        "stopDeviceDiscovery"
    }

    fn create(&self, params: &[Value]) -> Result<Box<dyn Operation>, BridgeError> {
        expect_arity(self.method(), params, 0)?;
        Ok(Box::new(StopDiscovery))
    }
}

pub struct GetDiscoveredDevices;

#[async_trait]
impl Operation for GetDiscoveredDevices {
    async fn execute(
        &self,
        bridge: &DeviceBridge,
        session: &mut Session,
    ) -> Result<Value, BridgeError> {
        let devices = bridge.discovered_devices(session).await?;
        to_json(devices, ErrorCode::GetDevicesError)
    }
}

pub struct GetDiscoveredDevicesFactory;

impl OperationFactory for GetDiscoveredDevicesFactory {
    fn method(&self) -> &'static str {
        "getDiscoveredDevices"
    }

    fn create(&self, params: &[Value]) -> Result<Box<dyn Operation>, BridgeError> {
        expect_arity(self.method(), params, 0)?;
        Ok(Box::new(GetDiscoveredDevices))
    }
}

pub struct AddDevice {
    device_id: String,
    ssid: String,
    password: String,
}

#[async_trait]
impl Operation for AddDevice {
    async fn execute(
        &self,
        bridge: &DeviceBridge,
        session: &mut Session,
    ) -> Result<Value, BridgeError> {
        let ok = bridge
            .add_device(session, &self.device_id, &self.ssid, &self.password)
            .await?;
        Ok(Value::Bool(ok))
    }
}

pub struct AddDeviceFactory;

impl OperationFactory for AddDeviceFactory {
    fn method(&self) -> &'static str {
        "addDevice"
    }

    fn create(&self, params: &[Value]) -> Result<Box<dyn Operation>, BridgeError> {
        expect_arity(self.method(), params, 3)?;
        Ok(Box::new(AddDevice {
            device_id: string_param(params, 0, "deviceId")?,
            ssid: string_param(params, 1, "ssid")?,
            password: string_param(params, 2, "password")?,
        }))
    }
}

pub struct GetDeviceList;

#[async_trait]
impl Operation for GetDeviceList {
    async fn execute(
        &self,
        bridge: &DeviceBridge,
        session: &mut Session,
    ) -> Result<Value, BridgeError> {
        let devices = bridge.registered_devices(session).await?;
        to_json(devices, ErrorCode::GetDeviceListError)
    }
}

pub struct GetDeviceListFactory;

impl OperationFactory for GetDeviceListFactory {
    fn method(&self) -> &'static str {
        "getDeviceList"
    }

    fn create(&self, params: &[Value]) -> Result<Box<dyn Operation>, BridgeError> {
        expect_arity(self.method(), params, 0)?;
        Ok(Box::new(GetDeviceList))
    }
}

pub struct ControlDevice {
    device_id: String,
    command: ControlCommand,
}

#[async_trait]
impl Operation for ControlDevice {
    async fn execute(
        &self,
        bridge: &DeviceBridge,
        session: &mut Session,
    ) -> Result<Value, BridgeError> {
        let ok = bridge
            .send_command(session, &self.device_id, &self.command)
            .await?;
        Ok(Value::Bool(ok))
    }
}

pub struct ControlDeviceFactory;

impl OperationFactory for ControlDeviceFactory {
    fn method(&self) -> &'static str {
        "controlDevice"
    }

    fn create(&self, params: &[Value]) -> Result<Box<dyn Operation>, BridgeError> {
        expect_arity(self.method(), params, 2)?;
        Ok(Box::new(ControlDevice {
            device_id: string_param(params, 0, "deviceId")?,
            command: object_param(params, 1, "command")?,
        }))
    }
}

pub struct GetDeviceStatus {
    device_id: String,
}

#[async_trait]
impl Operation for GetDeviceStatus {
    async fn execute(
        &self,
        bridge: &DeviceBridge,
        session: &mut Session,
    ) -> Result<Value, BridgeError> {
        let status = bridge.device_status(session, &self.device_id).await?;
        to_json(status, ErrorCode::GetStatusError)
    }
}

pub struct GetDeviceStatusFactory;

impl OperationFactory for GetDeviceStatusFactory {
    fn method(&self) -> &'static str {
        "getDeviceStatus"
    }

    fn create(&self, params: &[Value]) -> Result<Box<dyn Operation>, BridgeError> {
        expect_arity(self.method(), params, 1)?;
        Ok(Box::new(GetDeviceStatus {
            device_id: string_param(params, 0, "deviceId")?,
        }))
    }
}

inventory::submit! { &InitSdkFactory as &'static dyn OperationFactory }
inventory::submit! { &StartDiscoveryFactory as &'static dyn OperationFactory }
inventory::submit! { &StopDiscoveryFactory as &'static dyn OperationFactory }
inventory::submit! { &GetDiscoveredDevicesFactory as &'static dyn OperationFactory }
inventory::submit! { &AddDeviceFactory as &'static dyn OperationFactory }
inventory::submit! { &GetDeviceListFactory as &'static dyn OperationFactory }
inventory::submit! { &ControlDeviceFactory as &'static dyn OperationFactory }
inventory::submit! { &GetDeviceStatusFactory as &'static dyn OperationFactory }
