// vendor.rs
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{
    error::BackendError,
    models::{ControlCommand, Credentials, DeviceDescriptor, DeviceStatus},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({code})")]
pub struct VendorError {
    pub code: String,
    pub message: String,
}

impl From<VendorError> for BackendError {
    fn from(e: VendorError) -> Self {
        BackendError::Rejected {
            code: e.code,
            message: e.message,
        }
    }
}

/// Completion handle given to the vendor SDK. Consumed on first use, so a
/// call completes at most once.
pub struct ResultCallback<T> {
    tx: oneshot::Sender<Result<T, VendorError>>,
}

impl<T> ResultCallback<T> {
    fn channel() -> (Self, oneshot::Receiver<Result<T, VendorError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn on_success(self, value: T) {
        let _ = self.tx.send(Ok(value));
    }

    pub fn on_error(self, code: impl Into<String>, message: impl Into<String>) {
        let _ = self.tx.send(Err(VendorError {
            code: code.into(),
            message: message.into(),
        }));
    }
}

/// Callback-style binding to a vendor device SDK.
pub trait VendorSdk: Send + Sync + 'static {
    fn init(&self, credentials: &Credentials) -> Result<(), VendorError>;
    fn start_search(&self, callback: ResultCallback<()>);
    fn stop_search(&self) -> Result<(), VendorError>;
    fn discovered_devices(&self) -> Result<Vec<DeviceDescriptor>, VendorError>;
    fn add_device(
        &self,
        device_id: &str,
        ssid: &str,
        password: &str,
        callback: ResultCallback<()>,
    );
    fn device_list(&self) -> Result<Vec<DeviceDescriptor>, VendorError>;
    fn send_command(
        &self,
        device_id: &str,
        command: &ControlCommand,
        callback: ResultCallback<()>,
    );
    fn device(&self, device_id: &str) -> Result<Option<DeviceDescriptor>, VendorError>;
}

/// Discovery session lifecycle. Each start gets its own generation so a
/// late callback can tell whether a stop overtook it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discovery {
    Idle,
    Pending(u64),
    Cancelled(u64),
    Running(u64),
}

pub struct VendorBackend<S> {
    sdk: S,
    discovery: Mutex<Discovery>,
    generation: AtomicU64,
}

impl<S: VendorSdk> VendorBackend<S> {
    pub fn new(sdk: S) -> Self {
        Self {
            sdk,
            discovery: Mutex::new(Discovery::Idle),
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_discovering(&self) -> bool {
        matches!(*self.discovery(), Discovery::Pending(_) | Discovery::Running(_))
    }

    fn discovery(&self) -> MutexGuard<'_, Discovery> {
        self.discovery.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn relay<T>(rx: oneshot::Receiver<Result<T, VendorError>>) -> Result<T, BackendError> {
    match rx.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(anyhow!("vendor SDK dropped the callback without completing").into()),
    }
}

fn fault(e: VendorError) -> BackendError {
    BackendError::Internal(e.into())
}

#[async_trait]
impl<S: VendorSdk> super::Backend for VendorBackend<S> {
    async fn initialize(&self, credentials: &Credentials) -> Result<(), BackendError> {
        self.sdk.init(credentials).map_err(fault)
    }

    async fn start_discovery(&self) -> Result<(), BackendError> {
        let generation = {
            let mut discovery = self.discovery();
            if *discovery != Discovery::Idle {
                return Err(BackendError::Busy(
                    "Device discovery already in progress".into(),
                ));
            }
            let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
            *discovery = Discovery::Pending(generation);
            generation
        };

        let (callback, rx) = ResultCallback::channel();
        self.sdk.start_search(callback);
        let result = relay(rx).await;

        let cancelled = {
            let mut discovery = self.discovery();
            match *discovery {
                Discovery::Pending(g) if g == generation => {
                    *discovery = if result.is_ok() {
                        Discovery::Running(generation)
                    } else {
                        Discovery::Idle
                    };
                    false
                }
                Discovery::Cancelled(g) if g == generation => {
                    *discovery = Discovery::Idle;
                    true
                }
                _ => true,
            }
        };

        if cancelled {
            // The search came up after a stop was requested; shut it down again.
            if result.is_ok() {
                if let Err(e) = self.sdk.stop_search() {
                    warn!(generation, error = %e, "Failed to stop a cancelled search");
                }
            }
            return Err(BackendError::Cancelled(
                "Device discovery was stopped before it started".into(),
            ));
        }
        result
    }

    async fn stop_discovery(&self) -> Result<(), BackendError> {
        self.sdk.stop_search().map_err(fault)?;
        let mut discovery = self.discovery();
        *discovery = match *discovery {
            Discovery::Pending(g) | Discovery::Cancelled(g) => Discovery::Cancelled(g),
            Discovery::Running(g) => {
                debug!(generation = g, "Discovery session closed");
                Discovery::Idle
            }
            Discovery::Idle => Discovery::Idle,
        };
        Ok(())
    }

    async fn discovered_devices(&self) -> Result<Vec<DeviceDescriptor>, BackendError> {
        self.sdk.discovered_devices().map_err(fault)
    }

    async fn add_device(
        &self,
        device_id: &str,
        ssid: &str,
        password: &str,
    ) -> Result<(), BackendError> {
        let (callback, rx) = ResultCallback::channel();
        self.sdk.add_device(device_id, ssid, password, callback);
        relay(rx).await
    }

    async fn registered_devices(&self) -> Result<Vec<DeviceDescriptor>, BackendError> {
        self.sdk.device_list().map_err(fault)
    }

    async fn send_command(
        &self,
        device_id: &str,
        command: &ControlCommand,
    ) -> Result<(), BackendError> {
        let (callback, rx) = ResultCallback::channel();
        self.sdk.send_command(device_id, command, callback);
        relay(rx).await
    }

    async fn device_status(&self, device_id: &str) -> Result<DeviceStatus, BackendError> {
        let device = self
            .sdk
            .device(device_id)
            .map_err(fault)?
            .ok_or(BackendError::NotFound)?;
        Ok(DeviceStatus::new(device.online.unwrap_or(false), device.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeSdk {
        fail_search: bool,
        hold_searches: bool,
        drop_commands: bool,
        searches: Mutex<u32>,
        stops: Mutex<u32>,
        held: Mutex<Vec<ResultCallback<()>>>,
    }

    impl VendorSdk for FakeSdk {
        fn init(&self, credentials: &Credentials) -> Result<(), VendorError> {
            if credentials.app_key.is_empty() {
                return Err(VendorError {
                    code: "AUTH".into(),
                    message: "missing app key".into(),
                });
            }
            Ok(())
        }

        fn start_search(&self, callback: ResultCallback<()>) {
            *self.searches.lock().unwrap() += 1;
            if self.hold_searches {
                self.held.lock().unwrap().push(callback);
            } else if self.fail_search {
                callback.on_error("SCAN_FAILED", "radio unavailable");
            } else {
                callback.on_success(());
            }
        }

        fn stop_search(&self) -> Result<(), VendorError> {
            *self.stops.lock().unwrap() += 1;
            Ok(())
        }

        fn discovered_devices(&self) -> Result<Vec<DeviceDescriptor>, VendorError> {
            Ok(vec![DeviceDescriptor::discovered("d9", "Valve", "valve_001")])
        }

        fn add_device(
            &self,
            _device_id: &str,
            _ssid: &str,
            password: &str,
            callback: ResultCallback<()>,
        ) {
            if password.len() < 8 {
                callback.on_error("1001", "wifi password rejected");
            } else {
                callback.on_success(());
            }
        }

        fn device_list(&self) -> Result<Vec<DeviceDescriptor>, VendorError> {
            Ok(vec![DeviceDescriptor::registered("d1", "Fan", "fan_001", false)])
        }

        fn send_command(
            &self,
            _device_id: &str,
            _command: &ControlCommand,
            callback: ResultCallback<()>,
        ) {
            if !self.drop_commands {
                callback.on_success(());
            }
        }

        fn device(&self, device_id: &str) -> Result<Option<DeviceDescriptor>, VendorError> {
            Ok((device_id == "d1")
                .then(|| DeviceDescriptor::registered("d1", "Fan", "fan_001", false)))
        }
    }

    #[tokio::test]
    async fn vendor_errors_are_relayed_verbatim() {
        let backend = VendorBackend::new(FakeSdk::default());
        match backend.add_device("d9", "farm", "short").await {
            Err(BackendError::Rejected { code, message }) => {
                assert_eq!(code, "1001");
                assert_eq!(message, "wifi password rejected");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        backend.add_device("d9", "farm", "long enough").await.unwrap();
    }

    #[tokio::test]
    async fn one_discovery_session_at_a_time() {
        let backend = VendorBackend::new(FakeSdk::default());
        backend.start_discovery().await.unwrap();
        assert!(backend.is_discovering());
        assert!(matches!(
            backend.start_discovery().await,
            Err(BackendError::Busy(_))
        ));

        backend.stop_discovery().await.unwrap();
        assert!(!backend.is_discovering());
        backend.start_discovery().await.unwrap();
        assert_eq!(*backend.sdk.searches.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_search_releases_the_session() {
        let backend = VendorBackend::new(FakeSdk {
            fail_search: true,
            ..FakeSdk::default()
        });
        assert!(matches!(
            backend.start_discovery().await,
            Err(BackendError::Rejected { .. })
        ));
        assert!(!backend.is_discovering());
    }

    #[tokio::test]
    async fn dropped_callback_is_an_internal_fault() {
        let backend = VendorBackend::new(FakeSdk {
            drop_commands: true,
            ..FakeSdk::default()
        });
        let err = backend
            .send_command("d1", &ControlCommand::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Internal(_)));
        assert!(err.to_string().contains("dropped the callback"));
    }

    #[tokio::test]
    async fn status_comes_from_the_device_record() {
        let backend = VendorBackend::new(FakeSdk::default());
        let status = backend.device_status("d1").await.unwrap();
        assert_eq!(status, DeviceStatus::new(false, "Fan"));
        assert!(matches!(
            backend.device_status("d2").await,
            Err(BackendError::NotFound)
        ));
    }

    #[tokio::test]
    async fn sync_failures_become_faults() {
        let backend = VendorBackend::new(FakeSdk::default());
        let err = backend
            .initialize(&Credentials::new("", "s", "eu"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Internal(_)));
        assert_eq!(err.to_string(), "missing app key (AUTH)");
    }

    async fn wait_for_held(sdk: &FakeSdk, count: usize) {
        while sdk.held.lock().unwrap().len() < count {
            tokio::task::yield_now().await;
        }
    }

    fn complete_held(sdk: &FakeSdk) {
        let callback = sdk.held.lock().unwrap().pop().unwrap();
        callback.on_success(());
    }

    #[tokio::test]
    async fn stop_before_search_completes_cancels_the_start() {
        let backend = Arc::new(VendorBackend::new(FakeSdk {
            hold_searches: true,
            ..FakeSdk::default()
        }));

        let first = tokio::spawn({
            let backend = Arc::clone(&backend);
            async move { backend.start_discovery().await }
        });
        wait_for_held(&backend.sdk, 1).await;
        assert!(backend.is_discovering());

        backend.stop_discovery().await.unwrap();
        assert!(matches!(
            backend.start_discovery().await,
            Err(BackendError::Busy(_))
        ));

        complete_held(&backend.sdk);
        assert!(matches!(
            first.await.unwrap(),
            Err(BackendError::Cancelled(_))
        ));
        assert!(!backend.is_discovering());
        assert_eq!(*backend.sdk.searches.lock().unwrap(), 1);
        // One stop from the caller, one to shut down the late search.
        assert_eq!(*backend.sdk.stops.lock().unwrap(), 2);

        let next = tokio::spawn({
            let backend = Arc::clone(&backend);
            async move { backend.start_discovery().await }
        });
        wait_for_held(&backend.sdk, 1).await;
        complete_held(&backend.sdk);
        next.await.unwrap().unwrap();
        assert!(backend.is_discovering());
        assert_eq!(*backend.sdk.searches.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn pending_start_refuses_a_second_start() {
        let backend = Arc::new(VendorBackend::new(FakeSdk {
            hold_searches: true,
            ..FakeSdk::default()
        }));
        let first = tokio::spawn({
            let backend = Arc::clone(&backend);
            async move { backend.start_discovery().await }
        });
        wait_for_held(&backend.sdk, 1).await;

        assert!(matches!(
            backend.start_discovery().await,
            Err(BackendError::Busy(_))
        ));
        complete_held(&backend.sdk);
        first.await.unwrap().unwrap();
        assert_eq!(*backend.sdk.searches.lock().unwrap(), 1);
    }
}
