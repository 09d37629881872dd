use crate::{bridge::DeviceBridge, error::ErrorCode};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::sync::{Mutex, Semaphore};
use utoipa::ToSchema;
use uuid::Uuid;

/// Open-ended device instruction, passed through to the backend untouched.
pub type ControlCommand = serde_json::Map<String, Value>;

#[derive(Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub app_key: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub region: String,
}

impl Credentials {
    pub fn new(
        app_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &self.app_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
    pub product_id: String,
    /// Absent for devices that were discovered but not yet registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
}

impl DeviceDescriptor {
    pub fn discovered(id: &str, name: &str, product_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            product_id: product_id.to_string(),
            online: None,
        }
    }

    pub fn registered(id: &str, name: &str, product_id: &str, online: bool) -> Self {
        Self {
            online: Some(online),
            ..Self::discovered(id, name, product_id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceStatus {
    pub online: bool,
    pub name: String,
    /// Last known device telemetry, when the backend tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub status: Option<ControlCommand>,
}

impl DeviceStatus {
    pub fn new(online: bool, name: impl Into<String>) -> Self {
        Self {
            online,
            name: name.into(),
            status: None,
        }
    }
}

/// Caller-owned bridge state. `initialized` flips once and stays set.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub initialized: bool,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            initialized: false,
            region: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A named bridge command with positional parameters.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BridgeCall {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub method: String,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Resolved {
        #[schema(value_type = Object)]
        value: Value,
    },
    Rejected { code: ErrorCode, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BridgeResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl BridgeResponse {
    pub fn resolved(id: Uuid, value: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Resolved { value },
        }
    }

    pub fn rejected(id: Uuid, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Rejected {
                code,
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: Uuid,
}

pub struct AppState {
    pub bridge: Arc<DeviceBridge>,
    pub sessions: DashMap<Uuid, Arc<Mutex<Session>>>,
    pub connections: Arc<Semaphore>,
}

impl AppState {
    pub fn new(bridge: Arc<DeviceBridge>, max_connections: usize) -> Self {
        Self {
            bridge,
            sessions: DashMap::new(),
            connections: Arc::new(Semaphore::new(max_connections)),
        }
    }

    pub fn open_session(&self) -> (Uuid, Arc<Mutex<Session>>) {
        let session = Session::new();
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.insert(id, Arc::clone(&handle));
        (id, handle)
    }

    /// Drops sessions idle for longer than `ttl`. A handle held outside the
    /// map belongs to a live connection or an in-flight call and is kept.
    pub fn sweep_idle(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => session.idle_for(now) <= ttl,
                Err(_) => true,
            }
        });
        before.saturating_sub(self.sessions.len())
    }
}
