//! Ports onto the home-automation host.
//!
//! Entity state and service dispatch are owned by Home Assistant. The rest of
//! the crate only sees these traits, so the aggregation and control logic can
//! be exercised against [`mock::MockHost`] in tests.

#[cfg(test)]
pub(crate) mod mock;
mod rest;

use async_trait::async_trait;
use serde::Deserialize;
use strum::AsRefStr;
use strum::Display;

pub use rest::HomeAssistantClient;

/// Current state of one host entity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
}

impl EntityState {
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
        }
    }
}

/// Host service names used by the control dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Service {
    TurnOn,
    TurnOff,
    OpenCover,
    CloseCover,
    StopCover,
    Toggle,
}

/// A single service invocation targeting one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCall {
    pub domain: &'static str,
    pub service: Service,
    pub entity_id: String,
}

impl std::fmt::Display for ServiceCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Request to Home Assistant failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Home Assistant returned status {status} for {path}")]
    Status { status: u16, path: String },
}

/// Read access to the host's entity registry.
#[async_trait]
pub trait StateReader: Send + Sync {
    /// Every entity the host knows about, in whatever order it enumerates them.
    async fn all_states(&self) -> Result<Vec<EntityState>, HostError>;
}

/// The host's generic service-call mechanism.
#[async_trait]
pub trait ServiceCaller: Send + Sync {
    /// Invoke `call` and wait until the host accepts or rejects it.
    async fn call_service(&self, call: &ServiceCall) -> Result<(), HostError>;
}
