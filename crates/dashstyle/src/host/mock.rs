use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;

use super::EntityState;
use super::HostError;
use super::ServiceCall;
use super::ServiceCaller;
use super::StateReader;

/// In-memory host for tests
///
/// Serves a fixed set of states and records every service call.
#[derive(Debug, Default)]
pub struct MockHost {
    pub states: Vec<EntityState>,
    pub calls: Mutex<Vec<ServiceCall>>,
    pub fail_states: bool,
    pub fail_calls: bool,
    pub state_reads: AtomicUsize,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(states: &[(&str, &str)]) -> Self {
        Self {
            states: states
                .iter()
                .map(|(id, state)| EntityState::new(*id, *state))
                .collect(),
            ..Self::default()
        }
    }

    /// Make every host operation fail
    pub fn failing() -> Self {
        Self {
            fail_states: true,
            fail_calls: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.state_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateReader for MockHost {
    async fn all_states(&self) -> Result<Vec<EntityState>, HostError> {
        self.state_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_states {
            return Err(HostError::Status {
                status: 502,
                path: "/api/states".to_string(),
            });
        }
        Ok(self.states.clone())
    }
}

#[async_trait]
impl ServiceCaller for MockHost {
    async fn call_service(&self, call: &ServiceCall) -> Result<(), HostError> {
        if self.fail_calls {
            return Err(HostError::Status {
                status: 500,
                path: format!("/api/services/{}/{}", call.domain, call.service),
            });
        }
        self.calls.lock().unwrap().push(call.clone());
        Ok(())
    }
}
