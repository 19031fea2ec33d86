//! Entity control dispatch.
//!
//! Turns a dashboard action on a single entity into exactly one host service
//! call.

use strum::EnumString;

use crate::host::Service;
use crate::host::ServiceCall;
use crate::host::ServiceCaller;

/// Action used when a control request does not name one.
pub const DEFAULT_ACTION: &str = "toggle";

/// Entity domains with dedicated control handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ControlDomain {
    Light,
    Switch,
    Cover,
    /// Everything else is toggled through the generic host service.
    #[strum(disabled)]
    Other,
}

impl ControlDomain {
    /// Domain of `entity_id`, taken from the text before the first `.`.
    pub fn of(entity_id: &str) -> Self {
        let domain = entity_id
            .split_once('.')
            .map(|(domain, _)| domain)
            .unwrap_or(entity_id);
        domain.parse().unwrap_or(ControlDomain::Other)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Service call {call} for {} failed: {source}", .call.entity_id)]
pub struct ControlError {
    pub call: ServiceCall,
    #[source]
    pub source: crate::host::HostError,
}

/// Resolve the service call for `action` on `entity_id`.
pub fn resolve(entity_id: &str, action: &str) -> ServiceCall {
    let (domain, service) = match ControlDomain::of(entity_id) {
        ControlDomain::Light => ("light", on_off(action)),
        ControlDomain::Switch => ("switch", on_off(action)),
        ControlDomain::Cover => {
            let service = match action {
                "open" => Service::OpenCover,
                "close" => Service::CloseCover,
                "stop" => Service::StopCover,
                _ => Service::Toggle,
            };
            ("cover", service)
        }
        ControlDomain::Other => ("homeassistant", Service::Toggle),
    };

    ServiceCall {
        domain,
        service,
        entity_id: entity_id.to_string(),
    }
}

fn on_off(action: &str) -> Service {
    if action == "on" {
        Service::TurnOn
    } else {
        Service::TurnOff
    }
}

/// Dispatch `action` on `entity_id` through the host.
///
/// Success means the host accepted the call, not that the device changed
/// state. Failures are returned as-is; nothing is retried.
pub async fn control_entity(
    entity_id: &str,
    action: &str,
    services: &dyn ServiceCaller,
) -> Result<ServiceCall, ControlError> {
    let call = resolve(entity_id, action);
    tracing::info!("Dispatching {} for {} (action: {})", call, entity_id, action);

    match services.call_service(&call).await {
        Ok(()) => Ok(call),
        Err(source) => Err(ControlError { call, source }),
    }
}
