//! Admission-gated navigation routing.
//!
//! Inbound navigation requests are resolved to concrete destinations only
//! when the external services they depend on are available. Requests that
//! cannot be serviced are dropped silently: `None` means the shell stays
//! where it is, with no user-visible error and no state change.

use std::collections::HashMap;

/// Payload key holding a deep link's target.
pub const PAYLOAD_URI: &str = "uri";
/// Payload key holding the module package name for a detail request.
pub const PAYLOAD_MODULE_PACKAGE: &str = "modulePackageName";
/// Payload key holding the user id for a detail request.
pub const PAYLOAD_MODULE_USER: &str = "moduleUserId";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteToken {
    Settings,
    ModuleDetail,
    DeepLink,
}

/// One navigation event from the UI shell. Consumed by [`Router::route`]
/// and never persisted.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub token: RouteToken,
    pub payload: HashMap<String, String>,
}

impl RouteRequest {
    #[must_use]
    pub fn new(token: RouteToken) -> Self {
        Self {
            token,
            payload: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.payload.insert(key.to_owned(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Settings,
    ModuleDetail {
        package: Option<String>,
        user_id: i64,
    },
    Modules,
    Logs,
    Repository,
}

/// Availability probes supplied by the host. Both are expected to answer
/// synchronously without I/O of their own.
pub trait ServiceProbes: Send + Sync {
    /// Liveness of the privileged backend service.
    fn is_privileged_service_alive(&self) -> bool;
    /// Presence of the installer component.
    fn is_installer_present(&self) -> bool;
}

pub struct Router {
    probes: Box<dyn ServiceProbes>,
}

impl Router {
    #[must_use]
    pub fn new(probes: Box<dyn ServiceProbes>) -> Self {
        Self { probes }
    }

    /// Resolve a request against the admission gates.
    ///
    /// An unknown deep-link target and a failed precondition look the same
    /// to the caller: both drop the request.
    #[must_use]
    pub fn route(&self, request: RouteRequest) -> Option<Destination> {
        match request.token {
            RouteToken::Settings => Some(Destination::Settings),
            RouteToken::ModuleDetail => {
                if !self.probes.is_privileged_service_alive() {
                    return None;
                }
                let package = request.payload.get(PAYLOAD_MODULE_PACKAGE).cloned();
                let user_id = request
                    .payload
                    .get(PAYLOAD_MODULE_USER)
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(-1);
                Some(Destination::ModuleDetail { package, user_id })
            }
            RouteToken::DeepLink => self.route_deep_link(&request),
        }
    }

    fn route_deep_link(&self, request: &RouteRequest) -> Option<Destination> {
        match request.payload.get(PAYLOAD_URI).map(String::as_str) {
            Some("modules") if self.probes.is_privileged_service_alive() => {
                Some(Destination::Modules)
            }
            Some("logs") if self.probes.is_privileged_service_alive() => Some(Destination::Logs),
            Some("repo")
                if self.probes.is_privileged_service_alive()
                    || self.probes.is_installer_present() =>
            {
                Some(Destination::Repository)
            }
            _ => None,
        }
    }
}
