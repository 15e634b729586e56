//! Host-facing surface of the Mantle core.
//!
//! The UI shell constructs one [`Mantle`] per process and drives it through
//! three calls: [`Mantle::check_for_update`] once at startup,
//! [`Mantle::needs_update`] whenever an update affordance is rendered, and
//! [`Mantle::route`] per inbound navigation event. Everything else here is
//! wiring: platform paths, the shared HTTP client, the persisted freshness
//! record, and logging.

mod app;
mod logging;

pub use app::Mantle;
pub use logging::{init_logging, set_logging_enabled};
pub use mantle_core::{
    BuildIdentity, DiskFreshnessStore, FreshnessRecord, FreshnessStore, MemoryFreshnessStore,
    UpdateOracle,
};
pub use mantle_router::{Destination, RouteRequest, RouteToken, Router, ServiceProbes};
