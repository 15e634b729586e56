use std::sync::Arc;

use log::warn;
use mantle_core::{
    BuildIdentity, DiskFreshnessStore, FreshnessStore, MemoryFreshnessStore, UpdateOracle,
};
use mantle_net::shared_client;
use mantle_platform::AppPaths;
use mantle_router::{Destination, RouteRequest, Router, ServiceProbes};

/// Process-wide handle driven by the UI shell.
pub struct Mantle {
    oracle: UpdateOracle,
    router: Router,
}

impl Mantle {
    /// Wire the core together. Never fails: when application directories are
    /// unavailable the freshness record is held in memory only and the HTTP
    /// client runs uncached.
    #[must_use]
    pub fn new(identity: BuildIdentity, probes: Box<dyn ServiceProbes>) -> Self {
        let store: Arc<dyn FreshnessStore> = match AppPaths::new() {
            Ok(paths) => {
                if let Err(error) = paths.ensure_dirs() {
                    warn!("Failed to create application directories: {error}");
                }
                Arc::new(DiskFreshnessStore::open(paths.freshness_file()))
            }
            Err(error) => {
                warn!("Application directories unavailable, update verdicts will not persist: {error}");
                Arc::new(MemoryFreshnessStore::default())
            }
        };

        Self {
            oracle: UpdateOracle::new(shared_client(), store, identity),
            router: Router::new(probes),
        }
    }

    /// Fire-and-forget release check; call once at process start. Must be
    /// invoked from within a tokio runtime.
    pub fn check_for_update(&self) {
        self.oracle.check_for_update();
    }

    /// Synchronous, side-effect-free update decision over persisted state.
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.oracle.needs_update()
    }

    /// Resolve a navigation request; `None` means no navigation occurs.
    #[must_use]
    pub fn route(&self, request: RouteRequest) -> Option<Destination> {
        self.router.route(request)
    }
}
