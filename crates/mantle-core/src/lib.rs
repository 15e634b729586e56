//! Update-freshness core: the persisted record of the last remote release
//! check, the oracle that refreshes it, and the pure decision over it.
//!
//! - Freshness record persistence with atomic commits.
//! - One-shot asynchronous release check (detached task, no retries).
//! - Synchronous, side-effect-free "is an update needed" decision.

mod freshness;
mod identity;
mod oracle;
mod release;

pub use freshness::{DiskFreshnessStore, FreshnessRecord, FreshnessStore, MemoryFreshnessStore};
pub use identity::BuildIdentity;
pub use oracle::{
    DEFAULT_METADATA_URL, UpdateError, UpdateOracle, needs_update_at, run_check,
};
pub use release::{
    ReleaseAsset, ReleaseInfo, ReleaseParseError, latest_version_code, version_code_from_asset,
};
