use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, error};
use mantle_net::{CachedClient, NetworkError};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderValue};
use thiserror::Error;

use crate::freshness::{FreshnessRecord, FreshnessStore};
use crate::identity::BuildIdentity;
use crate::release::{ReleaseParseError, latest_version_code};

/// Release-metadata endpoint queried by default.
pub const DEFAULT_METADATA_URL: &str =
    "https://api.github.com/repos/mantle-app/mantle/releases/latest";

const METADATA_ACCEPT: &str = "application/vnd.github.v3+json";

/// Cached verdicts older than this are no longer trusted.
const STALENESS_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("release metadata request failed: {0}")]
    Network(#[from] NetworkError),
    #[error("release metadata request returned HTTP {0}")]
    HttpStatus(StatusCode),
    #[error(transparent)]
    Parse(#[from] ReleaseParseError),
}

/// Checks the remote release feed and answers the synchronous
/// "is an update needed" query from persisted state only.
pub struct UpdateOracle {
    client: Arc<CachedClient>,
    store: Arc<dyn FreshnessStore>,
    identity: BuildIdentity,
    metadata_url: String,
}

impl UpdateOracle {
    #[must_use]
    pub fn new(
        client: Arc<CachedClient>,
        store: Arc<dyn FreshnessStore>,
        identity: BuildIdentity,
    ) -> Self {
        Self {
            client,
            store,
            identity,
            metadata_url: DEFAULT_METADATA_URL.to_owned(),
        }
    }

    #[must_use]
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    /// Kick off one release check as a detached task and return immediately.
    ///
    /// Nothing awaits the task; completion shows up only as a committed
    /// freshness record. No retries are scheduled, so at most one fetch per
    /// call. Must be invoked from within a tokio runtime.
    pub fn check_for_update(&self) {
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let url = self.metadata_url.clone();
        tokio::spawn(async move {
            run_check(&client, store.as_ref(), &url).await;
        });
    }

    /// Whether the UI should surface an "update available" affordance, from
    /// persisted state and the wall clock alone. No I/O.
    #[must_use]
    pub fn needs_update(&self) -> bool {
        needs_update_at(&self.store.snapshot(), &self.identity, Utc::now())
    }
}

/// One release-check attempt: fetch, parse, commit.
///
/// On success the full verdict is committed as a single atomic update. On
/// any failure the record is marked checked if it was not already, and left
/// untouched otherwise. Errors are logged, never propagated; a failed check
/// only delays the verdict.
pub async fn run_check(client: &CachedClient, store: &dyn FreshnessStore, url: &str) {
    match fetch_latest_code(client, url).await {
        Ok(code) => {
            let now = Utc::now();
            store.update(&mut |record| {
                record.checked = true;
                record.last_checked_at = Some(now);
                record.latest_version_code = code;
            });
            debug!("Release check succeeded, latest version code is {code}");
        }
        Err(err) => {
            error!("Release check failed: {err}");
            if !store.snapshot().checked {
                store.update(&mut |record| record.checked = true);
            }
        }
    }
}

async fn fetch_latest_code(client: &CachedClient, url: &str) -> Result<i64, UpdateError> {
    let response = client
        .get(url)
        .header(ACCEPT, HeaderValue::from_static(METADATA_ACCEPT))
        .send()
        .await?;
    if !response.status.is_success() {
        return Err(UpdateError::HttpStatus(response.status));
    }
    Ok(latest_version_code(&response.body)?)
}

/// Pure update decision over a freshness snapshot and the build identity.
///
/// A verdict older than 30 days forces `true` regardless of the version
/// comparison, pushing the UI to re-verify. A build that has never reached
/// the feed successfully is nagged once it is 30 days old itself.
#[must_use]
pub fn needs_update_at(
    record: &FreshnessRecord,
    identity: &BuildIdentity,
    now: DateTime<Utc>,
) -> bool {
    if !record.checked {
        return false;
    }
    if let Some(last_checked) = record.last_checked_at {
        if now > last_checked + Duration::days(STALENESS_WINDOW_DAYS) {
            return true;
        }
        return record.latest_version_code > identity.version_code;
    }
    now > identity.build_time + Duration::days(STALENESS_WINDOW_DAYS)
}
