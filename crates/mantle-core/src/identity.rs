use chrono::{DateTime, Utc};

/// Identity of the running build, supplied by the host and immutable for the
/// process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildIdentity {
    /// Monotonically increasing release identifier.
    pub version_code: i64,
    /// Human-readable version string.
    pub version_name: String,
    /// When this binary was built.
    pub build_time: DateTime<Utc>,
}
