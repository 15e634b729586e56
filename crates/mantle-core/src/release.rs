use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInfo {
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Error)]
pub enum ReleaseParseError {
    #[error("failed to parse release metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error("release metadata lists no assets")]
    NoAssets,
    #[error("asset name {name:?} carries no version code")]
    AssetName { name: String },
}

/// Extract the release code from an asset file name.
///
/// Names look like `framework-tag-4020-release.zip`: hyphen-delimited with
/// the version code in the third field. The name is split into at most four
/// parts, so any further hyphens stay in the trailing token.
///
/// # Errors
/// Returns an error when the third field is missing or not a base-10
/// integer.
pub fn version_code_from_asset(name: &str) -> Result<i64, ReleaseParseError> {
    name.splitn(4, '-')
        .nth(2)
        .and_then(|field| field.parse().ok())
        .ok_or_else(|| ReleaseParseError::AssetName {
            name: name.to_owned(),
        })
}

/// Version code advertised by a release-metadata body: the code embedded in
/// the first asset's file name.
///
/// # Errors
/// Returns an error when the body is not valid JSON, lists no assets, or
/// the first asset's name carries no version code.
pub fn latest_version_code(body: &[u8]) -> Result<i64, ReleaseParseError> {
    let info: ReleaseInfo = serde_json::from_slice(body)?;
    let asset = info.assets.first().ok_or(ReleaseParseError::NoAssets)?;
    version_code_from_asset(&asset.name)
}
