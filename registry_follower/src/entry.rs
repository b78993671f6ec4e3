use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The subset of a package document that gets persisted: one record per package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    pub versions: Vec<VersionEntry>,
}

/// Per-version license and dependency data, carried through untouched.
///
/// `repo` is only set when the version points somewhere other than the
/// package-level repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Value>,
    #[serde(
        rename = "devDependencies",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dev_dependencies: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

impl PackageEntry {
    pub fn has_repo(&self) -> bool {
        self.repo.is_some() || self.versions.iter().any(|v| v.repo.is_some())
    }
}
