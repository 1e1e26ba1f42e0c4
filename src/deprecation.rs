//! Static deprecation database (§4.7): a compile-time table, keyed by `(apiVersion, kind)`,
//! of removed and soon-to-be-removed Kubernetes APIs and the migration strategy each uses.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};

use crate::version::ClusterVersion;

/// Severity carried by a deprecation entry itself, independent of [`crate::finding::Severity`]:
/// an API that is merely deprecated (not yet removed) is WARNING; past its removal version it's
/// REMOVED.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeprecationSeverity {
  #[serde(rename = "WARNING")]
  Warning,
  #[serde(rename = "REMOVED")]
  Removed,
}

/// The mechanical fix the Migrator applies when an identity's removal version has been reached
/// (§4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
  #[serde(rename = "NONE")]
  None,
  #[serde(rename = "REPLACE_API_VERSION")]
  ReplaceApiVersion,
  #[serde(rename = "DEPLOYMENT_SELECTOR")]
  DeploymentSelector,
  #[serde(rename = "INGRESS_V1")]
  IngressV1,
  #[serde(rename = "CRONJOB_V1")]
  CronJobV1,
}

/// One entry of the deprecation table (§3 `DeprecationInfo`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeprecationInfo {
  pub deprecated_api: String,
  pub replacement_api: Option<String>,
  pub deprecated_in: String,
  pub removed_in: String,
  pub kind: String,
  pub severity: DeprecationSeverity,
  pub migration_notes: String,
  pub strategy: Strategy,
}

impl DeprecationInfo {
  pub fn removed_in_version(&self) -> Result<ClusterVersion> {
    ClusterVersion::parse(&self.removed_in).context("deprecation table entry has an invalid removed_in version")
  }

  pub fn deprecated_in_version(&self) -> Result<ClusterVersion> {
    ClusterVersion::parse(&self.deprecated_in).context("deprecation table entry has an invalid deprecated_in version")
  }

  /// True once `target_version` has reached or passed this entry's removal version (§4.5).
  pub fn is_removed_at(&self, target_version: ClusterVersion) -> bool {
    self.removed_in_version().map(|removed| removed <= target_version).unwrap_or(false)
  }
}

#[derive(RustEmbed)]
#[folder = "data/"]
struct Data;

/// `(apiVersion, kind)` lookup key into the deprecation table.
pub type GroupVersionKind = (String, String);

pub struct DeprecationTable {
  entries: HashMap<GroupVersionKind, DeprecationInfo>,
}

impl DeprecationTable {
  fn load() -> Result<Self> {
    let file = Data::get("deprecations.yaml").context("embedded deprecations.yaml is missing")?;
    let contents = std::str::from_utf8(file.data.as_ref()).context("deprecations.yaml is not valid UTF-8")?;
    let raw: Vec<DeprecationInfo> = serde_yaml::from_str(contents).context("failed to parse deprecations.yaml")?;

    let mut entries = HashMap::with_capacity(raw.len());
    for info in raw {
      entries.insert((info.deprecated_api.clone(), info.kind.clone()), info);
    }
    Ok(Self { entries })
  }

  pub fn lookup(&self, api_version: &str, kind: &str) -> Option<&DeprecationInfo> {
    self.entries.get(&(api_version.to_owned(), kind.to_owned()))
  }
}

/// The table is embedded data parsed once and shared read-only across a batch run (§5).
pub fn table() -> &'static DeprecationTable {
  static TABLE: OnceLock<DeprecationTable> = OnceLock::new();
  TABLE.get_or_init(|| DeprecationTable::load().expect("embedded deprecation table is well-formed"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn looks_up_known_removal() {
    let info = table().lookup("extensions/v1beta1", "Deployment").unwrap();
    assert_eq!(info.replacement_api.as_deref(), Some("apps/v1"));
    assert_eq!(info.strategy, Strategy::DeploymentSelector);
  }

  #[test]
  fn unknown_gvk_is_absent() {
    assert!(table().lookup("v1", "Pod").is_none());
  }

  #[test]
  fn is_removed_at_respects_target_version() {
    let info = table().lookup("batch/v1beta1", "CronJob").unwrap();
    assert!(info.is_removed_at(ClusterVersion::parse("v1.25").unwrap()));
    assert!(!info.is_removed_at(ClusterVersion::parse("v1.20").unwrap()));
  }

  #[test]
  fn pod_security_policy_has_no_replacement() {
    let info = table().lookup("policy/v1beta1", "PodSecurityPolicy").unwrap();
    assert!(info.replacement_api.is_none());
    assert_eq!(info.strategy, Strategy::None);
  }
}
