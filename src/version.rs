//! Kubernetes cluster version parsing and comparison, normalized to `vMAJOR.MINOR`.

use std::cmp::Ordering;
use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default target cluster version when `RunOptions::cluster_version` is absent (§6).
pub const DEFAULT: &str = "v1.31";

/// A normalized `vMAJOR.MINOR` Kubernetes version. Patch versions are parsed but ignored for
/// comparison, matching the Migrator's removal-version check (§4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterVersion {
  pub major: u32,
  pub minor: u32,
}

impl ClusterVersion {
  /// Parses a version in any of the forms Kubernetes and its distributions use:
  /// `v1.30`, `1.30`, `v1.30.2`, `1.30.2+`, `v1.30.2-eks-1234`.
  pub fn parse(raw: &str) -> Result<Self> {
    let trimmed = raw.trim().trim_start_matches('v').trim_end_matches('+');
    let mut parts = trimmed.split('.');
    let major = parts.next().context(format!("invalid version '{raw}'"))?;
    let minor = parts.next().context(format!("invalid version '{raw}', expected 'X.Y[.Z]'"))?;
    // Patch may carry a distro suffix (`2-eks-1234`); take only the leading digits.
    let major: u32 = major.chars().take_while(|c| c.is_ascii_digit()).collect::<String>().parse()?;
    let minor_digits: String = minor.chars().take_while(|c| c.is_ascii_digit()).collect();
    let minor: u32 = minor_digits.parse().context(format!("invalid minor version in '{raw}'"))?;
    Ok(Self { major, minor })
  }

  pub fn default_target() -> Self {
    Self::parse(DEFAULT).expect("DEFAULT is a valid version literal")
  }
}

impl PartialOrd for ClusterVersion {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for ClusterVersion {
  fn cmp(&self, other: &Self) -> Ordering {
    self.major.cmp(&other.major).then(self.minor.cmp(&other.minor))
  }
}

impl fmt::Display for ClusterVersion {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "v{}.{}", self.major, self.minor)
  }
}
