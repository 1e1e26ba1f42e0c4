//! Options and shared mutable state threaded through one `heal()` run (§5, §6).

use serde::{Deserialize, Serialize};

use crate::audit::AuditLog;
use crate::identity::ManifestIdentity;
use crate::shard::Shard;
use crate::value::Value;
use crate::version::ClusterVersion;

/// Maps `heal(raw_text, options)`'s options onto a struct (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunOptions {
  /// Scanner uses a strict identity filter (kind+apiVersion both required) when true;
  /// permissive inference otherwise.
  pub strict_validation: bool,
  /// Forces the Serializer into indent=2/sequence=2/offset=0 output.
  pub compact: bool,
  /// `vMAJOR.MINOR`; defaults to [`crate::version::DEFAULT`] when absent.
  pub cluster_version: Option<String>,
  /// Opaque string propagated onto findings and identities for diagnostics.
  pub file_path: Option<String>,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self { strict_validation: false, compact: false, cluster_version: None, file_path: None }
  }
}

impl RunOptions {
  /// Resolves the explicit option, then `YAMLR_KUBE_VERSION`/`AKESO_KUBE_VERSION`, then the
  /// built-in default (§6 "Environment variables read by the core").
  pub fn target_version(&self) -> ClusterVersion {
    self
      .cluster_version
      .as_deref()
      .map(str::to_owned)
      .or_else(|| std::env::var("YAMLR_KUBE_VERSION").ok())
      .or_else(|| std::env::var("AKESO_KUBE_VERSION").ok())
      .and_then(|raw| ClusterVersion::parse(&raw).ok())
      .unwrap_or_else(ClusterVersion::default_target)
  }
}

/// Owns the shards, identities, and reconstructed documents for one run; consumed when the
/// pipeline returns (§5).
pub struct HealContext {
  pub options: RunOptions,
  pub shards: Vec<Shard>,
  pub majority_indent: usize,
  pub documents: Vec<Value>,
  pub identities: Vec<ManifestIdentity>,
  pub audit_log: AuditLog,
}

impl HealContext {
  pub fn new(options: RunOptions) -> Self {
    Self {
      options,
      shards: Vec::new(),
      majority_indent: 2,
      documents: Vec::new(),
      identities: Vec::new(),
      audit_log: AuditLog::new(),
    }
  }
}
