//! The pluggable analyzer framework (§4.6). A registry owns singletons keyed by name; each
//! analyzer is `metadata`, `content`, or `batch` and must be side-effect-free. An analyzer
//! panic is isolated — the orchestrator logs it and the remaining analyzers still run.

pub mod cross_resource;
pub mod image;
pub mod probes;
pub mod resources;
pub mod security;

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::audit::{AuditLog, AuditSeverity, HealAction, Stage};
use crate::finding::AnalysisResult;
use crate::identity::ManifestIdentity;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalyzerKind {
  Metadata,
  Content,
  Batch,
}

/// Receives the reconstructed document tree of one document plus its identity (§4.6: `content`).
pub trait ContentAnalyzer: Send + Sync {
  fn name(&self) -> &'static str;
  fn analyze(&self, document: &Value, identity: &ManifestIdentity) -> Vec<AnalysisResult>;
}

/// Receives the identity set aggregated across every file of the run (§4.6: `batch`).
pub trait BatchAnalyzer: Send + Sync {
  fn name(&self) -> &'static str;
  fn analyze(&self, identities: &[ManifestIdentity]) -> Vec<AnalysisResult>;
}

pub struct Registry {
  content: Vec<Box<dyn ContentAnalyzer>>,
  batch: Vec<Box<dyn BatchAnalyzer>>,
}

impl Registry {
  pub fn with_builtins() -> Self {
    Self {
      content: vec![
        Box::new(image::ImageAnalyzer),
        Box::new(resources::ResourceAnalyzer),
        Box::new(security::SecurityAnalyzer),
        Box::new(probes::ProbeAnalyzer),
      ],
      batch: vec![Box::new(cross_resource::CrossResourceAnalyzer)],
    }
  }

  /// Runs every registered content analyzer, in registration order, isolating panics (§4.6,
  /// §7 "Analyzer exception").
  pub fn run_content(&self, document: &Value, identity: &ManifestIdentity, audit_log: &mut AuditLog) -> Vec<AnalysisResult> {
    let mut findings = Vec::new();
    for analyzer in &self.content {
      match catch_unwind(AssertUnwindSafe(|| analyzer.analyze(document, identity))) {
        Ok(mut results) => findings.append(&mut results),
        Err(_) => audit_log.push(HealAction::new(
          Stage::Analyzer,
          "ANALYZER_PANIC",
          analyzer.name(),
          format!("analyzer '{}' panicked and was skipped", analyzer.name()),
          AuditSeverity::Error,
        )),
      }
    }
    findings
  }

  pub fn run_batch(&self, identities: &[ManifestIdentity], audit_log: &mut AuditLog) -> Vec<AnalysisResult> {
    let mut findings = Vec::new();
    for analyzer in &self.batch {
      match catch_unwind(AssertUnwindSafe(|| analyzer.analyze(identities))) {
        Ok(mut results) => findings.append(&mut results),
        Err(_) => audit_log.push(HealAction::new(
          Stage::Analyzer,
          "ANALYZER_PANIC",
          analyzer.name(),
          format!("analyzer '{}' panicked and was skipped", analyzer.name()),
          AuditSeverity::Error,
        )),
      }
    }
    findings
  }
}

impl Default for Registry {
  fn default() -> Self {
    Self::with_builtins()
  }
}

/// Resource kind/name label shared by every content analyzer when building a finding.
pub(crate) fn resource_label(identity: &ManifestIdentity) -> (String, String) {
  (identity.kind.clone().unwrap_or_default(), identity.name.clone().unwrap_or_default())
}

pub(crate) fn is_workload_kind(kind: &str) -> bool {
  matches!(kind, "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Job" | "CronJob" | "Pod")
}

/// Walks `spec.template.spec.containers` (workloads) or `spec.containers` (bare Pod), falling
/// back to an empty slice when the path is absent so analyzers never need to branch on shape.
pub(crate) fn pod_spec<'a>(document: &'a Value, kind: &str) -> Option<&'a crate::value::Mapping> {
  let root = document.as_map()?;
  if kind == "Pod" {
    root.get("spec").and_then(Value::as_map)
  } else {
    root.get_path("spec.template.spec").and_then(Value::as_map)
  }
}

pub(crate) fn containers<'a>(pod_spec: &'a crate::value::Mapping) -> Vec<&'a crate::value::Mapping> {
  pod_spec.get("containers").and_then(Value::as_seq).map(|seq| seq.iter().filter_map(Value::as_map).collect()).unwrap_or_default()
}
