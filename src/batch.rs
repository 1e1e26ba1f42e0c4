//! Embarrassingly-parallel batch file processing (§5): each file's pipeline run is independent;
//! the only shared state is the identity list passed to batch analyzers after every file
//! finishes. The generalized counterpart of the teacher's `analysis::Results`.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::analyzer::Registry;
use crate::audit::AuditLog;
use crate::context::RunOptions;
use crate::finding::AnalysisResult;
use crate::identity::ManifestIdentity;
use crate::pipeline::{self, HealOutcome};

#[derive(Serialize, Deserialize)]
pub struct FileOutcome {
  pub file_path: String,
  pub healed_text: String,
  pub score: u32,
  pub changed: bool,
  pub findings: Vec<AnalysisResult>,
  pub audit_log: AuditLog,
}

#[derive(Serialize, Deserialize)]
pub struct BatchReport {
  pub files: Vec<FileOutcome>,
  /// Every content-analyzer finding plus the cross-file batch-analyzer findings computed once
  /// over the full aggregated identity set (§4.6.b).
  pub findings: Vec<AnalysisResult>,
}

impl BatchReport {
  pub fn exit_code(&self) -> i32 {
    let any_change = self.files.iter().any(|f| f.changed);
    let any_error = self.findings.iter().any(|f| f.severity == crate::finding::Severity::Error);
    if any_change || any_error { 1 } else { 0 }
  }
}

/// Runs `heal()` over every input using a small scoped-thread worker pool sized to the machine
/// (§5: file-level healing is pure CPU work, so a plain thread pool is used instead of pulling
/// an async runtime into the core), then re-runs the cross-resource batch analyzer once over
/// every file's aggregated identities so Ghost Service and friends see the whole run, not just
/// one file.
///
/// Ordering: findings within one file preserve analyzer registration order; findings across
/// files are ordered by completion and must not be relied on (§5) — callers that need stable
/// output should sort before rendering.
pub fn run(inputs: &[(String, String)], options: &RunOptions) -> BatchReport {
  let per_file: Vec<(HealOutcome, String)> = run_pool(inputs, options);

  let mut all_identities: Vec<ManifestIdentity> = Vec::new();
  let mut files = Vec::with_capacity(per_file.len());
  let mut findings = Vec::new();

  for (outcome, file_path) in per_file {
    let content_findings: Vec<AnalysisResult> = outcome.findings.into_iter().filter(|f| f.analyzer_name != "cross_resource").collect();
    findings.extend(content_findings.clone());
    let changed = outcome.audit_log.entries.iter().any(|e| e.action_type == "MIGRATED" || e.action_type == "SYNTHESIZED_KEY");
    all_identities.extend(outcome.identities.clone());
    files.push(FileOutcome {
      file_path,
      healed_text: outcome.healed_text,
      score: outcome.score,
      changed,
      findings: content_findings,
      audit_log: outcome.audit_log,
    });
  }

  let mut batch_audit = AuditLog::new();
  findings.extend(Registry::with_builtins().run_batch(&all_identities, &mut batch_audit));

  BatchReport { files, findings }
}

/// Work-stealing pool of scoped threads, sized to the available parallelism. Each worker pulls
/// the next unclaimed index from a shared counter until the input slice is exhausted.
fn run_pool(inputs: &[(String, String)], options: &RunOptions) -> Vec<(HealOutcome, String)> {
  if inputs.is_empty() {
    return Vec::new();
  }

  let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).min(inputs.len());
  let next = AtomicUsize::new(0);
  let slots: Mutex<Vec<Option<(HealOutcome, String)>>> = Mutex::new((0..inputs.len()).map(|_| None).collect());

  std::thread::scope(|scope| {
    for _ in 0..worker_count {
      let next = &next;
      let slots = &slots;
      scope.spawn(move || {
        loop {
          let idx = next.fetch_add(1, Ordering::Relaxed);
          if idx >= inputs.len() {
            break;
          }
          let (file_path, raw_text) = &inputs[idx];
          let mut file_options = options.clone();
          file_options.file_path = Some(file_path.clone());
          let outcome = pipeline::heal(raw_text, &file_options);
          slots.lock().expect("batch worker mutex poisoned")[idx] = Some((outcome, file_path.clone()));
        }
      });
    }
  });

  slots.into_inner().expect("batch worker mutex poisoned").into_iter().map(|slot| slot.expect("every index is claimed exactly once")).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ghost_service_is_detected_across_files() {
    let inputs = vec![
      ("service.yaml".to_string(), "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\nspec:\n  selector:\n    app: web\n".to_string()),
      (
        "deployment.yaml".to_string(),
        "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  template:\n    metadata:\n      labels:\n        app: web\n".to_string(),
      ),
    ];
    let report = run(&inputs, &RunOptions::default());
    assert!(!report.findings.iter().any(|f| f.rule_id.as_deref() == Some("cross_resource/ghost-service")));
  }

  #[test]
  fn exit_code_is_nonzero_when_a_file_changes() {
    let inputs = vec![(
      "deploy.yaml".to_string(),
      "apiVersion: extensions/v1beta1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  template:\n    metadata:\n      labels:\n        app: web\n".to_string(),
    )];
    let options = RunOptions { cluster_version: Some("v1.30".into()), ..RunOptions::default() };
    let report = run(&inputs, &options);
    assert_eq!(report.exit_code(), 1);
  }
}
