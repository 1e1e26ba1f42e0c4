//! `probes/missing-liveness` and `probes/missing-readiness` (WARNING, workloads only, §4.6.a).

use super::{ContentAnalyzer, containers, is_workload_kind, pod_spec, resource_label};
use crate::finding::{AnalysisResult, Severity};
use crate::identity::ManifestIdentity;
use crate::value::Value;

pub struct ProbeAnalyzer;

impl ContentAnalyzer for ProbeAnalyzer {
  fn name(&self) -> &'static str {
    "probes"
  }

  fn analyze(&self, document: &Value, identity: &ManifestIdentity) -> Vec<AnalysisResult> {
    let (kind, name) = resource_label(identity);
    if !is_workload_kind(&kind) {
      return Vec::new();
    }
    let Some(spec) = pod_spec(document, &kind) else {
      return Vec::new();
    };

    let mut findings = Vec::new();
    for container in containers(spec) {
      let container_name = container.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
      if !container.contains_key("livenessProbe") {
        findings.push(
          AnalysisResult::new(self.name(), Severity::Warning, format!("container '{container_name}' has no livenessProbe"))
            .on(&kind, &name)
            .rule("probes/missing-liveness")
            .suggest("add a livenessProbe so the kubelet can restart a wedged container"),
        );
      }
      if !container.contains_key("readinessProbe") {
        findings.push(
          AnalysisResult::new(self.name(), Severity::Warning, format!("container '{container_name}' has no readinessProbe"))
            .on(&kind, &name)
            .rule("probes/missing-readiness")
            .suggest("add a readinessProbe so traffic isn't routed before the container is ready"),
        );
      }
    }
    findings
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::audit::AuditLog;
  use crate::lexer;
  use crate::scanner;
  use crate::shadow;
  use crate::structurer;

  fn analyze(text: &str) -> Vec<AnalysisResult> {
    let (mut shards, _) = lexer::lex(text);
    shadow::attach(text, &mut shards);
    let mut audit_log = AuditLog::new();
    let identities = scanner::scan(&shards, false, None, &mut audit_log);
    let document = structurer::build(&shards).document;
    ProbeAnalyzer.analyze(&document, &identities[0])
  }

  #[test]
  fn missing_probes_on_deployment_flagged() {
    let text = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  template:\n    spec:\n      containers:\n        - name: app\n          image: nginx:1.25\n";
    let findings = analyze(text);
    assert_eq!(findings.len(), 2);
  }

  #[test]
  fn non_workload_kind_is_skipped() {
    let text = "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\nspec:\n  selector:\n    app: web\n";
    assert!(analyze(text).is_empty());
  }
}
