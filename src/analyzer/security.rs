//! `security/run-as-non-root` and `security/no-privileged` (both ERROR, §4.6.a).

use super::{ContentAnalyzer, containers, pod_spec, resource_label};
use crate::finding::{AnalysisResult, Severity};
use crate::identity::ManifestIdentity;
use crate::value::Value;

pub struct SecurityAnalyzer;

impl ContentAnalyzer for SecurityAnalyzer {
  fn name(&self) -> &'static str {
    "security"
  }

  fn analyze(&self, document: &Value, identity: &ManifestIdentity) -> Vec<AnalysisResult> {
    let (kind, name) = resource_label(identity);
    let Some(spec) = pod_spec(document, &kind) else {
      return Vec::new();
    };

    let mut findings = Vec::new();

    let run_as_non_root = spec
      .get("securityContext")
      .and_then(Value::as_map)
      .and_then(|sc| sc.get("runAsNonRoot"))
      .map(|v| matches!(v, Value::Bool(true)))
      .unwrap_or(false);
    if !run_as_non_root {
      findings.push(
        AnalysisResult::new(self.name(), Severity::Error, "pod does not set securityContext.runAsNonRoot: true")
          .on(&kind, &name)
          .rule("security/run-as-non-root")
          .suggest("set spec.securityContext.runAsNonRoot: true"),
      );
    }

    for container in containers(spec) {
      let container_name = container.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
      let privileged = container
        .get("securityContext")
        .and_then(Value::as_map)
        .and_then(|sc| sc.get("privileged"))
        .map(|v| matches!(v, Value::Bool(true)))
        .unwrap_or(false);
      if privileged {
        findings.push(
          AnalysisResult::new(self.name(), Severity::Error, format!("container '{container_name}' runs privileged"))
            .on(&kind, &name)
            .rule("security/no-privileged")
            .suggest("remove securityContext.privileged or scope it to the specific capability needed"),
        );
      }
    }

    findings
  }
}
