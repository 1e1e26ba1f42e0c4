//! `resources/missing-requests` and `resources/missing-limits` (WARNING, §4.6.a).

use super::{ContentAnalyzer, containers, pod_spec, resource_label};
use crate::finding::{AnalysisResult, Severity};
use crate::identity::ManifestIdentity;
use crate::value::Value;

pub struct ResourceAnalyzer;

impl ContentAnalyzer for ResourceAnalyzer {
  fn name(&self) -> &'static str {
    "resources"
  }

  fn analyze(&self, document: &Value, identity: &ManifestIdentity) -> Vec<AnalysisResult> {
    let (kind, name) = resource_label(identity);
    let Some(spec) = pod_spec(document, &kind) else {
      return Vec::new();
    };

    let mut findings = Vec::new();
    for container in containers(spec) {
      let container_name = container.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
      let resources = container.get("resources").and_then(Value::as_map);
      let has_requests = resources.map(|r| r.contains_key("requests")).unwrap_or(false);
      let has_limits = resources.map(|r| r.contains_key("limits")).unwrap_or(false);

      if !has_requests {
        findings.push(
          AnalysisResult::new(self.name(), Severity::Warning, format!("container '{container_name}' has no resources.requests"))
            .on(&kind, &name)
            .rule("resources/missing-requests")
            .suggest("set cpu/memory requests so the scheduler can place the pod correctly"),
        );
      }
      if !has_limits {
        findings.push(
          AnalysisResult::new(self.name(), Severity::Warning, format!("container '{container_name}' has no resources.limits"))
            .on(&kind, &name)
            .rule("resources/missing-limits")
            .suggest("set cpu/memory limits to bound container resource usage"),
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
    ResourceAnalyzer.analyze(&document, &identities[0])
  }

  #[test]
  fn missing_both_yields_two_findings() {
    let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\nspec:\n  containers:\n    - name: app\n      image: nginx:1.25\n";
    assert_eq!(analyze(text).len(), 2);
  }

  #[test]
  fn both_present_passes() {
    let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\nspec:\n  containers:\n    - name: app\n      image: nginx:1.25\n      resources:\n        requests:\n          cpu: 100m\n        limits:\n          cpu: 200m\n";
    assert!(analyze(text).is_empty());
  }
}
