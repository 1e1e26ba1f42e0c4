//! `images/no-latest` (ERROR): every container must pin an explicit, non-`latest` tag (§4.6.a).

use super::{ContentAnalyzer, containers, pod_spec, resource_label};
use crate::finding::{AnalysisResult, Severity};
use crate::identity::ManifestIdentity;
use crate::value::Value;

pub struct ImageAnalyzer;

impl ContentAnalyzer for ImageAnalyzer {
  fn name(&self) -> &'static str {
    "images"
  }

  fn analyze(&self, document: &Value, identity: &ManifestIdentity) -> Vec<AnalysisResult> {
    let (kind, name) = resource_label(identity);
    let Some(spec) = pod_spec(document, &kind) else {
      return Vec::new();
    };

    containers(spec)
      .into_iter()
      .filter_map(|container| {
        let container_name = container.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
        let image = container.get("image").and_then(Value::as_str).unwrap_or("");
        let offending = match image.rsplit_once(':') {
          None => Some("missing tag".to_owned()),
          Some((_, "latest")) => Some("uses the ':latest' tag".to_owned()),
          Some(_) => None,
        };
        offending.map(|reason| {
          AnalysisResult::new(self.name(), Severity::Error, format!("container '{container_name}' {reason}"))
            .on(&kind, &name)
            .rule("images/no-latest")
            .suggest("pin an explicit, immutable tag or digest")
        })
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer;
  use crate::scanner;
  use crate::shadow;
  use crate::structurer;
  use crate::audit::AuditLog;

  fn analyze(text: &str) -> Vec<AnalysisResult> {
    let (mut shards, _) = lexer::lex(text);
    shadow::attach(text, &mut shards);
    let mut audit_log = AuditLog::new();
    let identities = scanner::scan(&shards, false, None, &mut audit_log);
    let document = structurer::build(&shards).document;
    ImageAnalyzer.analyze(&document, &identities[0])
  }

  #[test]
  fn flags_missing_tag_and_latest() {
    let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\nspec:\n  containers:\n    - name: app\n      image: nginx\n";
    let findings = analyze(text);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule_id.as_deref(), Some("images/no-latest"));
  }

  #[test]
  fn pinned_tag_passes() {
    let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\nspec:\n  containers:\n    - name: app\n      image: nginx:1.25\n";
    assert!(analyze(text).is_empty());
  }
}
