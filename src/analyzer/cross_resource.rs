//! The cross-resource graph analyzer (§4.6.b): Ghost Service, Orphan Config, Broken Volume,
//! Service Port Mismatch, and Ingress Backend, run once over the identity set aggregated
//! across every file of the run.

use indexmap::IndexMap;
use strsim::normalized_levenshtein;

use super::BatchAnalyzer;
use crate::finding::{AnalysisResult, Severity};
use crate::identity::ManifestIdentity;

pub struct CrossResourceAnalyzer;

fn namespace_of(identity: &ManifestIdentity) -> &str {
  identity.namespace.as_deref().unwrap_or("default")
}

fn labels_superset(labels: &IndexMap<String, String>, selector: &IndexMap<String, String>) -> bool {
  !selector.is_empty() && selector.iter().all(|(k, v)| labels.get(k).map(|lv| lv.trim() == v.trim()).unwrap_or(false))
}

fn is_workload_kind(kind: &str) -> bool {
  super::is_workload_kind(kind)
}

struct GhostCandidate {
  workload: String,
  score: f64,
  diff: Vec<(String, String, String)>, // (selector key, selector value, workload's closest value)
}

/// Average value-similarity over selector keys that exist verbatim in the workload's labels.
/// `None` when any selector key is absent under its own name (that case is covered by the
/// fuzzy key-match pass below instead).
fn exact_key_candidate(selector: &IndexMap<String, String>, labels: &IndexMap<String, String>) -> Option<(f64, Vec<(String, String, String)>)> {
  let mut total = 0.0;
  let mut diffs = Vec::new();
  for (k, v) in selector {
    let label_value = labels.get(k)?;
    total += normalized_levenshtein(v, label_value);
    diffs.push((k.clone(), v.clone(), label_value.clone()));
  }
  let avg = total / selector.len() as f64;
  if (0.75..1.0).contains(&avg) { Some((avg, diffs)) } else { None }
}

/// For every selector `k=v`, finds the workload's closest `wk=wv` pair irrespective of key name;
/// a score-0.9 candidate if every selector item clears the 0.85 threshold.
fn fuzzy_pair_candidate(selector: &IndexMap<String, String>, labels: &IndexMap<String, String>) -> Option<(f64, Vec<(String, String, String)>)> {
  let mut diffs = Vec::new();
  for (k, v) in selector {
    let needle = format!("{k}={v}");
    let best = labels.iter().map(|(lk, lv)| (format!("{lk}={lv}"), normalized_levenshtein(&needle, &format!("{lk}={lv}")))).max_by(|a, b| a.1.total_cmp(&b.1))?;
    if best.1 <= 0.85 {
      return None;
    }
    diffs.push((k.clone(), v.clone(), best.0));
  }
  Some((0.9, diffs))
}

fn ghost_service_findings(identities: &[ManifestIdentity]) -> Vec<AnalysisResult> {
  let mut findings = Vec::new();

  for service in identities.iter().filter(|i| i.kind.as_deref() == Some("Service") && !i.selector.is_empty()) {
    let service_ns = namespace_of(service);
    let same_ns_match = identities.iter().any(|w| is_workload_kind(w.kind.as_deref().unwrap_or("")) && namespace_of(w) == service_ns && labels_superset(&w.labels, &service.selector));
    if same_ns_match {
      continue;
    }

    let foreign = identities.iter().find(|w| is_workload_kind(w.kind.as_deref().unwrap_or("")) && namespace_of(w) != service_ns && labels_superset(&w.labels, &service.selector));
    if let Some(workload) = foreign {
      findings.push(
        AnalysisResult::new("cross_resource", Severity::Warning, format!("Service selector matches no workload in namespace '{service_ns}'"))
          .on("Service", service.name.clone().unwrap_or_default())
          .rule("cross_resource/ghost-service")
          .suggest(format!("matching labels found on {}/{} in namespace '{}'", workload.kind.as_deref().unwrap_or(""), workload.name.as_deref().unwrap_or(""), namespace_of(workload))),
      );
      continue;
    }

    let mut best: Option<GhostCandidate> = None;
    for workload in identities.iter().filter(|w| is_workload_kind(w.kind.as_deref().unwrap_or(""))) {
      let candidate = exact_key_candidate(&service.selector, &workload.labels).or_else(|| fuzzy_pair_candidate(&service.selector, &workload.labels));
      if let Some((score, diff)) = candidate {
        if best.as_ref().map(|b| score > b.score).unwrap_or(true) {
          best = Some(GhostCandidate { workload: format!("{}/{}", workload.kind.as_deref().unwrap_or(""), workload.name.as_deref().unwrap_or("")), score, diff });
        }
      }
    }

    let message = if let Some(candidate) = &best {
      let hints = candidate.diff.iter().map(|(k, selected, found)| format!("{k}: {found} (selector has {k}: {selected})")).collect::<Vec<_>>().join(", ");
      format!("Service selector matches no workload; did you mean {} — {hints}?", candidate.workload)
    } else {
      "Service selector matches no workload in any namespace".to_owned()
    };
    findings.push(AnalysisResult::new("cross_resource", Severity::Warning, message).on("Service", service.name.clone().unwrap_or_default()).rule("cross_resource/ghost-service"));
  }

  findings
}

fn orphan_config_findings(identities: &[ManifestIdentity]) -> Vec<AnalysisResult> {
  let mut findings = Vec::new();
  for config in identities.iter().filter(|i| matches!(i.kind.as_deref(), Some("ConfigMap") | Some("Secret"))) {
    let Some(name) = &config.name else { continue };
    let referenced = identities.iter().any(|w| is_workload_kind(w.kind.as_deref().unwrap_or("")) && namespace_of(w) == namespace_of(config) && w.config_refs.contains(name));
    if !referenced {
      findings.push(
        AnalysisResult::new("cross_resource", Severity::Warning, format!("{} '{name}' is not referenced by any workload", config.kind.as_deref().unwrap_or("")))
          .on(config.kind.as_deref().unwrap_or(""), name)
          .rule("cross_resource/orphan-config"),
      );
    }
  }
  findings
}

fn broken_volume_findings(identities: &[ManifestIdentity]) -> Vec<AnalysisResult> {
  let mut findings = Vec::new();
  for workload in identities.iter().filter(|i| is_workload_kind(i.kind.as_deref().unwrap_or(""))) {
    for claim in &workload.volume_refs {
      let exists = identities.iter().any(|p| p.kind.as_deref() == Some("PersistentVolumeClaim") && namespace_of(p) == namespace_of(workload) && p.name.as_deref() == Some(claim.as_str()));
      if !exists {
        findings.push(
          AnalysisResult::new("cross_resource", Severity::Error, format!("volume references PersistentVolumeClaim '{claim}' which does not exist"))
            .on(workload.kind.as_deref().unwrap_or(""), workload.name.clone().unwrap_or_default())
            .rule("cross_resource/broken-volume"),
        );
      }
    }
  }
  findings
}

fn service_port_mismatch_findings(identities: &[ManifestIdentity]) -> Vec<AnalysisResult> {
  let mut findings = Vec::new();
  for service in identities.iter().filter(|i| i.kind.as_deref() == Some("Service") && !i.selector.is_empty()) {
    for workload in identities.iter().filter(|w| is_workload_kind(w.kind.as_deref().unwrap_or("")) && namespace_of(w) == namespace_of(service) && labels_superset(&w.labels, &service.selector)) {
      for port in &service.service_ports {
        let target = port.target_port.as_deref().or(port.port.as_deref());
        let Some(target) = target else { continue };
        if !workload.container_ports.iter().any(|p| p == target) {
          findings.push(
            AnalysisResult::new("cross_resource", Severity::Error, format!("targetPort '{target}' does not match any container port on {}/{}", workload.kind.as_deref().unwrap_or(""), workload.name.as_deref().unwrap_or("")))
              .on("Service", service.name.clone().unwrap_or_default())
              .rule("cross_resource/service-port-mismatch"),
          );
        }
      }
    }
  }
  findings
}

fn ingress_backend_findings(identities: &[ManifestIdentity]) -> Vec<AnalysisResult> {
  let mut findings = Vec::new();
  for ingress in identities.iter().filter(|i| i.kind.as_deref() == Some("Ingress")) {
    for backend in &ingress.ingress_backends {
      let Some(service_name) = &backend.service else { continue };
      let service = identities.iter().find(|s| s.kind.as_deref() == Some("Service") && namespace_of(s) == namespace_of(ingress) && s.name.as_deref() == Some(service_name.as_str()));
      let Some(service) = service else {
        findings.push(
          AnalysisResult::new("cross_resource", Severity::Error, format!("backend references Service '{service_name}' which does not exist"))
            .on("Ingress", ingress.name.clone().unwrap_or_default())
            .rule("cross_resource/ingress-backend"),
        );
        continue;
      };
      let Some(port) = &backend.port else { continue };
      let allowed: Vec<&str> = service
        .service_ports
        .iter()
        .flat_map(|p| [p.port.as_deref(), p.target_port.as_deref(), p.name.as_deref()])
        .flatten()
        .collect();
      if !allowed.contains(&port.as_str()) {
        findings.push(
          AnalysisResult::new("cross_resource", Severity::Error, format!("backend port '{port}' does not match any port exposed by Service '{service_name}'"))
            .on("Ingress", ingress.name.clone().unwrap_or_default())
            .rule("cross_resource/ingress-backend")
            .suggest(format!("allowed ports: {}", allowed.join(", "))),
        );
      }
    }
  }
  findings
}

impl BatchAnalyzer for CrossResourceAnalyzer {
  fn name(&self) -> &'static str {
    "cross_resource"
  }

  fn analyze(&self, identities: &[ManifestIdentity]) -> Vec<AnalysisResult> {
    let mut findings = ghost_service_findings(identities);
    findings.extend(orphan_config_findings(identities));
    findings.extend(broken_volume_findings(identities));
    findings.extend(service_port_mismatch_findings(identities));
    findings.extend(ingress_backend_findings(identities));
    findings
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn workload(name: &str, labels: &[(&str, &str)]) -> ManifestIdentity {
    let mut identity = ManifestIdentity::new(0);
    identity.kind = Some("Deployment".into());
    identity.name = Some(name.into());
    for (k, v) in labels {
      identity.labels.insert(k.to_string(), v.to_string());
    }
    identity
  }

  fn service(name: &str, selector: &[(&str, &str)]) -> ManifestIdentity {
    let mut identity = ManifestIdentity::new(0);
    identity.kind = Some("Service".into());
    identity.name = Some(name.into());
    for (k, v) in selector {
      identity.selector.insert(k.to_string(), v.to_string());
    }
    identity
  }

  #[test]
  fn matching_selector_yields_no_finding() {
    let identities = vec![service("web", &[("app", "web")]), workload("web", &[("app", "web")])];
    assert!(CrossResourceAnalyzer.analyze(&identities).is_empty());
  }

  #[test]
  fn typo_in_selector_value_suggests_closest_workload() {
    let identities = vec![service("web", &[("app", "frontned")]), workload("web", &[("app", "frontend")])];
    let findings = CrossResourceAnalyzer.analyze(&identities);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].message.contains("frontend"));
  }

  #[test]
  fn orphan_config_map_is_flagged() {
    let mut config = ManifestIdentity::new(0);
    config.kind = Some("ConfigMap".into());
    config.name = Some("unused".into());
    let identities = vec![config];
    let findings = CrossResourceAnalyzer.analyze(&identities);
    assert!(findings.iter().any(|f| f.rule_id.as_deref() == Some("cross_resource/orphan-config")));
  }

  #[test]
  fn broken_volume_reference_is_flagged() {
    let mut deployment = workload("web", &[("app", "web")]);
    deployment.volume_refs.insert("missing-pvc".into());
    let identities = vec![deployment];
    let findings = CrossResourceAnalyzer.analyze(&identities);
    assert!(findings.iter().any(|f| f.rule_id.as_deref() == Some("cross_resource/broken-volume")));
  }
}
