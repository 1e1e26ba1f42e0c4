//! Rewrites a reconstructed document's deprecated `apiVersion`/shape to the replacement the
//! target cluster version requires (§4.5).

use crate::audit::{AuditSeverity, HealAction, Stage};
use crate::deprecation::{DeprecationInfo, Strategy};
use crate::value::{Mapping, Value};
use crate::version::ClusterVersion;

pub struct MigrationOutcome {
  pub document: Value,
  pub changed: bool,
  pub actions: Vec<HealAction>,
}

/// Applies the deprecation table's strategy for `info` if `info.removed_in <= target_version`;
/// otherwise returns the document untouched (§4.5 "Decision").
pub fn migrate(mut document: Value, info: &DeprecationInfo, target_version: ClusterVersion, resource_label: &str) -> MigrationOutcome {
  if !info.is_removed_at(target_version) {
    return MigrationOutcome { document, changed: false, actions: Vec::new() };
  }

  let mut actions = Vec::new();
  let result = match info.strategy {
    Strategy::None => None,
    Strategy::ReplaceApiVersion => replace_api_version(&mut document, info),
    Strategy::DeploymentSelector => deployment_selector(&mut document, info),
    Strategy::IngressV1 => ingress_v1(&mut document, info),
    Strategy::CronJobV1 => replace_api_version(&mut document, info),
  };

  match result {
    Some(note) => {
      actions.push(HealAction::new(
        Stage::Migrator,
        "MIGRATED",
        resource_label.to_owned(),
        format!("{resource_label} from {} to {} ({note})", info.deprecated_api, info.replacement_api.as_deref().unwrap_or("<none>")),
        AuditSeverity::Warning,
      ));
      MigrationOutcome { document, changed: true, actions }
    }
    None => {
      if info.strategy != Strategy::None {
        actions.push(HealAction::new(
          Stage::Migrator,
          "MIGRATION_FAILED",
          resource_label.to_owned(),
          format!("could not migrate {resource_label}: {}", info.migration_notes),
          AuditSeverity::Warning,
        ));
      } else {
        actions.push(HealAction::new(
          Stage::Migrator,
          "DEPRECATION_WARNING",
          resource_label.to_owned(),
          format!("{} has no mechanical replacement: {}", info.deprecated_api, info.migration_notes),
          AuditSeverity::Warning,
        ));
      }
      MigrationOutcome { document, changed: false, actions }
    }
  }
}

fn replace_api_version(document: &mut Value, info: &DeprecationInfo) -> Option<&'static str> {
  let replacement = info.replacement_api.as_deref()?;
  let map = document.as_map_mut()?;
  map.insert("apiVersion", Value::String(replacement.to_owned()));
  Some("apiVersion swap")
}

/// Computes and validates the whole migration before touching `document` — if labels are
/// missing and no selector already exists, this must return `None` with the document
/// completely untouched (§4.5, §7: a failed migration leaves the input unchanged).
fn deployment_selector(document: &mut Value, info: &DeprecationInfo) -> Option<&'static str> {
  let replacement = info.replacement_api.as_deref()?;
  let map = document.as_map()?;

  let has_selector = map.get("spec").and_then(Value::as_map).map(|s| s.contains_key("selector")).unwrap_or(false);

  let new_selector = if has_selector {
    None
  } else {
    let template_labels = map
      .get("spec")
      .and_then(Value::as_map)
      .and_then(|s| s.get("template"))
      .and_then(Value::as_map)
      .and_then(|t| t.get("metadata"))
      .and_then(Value::as_map)
      .and_then(|m| m.get("labels"))
      .and_then(Value::as_map)?;

    let mut match_labels = Mapping::new();
    for (k, v) in template_labels.entries.iter() {
      match_labels.insert(k.clone(), v.clone());
    }
    let mut selector = Mapping::new();
    selector.insert("matchLabels", Value::Map(match_labels));
    Some(selector)
  };

  let map = document.as_map_mut()?;
  map.insert("apiVersion", Value::String(replacement.to_owned()));

  match new_selector {
    Some(selector) => {
      let spec = map.get_mut("spec")?.as_map_mut()?;
      spec.insert("selector", Value::Map(selector));
      Some("Added Selector")
    }
    None => Some("apiVersion swap"),
  }
}

fn ingress_v1(document: &mut Value, info: &DeprecationInfo) -> Option<&'static str> {
  let replacement = info.replacement_api.as_deref()?;
  let map = document.as_map_mut()?;
  map.insert("apiVersion", Value::String(replacement.to_owned()));

  if let Some(rules) = map.get_mut("spec").and_then(Value::as_map_mut).and_then(|s| s.get_mut("rules")).and_then(as_seq_mut) {
    for rule in rules.iter_mut() {
      if let Some(paths) = rule.as_map_mut().and_then(|r| r.get_mut("http")).and_then(Value::as_map_mut).and_then(|h| h.get_mut("paths")).and_then(as_seq_mut) {
        for path in paths.iter_mut() {
          if let Some(path_map) = path.as_map_mut() {
            if !path_map.contains_key("pathType") {
              path_map.insert("pathType", Value::String("ImplementationSpecific".to_owned()));
            }
          }
        }
      }
    }
  }
  Some("apiVersion swap, pathType defaulted")
}

fn as_seq_mut(value: &mut Value) -> Option<&mut Vec<Value>> {
  match value {
    Value::Seq(s) => Some(s),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::deprecation;

  fn deployment_doc(selector: bool) -> Value {
    let mut spec = Mapping::new();
    let mut template_meta = Mapping::new();
    let mut labels = Mapping::new();
    labels.insert("app", Value::String("web".into()));
    template_meta.insert("labels", Value::Map(labels.clone()));
    let mut template = Mapping::new();
    template.insert("metadata", Value::Map(template_meta));
    spec.insert("template", Value::Map(template));
    if selector {
      let mut sel = Mapping::new();
      sel.insert("matchLabels", Value::Map(labels));
      spec.insert("selector", Value::Map(sel));
    }
    let mut root = Mapping::new();
    root.insert("apiVersion", Value::String("extensions/v1beta1".into()));
    root.insert("kind", Value::String("Deployment".into()));
    root.insert("spec", Value::Map(spec));
    Value::Map(root)
  }

  #[test]
  fn deployment_without_selector_synthesizes_match_labels() {
    let info = deprecation::table().lookup("extensions/v1beta1", "Deployment").unwrap();
    let outcome = migrate(deployment_doc(false), info, ClusterVersion::parse("v1.25").unwrap(), "Deployment/web");
    assert!(outcome.changed);
    let spec = outcome.document.as_map().unwrap().get("spec").unwrap().as_map().unwrap();
    let selector = spec.get("selector").unwrap().as_map().unwrap();
    let match_labels = selector.get("matchLabels").unwrap().as_map().unwrap();
    assert_eq!(match_labels.get("app").unwrap().as_str(), Some("web"));
    assert_eq!(outcome.document.as_map().unwrap().get("apiVersion").unwrap().as_str(), Some("apps/v1"));
  }

  #[test]
  fn deployment_with_existing_selector_only_swaps_api_version() {
    let info = deprecation::table().lookup("extensions/v1beta1", "Deployment").unwrap();
    let outcome = migrate(deployment_doc(true), info, ClusterVersion::parse("v1.25").unwrap(), "Deployment/web");
    assert!(outcome.changed);
  }

  #[test]
  fn below_removal_version_is_untouched() {
    let info = deprecation::table().lookup("extensions/v1beta1", "Deployment").unwrap();
    let doc = deployment_doc(true);
    let outcome = migrate(doc.clone(), info, ClusterVersion::parse("v1.15").unwrap(), "Deployment/web");
    assert!(!outcome.changed);
    assert_eq!(outcome.document, doc);
  }

  #[test]
  fn deployment_missing_selector_and_labels_is_left_completely_unchanged() {
    let info = deprecation::table().lookup("extensions/v1beta1", "Deployment").unwrap();
    let mut root = Mapping::new();
    root.insert("apiVersion", Value::String("extensions/v1beta1".into()));
    root.insert("kind", Value::String("Deployment".into()));
    root.insert("spec", Value::Map(Mapping::new()));
    let doc = Value::Map(root);
    let outcome = migrate(doc.clone(), info, ClusterVersion::parse("v1.25").unwrap(), "Deployment/web");
    assert!(!outcome.changed);
    assert_eq!(outcome.document, doc);
    assert_eq!(outcome.document.as_map().unwrap().get("apiVersion").unwrap().as_str(), Some("extensions/v1beta1"));
  }

  #[test]
  fn pod_security_policy_has_no_mechanical_fix() {
    let info = deprecation::table().lookup("policy/v1beta1", "PodSecurityPolicy").unwrap();
    let mut root = Mapping::new();
    root.insert("apiVersion", Value::String("policy/v1beta1".into()));
    root.insert("kind", Value::String("PodSecurityPolicy".into()));
    let outcome = migrate(Value::Map(root), info, ClusterVersion::parse("v1.25").unwrap(), "PodSecurityPolicy/privileged");
    assert!(!outcome.changed);
    assert_eq!(outcome.actions[0].action_type, "DEPRECATION_WARNING");
  }
}
