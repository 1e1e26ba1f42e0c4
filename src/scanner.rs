//! Walks the shard stream and extracts one [`ManifestIdentity`] per `---`-separated document,
//! isolating root metadata from metadata nested inside Pod templates by path tracking (§4.3).

use crate::audit::{AuditLog, AuditSeverity, HealAction, Stage};
use crate::deprecation;
use crate::identity::ManifestIdentity;
use crate::shard::Shard;

const WORKLOAD_KINDS: &[&str] = &["Deployment", "StatefulSet", "DaemonSet", "ReplicaSet", "Job", "CronJob", "Pod"];

/// Fallback `kind -> apiVersion` table used in permissive mode when a document has no
/// catalog-resolvable apiVersion (§4.3).
fn infer_api_version(kind: &str) -> Option<&'static str> {
  match kind {
    "Pod" | "Service" | "ConfigMap" | "Secret" | "Namespace" | "PersistentVolumeClaim" | "PersistentVolume"
    | "ServiceAccount" | "Endpoints" | "Event" | "Node" => Some("v1"),
    "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "ControllerRevision" => Some("apps/v1"),
    "Job" | "CronJob" => Some("batch/v1"),
    "Ingress" | "NetworkPolicy" | "IngressClass" => Some("networking.k8s.io/v1"),
    "Role" | "RoleBinding" | "ClusterRole" | "ClusterRoleBinding" => Some("rbac.authorization.k8s.io/v1"),
    "HorizontalPodAutoscaler" => Some("autoscaling/v2"),
    "PodDisruptionBudget" => Some("policy/v1"),
    "StorageClass" | "CSIDriver" | "CSINode" | "VolumeAttachment" => Some("storage.k8s.io/v1"),
    "ValidatingWebhookConfiguration" | "MutatingWebhookConfiguration" => Some("admissionregistration.k8s.io/v1"),
    "CustomResourceDefinition" => Some("apiextensions.k8s.io/v1"),
    "CertificateSigningRequest" => Some("certificates.k8s.io/v1"),
    "Lease" => Some("coordination.k8s.io/v1"),
    _ => None,
  }
}

/// Turns a shard stream into one identity per document. `strict` mirrors
/// `RunOptions::strict_validation`: when true, identities missing kind or apiVersion are
/// dropped with an audit entry instead of inferred.
pub fn scan(shards: &[Shard], strict: bool, file_path: Option<&str>, audit_log: &mut AuditLog) -> Vec<ManifestIdentity> {
  let mut identities = Vec::new();
  let mut stack: Vec<(usize, String)> = Vec::new();
  let mut current = ManifestIdentity::new(0);
  let mut touched = false;
  let mut doc_index = 0usize;
  let mut doc_min_indent: Option<usize> = None;

  let mut flush = |identity: &mut ManifestIdentity,
                    touched: &mut bool,
                    identities: &mut Vec<ManifestIdentity>,
                    audit_log: &mut AuditLog| {
    if !*touched {
      return;
    }
    let mut identity = std::mem::replace(identity, ManifestIdentity::new(0));
    identity.file_path = file_path.map(str::to_owned);

    if identity.api_version.is_none() {
      if strict {
        audit_log.push(HealAction::new(
          Stage::Scanner,
          "DROPPED",
          identity.kind.clone().unwrap_or_else(|| "<unknown>".into()),
          "identity missing apiVersion in strict mode",
          AuditSeverity::Error,
        ));
        *touched = false;
        return;
      }
      if let Some(kind) = identity.kind.as_deref() {
        if let Some(inferred) = infer_api_version(kind) {
          identity.api_version = Some(inferred.to_owned());
          identity.was_repaired = true;
        }
      }
    }
    if strict && identity.kind.is_none() {
      audit_log.push(HealAction::new(
        Stage::Scanner,
        "DROPPED",
        "<unknown>",
        "identity missing kind in strict mode",
        AuditSeverity::Error,
      ));
      *touched = false;
      return;
    }

    if let Some((api_version, kind)) = identity.gvk() {
      if let Some(info) = deprecation::table().lookup(api_version, kind) {
        identity.deprecation_info = Some(info.clone());
      }
    }

    identities.push(identity);
    *touched = false;
  };

  for shard in shards {
    if shard.is_doc_boundary {
      flush(&mut current, &mut touched, &mut identities, audit_log);
      stack.clear();
      doc_min_indent = None;
      doc_index += 1;
      current.doc_index = doc_index;
      continue;
    }
    if !shard.carries_data() {
      continue;
    }

    while let Some(&(indent, _)) = stack.last() {
      if indent >= shard.indent {
        stack.pop();
      } else {
        break;
      }
    }

    let min_indent = *doc_min_indent.get_or_insert(shard.indent);
    let is_root = stack.is_empty() && shard.indent == min_indent;
    touched = true;

    let ancestors: Vec<&str> = stack.iter().map(|(_, k)| k.as_str()).collect();
    let kind_so_far = current.kind.clone();

    if let Some(key) = shard.key.clone() {
      if is_root {
        match key.as_str() {
          "kind" => current.kind = shard.value.clone(),
          "apiVersion" => current.api_version = shard.value.clone(),
          _ => {}
        }
      }

      extract(&mut current, &ancestors, &key, shard.value.as_deref(), shard.is_list_item, kind_so_far.as_deref());

      if shard.value.is_none() {
        stack.push((shard.indent, key));
      }
    }
  }

  flush(&mut current, &mut touched, &mut identities, audit_log);
  identities
}

fn extract(identity: &mut ManifestIdentity, ancestors: &[&str], key: &str, value: Option<&str>, is_list_item: bool, kind: Option<&str>) {
  let has = |name: &str| ancestors.iter().any(|a| *a == name);
  let kind = kind.unwrap_or_default();

  // Root metadata only: a single "metadata" ancestor, not nested inside a Pod template.
  if ancestors == ["metadata"] {
    match key {
      "name" => identity.name = value.map(str::to_owned),
      "namespace" => identity.namespace = value.map(str::to_owned),
      _ => {}
    }
  }

  if has("spec") && has("selector") {
    if let Some(v) = value {
      identity.selector.insert(key.to_owned(), v.trim().to_owned());
    }
    return;
  }

  if has("metadata") && has("labels") {
    if let Some(v) = value {
      identity.labels.insert(key.to_owned(), v.trim().to_owned());
    }
    return;
  }

  if has("volumes") && (has("configMap") || has("secret")) && key == "name" {
    if let Some(v) = value {
      identity.config_refs.insert(v.to_owned());
    }
    return;
  }

  if (has("env") || has("envFrom")) && ancestors.iter().any(|a| a.ends_with("Ref")) && key == "name" {
    if let Some(v) = value {
      identity.config_refs.insert(v.to_owned());
    }
    return;
  }

  if has("persistentVolumeClaim") && key == "claimName" {
    if let Some(v) = value {
      identity.volume_refs.insert(v.to_owned());
    }
    return;
  }

  if kind == "Service" && has("ports") {
    if is_list_item {
      identity.service_ports.push(Default::default());
    }
    if let Some(port) = identity.service_ports.last_mut() {
      let v = value.map(str::to_owned);
      match key {
        "port" => port.port = v,
        "targetPort" => port.target_port = v,
        "nodePort" => port.node_port = v,
        "name" => port.name = v,
        "protocol" => port.protocol = v,
        _ => {}
      }
    }
    return;
  }

  if WORKLOAD_KINDS.contains(&kind) && has("containers") && has("ports") {
    if let Some(v) = value {
      if key == "containerPort" || key == "name" {
        identity.container_ports.insert(v.to_owned());
      }
    }
    return;
  }

  if kind == "Ingress" && has("backend") {
    match key {
      "serviceName" => identity.push_ingress_backend(value.map(str::to_owned), None),
      "servicePort" => identity.push_ingress_backend(None, value.map(str::to_owned)),
      "name" if has("service") => identity.push_ingress_backend(value.map(str::to_owned), None),
      "number" if has("port") => identity.push_ingress_backend(None, value.map(str::to_owned)),
      "port" if !has("service") && !has("number") => identity.push_ingress_backend(None, value.map(str::to_owned)),
      _ => {}
    }
    return;
  }

  if kind == "HorizontalPodAutoscaler" && has("scaleTargetRef") && key == "name" {
    identity.scale_target = value.map(str::to_owned);
    return;
  }

  if WORKLOAD_KINDS.contains(&kind) && ancestors == ["spec"] && key == "serviceAccountName" {
    identity.service_account = value.map(str::to_owned);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer;
  use crate::shadow;

  fn scan_text(text: &str, strict: bool) -> (Vec<ManifestIdentity>, AuditLog) {
    let (mut shards, _) = lexer::lex(text);
    shadow::attach(text, &mut shards);
    let mut audit_log = AuditLog::new();
    let identities = scan(&shards, strict, None, &mut audit_log);
    (identities, audit_log)
  }

  #[test]
  fn extracts_kind_api_version_name_namespace() {
    let (identities, _) = scan_text("apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\n  namespace: prod\n", true);
    assert_eq!(identities.len(), 1);
    let id = &identities[0];
    assert_eq!(id.kind.as_deref(), Some("Pod"));
    assert_eq!(id.api_version.as_deref(), Some("v1"));
    assert_eq!(id.name.as_deref(), Some("web"));
    assert_eq!(id.namespace.as_deref(), Some("prod"));
  }

  #[test]
  fn pod_template_metadata_does_not_pollute_root_name() {
    let text = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: app\nspec:\n  template:\n    metadata:\n      name: should-not-overwrite\n";
    let (identities, _) = scan_text(text, false);
    assert_eq!(identities[0].name.as_deref(), Some("app"));
  }

  #[test]
  fn template_labels_are_collected_for_ghost_service_matching() {
    let text = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: app\nspec:\n  template:\n    metadata:\n      labels:\n        app: frontend\n";
    let (identities, _) = scan_text(text, false);
    assert_eq!(identities[0].labels.get("app").map(String::as_str), Some("frontend"));
  }

  #[test]
  fn strict_mode_drops_incomplete_identity() {
    let (identities, audit_log) = scan_text("kind: Pod\n", true);
    assert!(identities.is_empty());
    assert!(audit_log.has_severity_at_least(AuditSeverity::Error));
  }

  #[test]
  fn permissive_mode_infers_api_version() {
    let (identities, _) = scan_text("kind: Pod\nmetadata:\n  name: web\n", false);
    assert_eq!(identities[0].api_version.as_deref(), Some("v1"));
    assert!(identities[0].was_repaired);
  }

  #[test]
  fn service_selector_is_captured() {
    let text = "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\nspec:\n  selector:\n    app: web\n";
    let (identities, _) = scan_text(text, true);
    assert_eq!(identities[0].selector.get("app").map(String::as_str), Some("web"));
  }

  #[test]
  fn service_ports_collected_as_ordered_list() {
    let text = "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\nspec:\n  ports:\n    - port: 80\n      targetPort: 8080\n    - port: 443\n";
    let (identities, _) = scan_text(text, true);
    assert_eq!(identities[0].service_ports.len(), 2);
    assert_eq!(identities[0].service_ports[0].target_port.as_deref(), Some("8080"));
  }

  #[test]
  fn config_map_ref_under_volumes_is_tracked() {
    let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\nspec:\n  volumes:\n    - name: cfg\n      configMap:\n        name: app-config\n";
    let (identities, _) = scan_text(text, true);
    assert!(identities[0].config_refs.contains("app-config"));
  }

  #[test]
  fn multiple_documents_yield_multiple_identities() {
    let text = "kind: Pod\nmetadata:\n  name: a\n---\nkind: Service\nmetadata:\n  name: b\n";
    let (identities, _) = scan_text(text, false);
    assert_eq!(identities.len(), 2);
    assert_eq!(identities[1].doc_index, 1);
  }
}
