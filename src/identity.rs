//! `ManifestIdentity` (§3): the "DNA" of one document — its kind/apiVersion/name plus the
//! cross-resource reference sets the batch analyzers graph together.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::deprecation::DeprecationInfo;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicePort {
  pub port: Option<String>,
  pub target_port: Option<String>,
  pub node_port: Option<String>,
  pub name: Option<String>,
  pub protocol: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressBackend {
  pub service: Option<String>,
  pub port: Option<String>,
}

impl IngressBackend {
  fn is_complete(&self) -> bool {
    self.service.is_some()
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestIdentity {
  pub api_version: Option<String>,
  pub kind: Option<String>,
  pub name: Option<String>,
  pub namespace: Option<String>,
  pub doc_index: usize,
  /// Set when the Scanner inferred a missing field (permissive mode) rather than reading it.
  pub was_repaired: bool,

  pub selector: IndexMap<String, String>,
  pub labels: IndexMap<String, String>,
  pub service_ports: Vec<ServicePort>,
  pub container_ports: HashSet<String>,
  pub config_refs: HashSet<String>,
  pub volume_refs: HashSet<String>,
  pub service_refs: HashSet<String>,
  pub ingress_backends: Vec<IngressBackend>,
  pub scale_target: Option<String>,
  pub service_account: Option<String>,

  pub deprecation_info: Option<DeprecationInfo>,
  pub file_path: Option<String>,
}

impl ManifestIdentity {
  pub fn new(doc_index: usize) -> Self {
    Self {
      api_version: None,
      kind: None,
      name: None,
      namespace: None,
      doc_index,
      was_repaired: false,
      selector: IndexMap::new(),
      labels: IndexMap::new(),
      service_ports: Vec::new(),
      container_ports: HashSet::new(),
      config_refs: HashSet::new(),
      volume_refs: HashSet::new(),
      service_refs: HashSet::new(),
      ingress_backends: Vec::new(),
      scale_target: None,
      service_account: None,
      deprecation_info: None,
      file_path: None,
    }
  }

  pub fn is_complete(&self) -> bool {
    self.kind.is_some() && self.api_version.is_some()
  }

  pub fn push_ingress_backend(&mut self, service: Option<String>, port: Option<String>) {
    if let (Some(svc), None) = (&service, &port) {
      self.service_refs.insert(svc.clone());
    }
    match self.ingress_backends.last_mut() {
      Some(last) if !last.is_complete() => {
        if service.is_some() {
          last.service = service.clone();
        }
        if port.is_some() {
          last.port = port;
        }
      }
      _ => self.ingress_backends.push(IngressBackend { service, port }),
    }
    if let Some(svc) = self.ingress_backends.last().and_then(|b| b.service.clone()) {
      self.service_refs.insert(svc);
    }
  }

  pub fn gvk(&self) -> Option<(&str, &str)> {
    Some((self.api_version.as_deref()?, self.kind.as_deref()?))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn push_ingress_backend_merges_partial_fields() {
    let mut identity = ManifestIdentity::new(0);
    identity.push_ingress_backend(Some("web-svc".into()), None);
    identity.push_ingress_backend(None, Some("80".into()));
    assert_eq!(identity.ingress_backends.len(), 1);
    assert_eq!(identity.ingress_backends[0].port.as_deref(), Some("80"));
    assert!(identity.service_refs.contains("web-svc"));
  }

  #[test]
  fn second_backend_starts_fresh_after_completion() {
    let mut identity = ManifestIdentity::new(0);
    identity.push_ingress_backend(Some("a".into()), Some("80".into()));
    identity.push_ingress_backend(Some("b".into()), Some("8080".into()));
    assert_eq!(identity.ingress_backends.len(), 2);
  }
}
