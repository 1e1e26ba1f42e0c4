//! The JSON schema catalog format (§6): keyed by `"Kind"` or `"apiVersion/Kind"`, each value
//! exposing a `fields` object used only for key enumeration by the Structurer/Scanner's intent
//! tagging. OpenAPI catalogs use the `components.schemas` path; CRD catalogs follow the K8s
//! kind keying directly.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde_json::Value as Json;

pub struct Catalog {
  raw: Json,
}

impl Catalog {
  pub fn from_str(text: &str) -> Result<Self> {
    let raw: Json = serde_json::from_str(text).context("catalog is not valid JSON")?;
    Ok(Self { raw })
  }

  pub fn from_openapi_str(text: &str) -> Result<Self> {
    let raw: Json = serde_json::from_str(text).context("OpenAPI catalog is not valid JSON")?;
    let schemas = raw.get("components").and_then(|c| c.get("schemas")).cloned().unwrap_or(Json::Object(Default::default()));
    Ok(Self { raw: schemas })
  }

  /// True when `kind` (or `apiVersion/kind`) has an entry in this catalog.
  pub fn has_kind(&self, api_version: &str, kind: &str) -> bool {
    let gvk = format!("{api_version}/{kind}");
    self.raw.get(kind).is_some() || self.raw.get(&gvk).is_some()
  }

  /// Union of field keys for `kind`, recursing into nested `properties`/`fields` objects up to
  /// `depth` levels (§4.3 "Schema key build").
  pub fn keys_for(&self, api_version: &str, kind: &str, depth: usize) -> HashSet<String> {
    let gvk = format!("{api_version}/{kind}");
    let entry = self.raw.get(kind).or_else(|| self.raw.get(&gvk));
    let mut keys = HashSet::new();
    if let Some(entry) = entry {
      collect_keys(entry, depth, &mut keys);
    }
    keys
  }
}

fn collect_keys(node: &Json, depth: usize, out: &mut HashSet<String>) {
  if depth == 0 {
    return;
  }
  let fields = node.get("fields").or_else(|| node.get("properties"));
  let Some(Json::Object(fields)) = fields else {
    return;
  };
  for (key, value) in fields {
    out.insert(key.clone());
    collect_keys(value, depth - 1, out);
  }
}

/// Hardcoded core key set merged with any loaded catalogs, per §4.3's "Schema key build".
pub fn core_keys() -> HashSet<String> {
  [
    "apiVersion", "kind", "metadata", "spec", "status", "name", "namespace", "labels", "annotations", "selector", "template", "containers",
    "volumes", "ports", "env", "resources", "replicas", "strategy", "rules", "data", "type", "image",
  ]
  .into_iter()
  .map(str::to_owned)
  .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn loads_simple_catalog_and_enumerates_fields() {
    let json = r#"{"Pod": {"fields": {"spec": {"fields": {"containers": {}}}}}}"#;
    let catalog = Catalog::from_str(json).unwrap();
    assert!(catalog.has_kind("v1", "Pod"));
    let keys = catalog.keys_for("v1", "Pod", 3);
    assert!(keys.contains("spec"));
    assert!(keys.contains("containers"));
  }

  #[test]
  fn depth_limit_stops_recursion() {
    let json = r#"{"Pod": {"fields": {"a": {"fields": {"b": {"fields": {"c": {}}}}}}}}"#;
    let catalog = Catalog::from_str(json).unwrap();
    let keys = catalog.keys_for("v1", "Pod", 2);
    assert!(keys.contains("a"));
    assert!(keys.contains("b"));
    assert!(!keys.contains("c"));
  }

  #[test]
  fn unknown_kind_has_empty_keys() {
    let catalog = Catalog::from_str("{}").unwrap();
    assert!(catalog.keys_for("v1", "Widget", 3).is_empty());
  }
}
