//! The reconstructed document tree.
//!
//! Kubernetes manifests are duck-typed dictionaries in their source ecosystem; here that dynamic
//! access is replaced with a tagged-variant [`Value`] and typed accessors so the Structurer,
//! Migrator, and analyzers never need reflection to walk a document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Comments and blank-line gaps anchored above a mapping key, carried from [`crate::shadow`].
pub type LayoutSequence = Vec<LayoutItem>;

/// One entry in a [`LayoutSequence`]: either a literal comment line or a run of blank lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayoutItem {
  Comment(String),
  Gap(usize),
}

/// An ordered mapping that carries round-tripping metadata alongside its entries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
  pub entries: IndexMap<String, Value>,
  /// Comments/gaps that appear above each key, keyed by that key.
  #[serde(default)]
  pub leading_comments: IndexMap<String, LayoutSequence>,
  /// Trailing inline comment for each key (`key: value # comment`).
  #[serde(default)]
  pub end_of_line_comments: IndexMap<String, String>,
}

impl Mapping {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, key: impl Into<String>, value: Value) {
    self.entries.insert(key.into(), value);
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.entries.get(key)
  }

  pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
    self.entries.get_mut(key)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  pub fn set_layout(&mut self, key: &str, layout: LayoutSequence) {
    if !layout.is_empty() {
      self.leading_comments.insert(key.to_owned(), layout);
    }
  }

  pub fn set_comment(&mut self, key: &str, comment: String) {
    self.end_of_line_comments.insert(key.to_owned(), comment);
  }

  /// Looks up a dotted path (`"spec.selector"`) through nested maps only.
  pub fn get_path(&self, path: &str) -> Option<&Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = self.get(first)?;
    for part in parts {
      current = current.as_map()?.get(part)?;
    }
    Some(current)
  }
}

/// A node in the reconstructed document tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  String(String),
  Seq(Vec<Value>),
  Map(Mapping),
}

impl Value {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&Mapping> {
    match self {
      Value::Map(m) => Some(m),
      _ => None,
    }
  }

  pub fn as_map_mut(&mut self) -> Option<&mut Mapping> {
    match self {
      Value::Map(m) => Some(m),
      _ => None,
    }
  }

  pub fn as_seq(&self) -> Option<&[Value]> {
    match self {
      Value::Seq(s) => Some(s),
      _ => None,
    }
  }

  /// Looks up a dotted path (`"spec.selector"`) through nested maps only.
  pub fn get_path(&self, path: &str) -> Option<&Value> {
    let mut current = self;
    for part in path.split('.') {
      current = current.as_map()?.get(part)?;
    }
    Some(current)
  }

  /// Renders a value the way Kubernetes would stringify it in a selector/label comparison:
  /// numbers and bools become their textual form, strings pass through untouched.
  pub fn to_compare_string(&self) -> String {
    match self {
      Value::Null => String::new(),
      Value::Bool(b) => b.to_string(),
      Value::Int(i) => i.to_string(),
      Value::Float(f) => f.to_string(),
      Value::String(s) => s.trim().to_owned(),
      Value::Seq(_) | Value::Map(_) => String::new(),
    }
  }

  /// Parses a scalar shard value into its typed form. Values that don't look numeric or
  /// boolean remain strings — this is a deliberate conservative parse, not a YAML 1.1 parse,
  /// because the Lexer has already quoted ambiguous tokens like `NO`/`yes`.
  pub fn parse_scalar(raw: &str) -> Value {
    match raw {
      "null" | "~" | "" => return Value::Null,
      "true" => return Value::Bool(true),
      "false" => return Value::Bool(false),
      _ => {}
    }
    if let Some(unquoted) = strip_matching_quotes(raw) {
      return Value::String(unquoted.to_owned());
    }
    if let Ok(i) = raw.parse::<i64>() {
      if looks_numeric(raw) {
        return Value::Int(i);
      }
    }
    if let Ok(f) = raw.parse::<f64>() {
      if looks_numeric(raw) && raw.contains('.') {
        return Value::Float(f);
      }
    }
    Value::String(raw.to_owned())
  }
}

pub(crate) fn looks_numeric(raw: &str) -> bool {
  let stripped = raw.strip_prefix('-').unwrap_or(raw);
  !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn strip_matching_quotes(raw: &str) -> Option<&str> {
  let bytes = raw.as_bytes();
  if bytes.len() >= 2 {
    let first = bytes[0];
    let last = bytes[bytes.len() - 1];
    if (first == b'"' || first == b'\'') && first == last {
      return Some(&raw[1..raw.len() - 1]);
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_scalar_variants() {
    assert_eq!(Value::parse_scalar("true"), Value::Bool(true));
    assert_eq!(Value::parse_scalar("42"), Value::Int(42));
    assert_eq!(Value::parse_scalar("-7"), Value::Int(-7));
    assert_eq!(Value::parse_scalar("3.14"), Value::Float(3.14));
    assert_eq!(Value::parse_scalar("\"NO\""), Value::String("NO".into()));
    assert_eq!(Value::parse_scalar("app"), Value::String("app".into()));
    assert_eq!(Value::parse_scalar(""), Value::Null);
  }

  #[test]
  fn get_path_walks_nested_maps() {
    let mut selector = Mapping::new();
    selector.insert("app", Value::String("web".into()));
    let mut spec = Mapping::new();
    spec.insert("selector", Value::Map(selector));
    let mut root = Mapping::new();
    root.insert("spec", Value::Map(spec));
    let doc = Value::Map(root);

    assert_eq!(doc.get_path("spec.selector").unwrap().as_map().unwrap().get("app").unwrap().as_str(), Some("web"));
    assert!(doc.get_path("spec.missing").is_none());
  }
}
