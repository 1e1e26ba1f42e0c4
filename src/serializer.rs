//! Emits textual YAML from the reconstructed tree, honoring the majority indent detected by
//! Shadow and each mapping's layout metadata (§4.8).

use crate::value::{LayoutItem, Mapping, Value};

pub struct SerializeOptions {
  pub mapping_indent: usize,
  pub sequence_indent: usize,
  pub sequence_offset: usize,
}

impl SerializeOptions {
  /// `compact` forces indent=2/sequence=2/offset=0 regardless of the detected majority (§4.8).
  pub fn new(majority_indent: usize, compact: bool) -> Self {
    if compact {
      Self { mapping_indent: 2, sequence_indent: 2, sequence_offset: 0 }
    } else {
      Self { mapping_indent: majority_indent.max(1), sequence_indent: majority_indent.max(1) * 2, sequence_offset: majority_indent.max(1) }
    }
  }
}

pub fn serialize_documents(documents: &[Value], options: &SerializeOptions) -> String {
  documents.iter().map(|doc| serialize_document(doc, options)).collect::<Vec<_>>().join("---\n")
}

fn serialize_document(document: &Value, options: &SerializeOptions) -> String {
  let mut out = String::new();
  write_value(document, 0, options, &mut out);
  out
}

fn write_value(value: &Value, indent: usize, options: &SerializeOptions, out: &mut String) {
  match value {
    Value::Map(map) => write_mapping(map, indent, options, out),
    Value::Seq(seq) => write_sequence(seq, indent, options, out),
    scalar => out.push_str(&format!("{}\n", scalar_text(scalar))),
  }
}

fn write_mapping(map: &Mapping, indent: usize, options: &SerializeOptions, out: &mut String) {
  let pad = " ".repeat(indent);
  for (key, value) in &map.entries {
    if let Some(layout) = map.leading_comments.get(key) {
      for item in layout {
        match item {
          LayoutItem::Comment(text) => out.push_str(&format!("{pad}{text}\n")),
          LayoutItem::Gap(n) => out.push_str(&"\n".repeat(*n)),
        }
      }
    }

    let comment = map.end_of_line_comments.get(key).map(|c| format!(" {c}")).unwrap_or_default();

    match value {
      Value::Map(inner) if !inner.entries.is_empty() => {
        out.push_str(&format!("{pad}{key}:{comment}\n"));
        write_mapping(inner, indent + options.mapping_indent, options, out);
      }
      Value::Map(_) => out.push_str(&format!("{pad}{key}: {{}}{comment}\n")),
      Value::Seq(items) if !items.is_empty() => {
        out.push_str(&format!("{pad}{key}:{comment}\n"));
        write_sequence(items, indent + options.sequence_offset, options, out);
      }
      Value::Seq(_) => out.push_str(&format!("{pad}{key}: []{comment}\n")),
      scalar => out.push_str(&format!("{pad}{key}: {}{comment}\n", scalar_text(scalar))),
    }
  }
}

fn write_sequence(items: &[Value], indent: usize, options: &SerializeOptions, out: &mut String) {
  let pad = " ".repeat(indent);
  for item in items {
    match item {
      Value::Map(map) if !map.entries.is_empty() => {
        let mut first = true;
        for (key, value) in &map.entries {
          let prefix = if first { format!("{pad}- ") } else { format!("{pad}  ") };
          first = false;
          match value {
            Value::Map(inner) if !inner.entries.is_empty() => {
              out.push_str(&format!("{prefix}{key}:\n"));
              write_mapping(inner, indent + 2 + options.mapping_indent, options, out);
            }
            Value::Seq(inner) if !inner.is_empty() => {
              out.push_str(&format!("{prefix}{key}:\n"));
              write_sequence(inner, indent + 2 + options.sequence_offset, options, out);
            }
            scalar => out.push_str(&format!("{prefix}{key}: {}\n", scalar_text(scalar))),
          }
        }
      }
      Value::Seq(inner) => {
        out.push_str(&format!("{pad}-\n"));
        write_sequence(inner, indent + options.sequence_indent, options, out);
      }
      scalar => out.push_str(&format!("{pad}- {}\n", scalar_text(scalar))),
    }
  }
}

fn scalar_text(value: &Value) -> String {
  match value {
    Value::Null => "null".to_owned(),
    Value::Bool(b) => b.to_string(),
    Value::Int(i) => i.to_string(),
    Value::Float(f) => f.to_string(),
    Value::String(s) => quote_if_needed(s),
    Value::Seq(_) | Value::Map(_) => String::new(),
  }
}

/// Quotes a string scalar whose bare form would re-parse as something else — a bool, null,
/// number, or one of the Norway-problem words the Lexer already protects on input (§8 scenario
/// 5). Without this, `Value::parse_scalar`'s own quote-stripping undoes the Lexer's protection
/// the moment the tree round-trips back out to text.
fn needs_quoting(s: &str) -> bool {
  if s.is_empty() {
    return true;
  }
  let lower = s.to_lowercase();
  if crate::lexer::NORWAY_WORDS.contains(&lower.as_str()) || matches!(lower.as_str(), "true" | "false" | "null" | "~") {
    return true;
  }
  crate::value::looks_numeric(s)
}

fn quote_if_needed(s: &str) -> String {
  if needs_quoting(s) {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
  } else {
    s.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compact_forces_indent_two() {
    let options = SerializeOptions::new(4, true);
    assert_eq!(options.mapping_indent, 2);
    assert_eq!(options.sequence_offset, 0);
  }

  #[test]
  fn round_trips_simple_map() {
    let mut inner = Mapping::new();
    inner.insert("name", Value::String("web".into()));
    let mut root = Mapping::new();
    root.insert("kind", Value::String("Pod".into()));
    root.insert("metadata", Value::Map(inner));
    let options = SerializeOptions::new(2, false);
    let out = serialize_documents(&[Value::Map(root)], &options);
    assert_eq!(out, "kind: Pod\nmetadata:\n  name: web\n");
  }

  #[test]
  fn norway_problem_string_is_quoted_on_output() {
    let mut root = Mapping::new();
    root.insert("code", Value::String("NO".into()));
    let options = SerializeOptions::new(2, false);
    let out = serialize_documents(&[Value::Map(root)], &options);
    assert_eq!(out, "code: \"NO\"\n");
  }

  #[test]
  fn numeric_looking_string_is_quoted_on_output() {
    let mut root = Mapping::new();
    root.insert("zip", Value::String("00501".into()));
    let options = SerializeOptions::new(2, false);
    let out = serialize_documents(&[Value::Map(root)], &options);
    assert_eq!(out, "zip: \"00501\"\n");
  }

  #[test]
  fn ordinary_string_is_left_unquoted() {
    let mut root = Mapping::new();
    root.insert("app", Value::String("frontend".into()));
    let options = SerializeOptions::new(2, false);
    let out = serialize_documents(&[Value::Map(root)], &options);
    assert_eq!(out, "app: frontend\n");
  }
}
