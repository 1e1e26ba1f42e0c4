//! Rebuilds an ordered document tree from one document's shards, using the forced-array set
//! and the document's kind as structural hints (§4.4).

use crate::shard::Shard;
use crate::value::{Mapping, Value};

/// Kubernetes field names that must serialize as sequences even when only a single value was
/// parsed (§3 "Forced-array set").
pub const FORCED_ARRAY_FIELDS: &[&str] = &[
  "containers",
  "initContainers",
  "ephemeralContainers",
  "ports",
  "env",
  "envFrom",
  "volumes",
  "volumeMounts",
  "rules",
  "subjects",
  "apiGroups",
  "resources",
  "verbs",
  "finalizers",
  "conditions",
  "taints",
  "tolerations",
  "matchExpressions",
  "paths",
  "hosts",
  "command",
  "args",
  "imagePullSecrets",
  "items",
  "owners",
  "ownerReferences",
];

fn is_forced_array(key: &str) -> bool {
  FORCED_ARRAY_FIELDS.contains(&key)
}

struct Frame {
  indent: usize,
  container: Container,
}

enum Container {
  Map(Mapping),
  Seq(Vec<Value>),
}

/// Builds the tree for one document's worth of shards (already split on `---` by the caller).
/// `was_repaired` synthesized keys (§4.4 "Safety") are counted so the Orchestrator can emit the
/// matching WARNING finding.
pub struct StructurerOutcome {
  pub document: Value,
  pub synthesized_keys: usize,
}

pub fn build(shards: &[Shard]) -> StructurerOutcome {
  let mut stack: Vec<Frame> = vec![Frame { indent: usize::MAX, container: Container::Map(Mapping::new()) }];
  let mut pending_key: Option<String> = None;
  let mut synthesized_keys = 0usize;
  let mut item_counter = 0usize;

  let mut idx = 0usize;
  while idx < shards.len() {
    let shard = &shards[idx];
    if shard.is_block_scalar_continuation || shard.is_doc_boundary {
      idx += 1;
      continue;
    }
    if !shard.carries_data() {
      idx += 1;
      continue;
    }

    // Pop while the top frame's indent is >= this shard's indent, except a list item at the
    // same indent as a sequence top is a sibling (don't pop), and a map nested in a sequence
    // keeps its parent sequence on the stack while its own keys are >= the sequence's indent.
    while stack.len() > 1 {
      let top_indent = stack.last().unwrap().indent;
      if top_indent < shard.indent {
        break;
      }
      if top_indent == shard.indent {
        let top_is_seq = matches!(stack.last().unwrap().container, Container::Seq(_));
        if top_is_seq && shard.is_list_item {
          break;
        }
        if stack.len() >= 2 {
          let grandparent_is_seq = matches!(stack[stack.len() - 2].container, Container::Seq(_));
          if grandparent_is_seq && !shard.is_list_item && matches!(stack.last().unwrap().container, Container::Map(_)) {
                    break;
                }
        }
      }
      let frame = stack.pop().unwrap();
      attach(&mut stack, frame.container, &mut pending_key, &mut synthesized_keys, &mut item_counter);
    }

    let next_is_deeper = shards.get(idx + 1).map(|n| n.indent > shard.indent && !n.is_doc_boundary).unwrap_or(false);

    if shard.is_list_item {
      if shard.key.is_none() {
        // bare scalar list item
        let value = shard.value.as_deref().map(Value::parse_scalar).unwrap_or(Value::Null);
        push_seq_item(&mut stack, value, &mut synthesized_keys, &mut item_counter);
        idx += 1;
        continue;
      }
      // keyed list item: begins a new map element in the enclosing sequence.
      push_seq_item(&mut stack, Value::Map(Mapping::new()), &mut synthesized_keys, &mut item_counter);
      // fall through to treat this shard's key as the first field of that new map.
    }

    let key = shard.key.clone().unwrap();
    if next_is_deeper {
      let container = if is_forced_array(&key) { Container::Seq(Vec::new()) } else { Container::Map(Mapping::new()) };
      apply_layout(&mut stack, &key, shard);
      stack.push(Frame { indent: shard.indent, container });
      pending_key = Some(key);
    } else {
      let mut value = shard.value.as_deref().map(Value::parse_scalar).unwrap_or(Value::Null);
      if is_forced_array(&key) && !matches!(value, Value::Seq(_)) {
        value = Value::Seq(vec![value]);
      }
      insert_into_top(&mut stack, &key, value, shard);
    }

    idx += 1;
  }

  while stack.len() > 1 {
    let frame = stack.pop().unwrap();
    attach(&mut stack, frame.container, &mut pending_key, &mut synthesized_keys, &mut item_counter);
  }

  let document = match stack.pop().unwrap().container {
    Container::Map(m) => Value::Map(m),
    Container::Seq(s) => Value::Seq(s),
  };

  StructurerOutcome { document, synthesized_keys }
}

fn apply_layout(stack: &mut [Frame], key: &str, shard: &Shard) {
  if let Some(Frame { container: Container::Map(map), .. }) = stack.last_mut() {
    if !shard.layout_sequence.is_empty() {
      map.set_layout(key, shard.layout_sequence.clone());
    }
    if let Some(comment) = &shard.comment {
      map.set_comment(key, comment.clone());
    }
  }
}

fn insert_into_top(stack: &mut [Frame], key: &str, value: Value, shard: &Shard) {
  apply_layout(stack, key, shard);
  match &mut stack.last_mut().unwrap().container {
    Container::Map(map) => map.insert(key, value),
    Container::Seq(seq) => seq.push(value),
  }
}

fn push_seq_item(stack: &mut [Frame], value: Value, synthesized_keys: &mut usize, item_counter: &mut usize) {
  match &mut stack.last_mut().unwrap().container {
    Container::Seq(seq) => seq.push(value),
    Container::Map(map) => {
      // A `-` item whose parent resolved as a map: synthesize a key rather than crash (§4.4
      // "Safety").
      *item_counter += 1;
      *synthesized_keys += 1;
      map.insert(format!("item_{item_counter}"), value);
    }
  }
}

fn attach(stack: &mut Vec<Frame>, container: Container, pending_key: &mut Option<String>, synthesized_keys: &mut usize, item_counter: &mut usize) {
  let value = match container {
    Container::Map(m) => Value::Map(m),
    Container::Seq(s) => Value::Seq(s),
  };
  let key = pending_key.take().unwrap_or_default();
  match &mut stack.last_mut().unwrap().container {
    Container::Map(map) => {
      map.insert(key, value);
    }
    Container::Seq(seq) => {
      seq.push(value);
      let _ = (synthesized_keys, item_counter);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer;
  use crate::shadow;

  fn build_text(text: &str) -> Value {
    let (mut shards, _) = lexer::lex(text);
    shadow::attach(text, &mut shards);
    build(&shards).document
  }

  #[test]
  fn builds_nested_map() {
    let doc = build_text("kind: Pod\nmetadata:\n  name: web\n  labels:\n    app: web\n");
    let map = doc.as_map().unwrap();
    assert_eq!(map.get("kind").unwrap().as_str(), Some("Pod"));
    let metadata = map.get("metadata").unwrap().as_map().unwrap();
    assert_eq!(metadata.get("name").unwrap().as_str(), Some("web"));
    let labels = metadata.get("labels").unwrap().as_map().unwrap();
    assert_eq!(labels.get("app").unwrap().as_str(), Some("web"));
  }

  #[test]
  fn forced_array_field_with_single_scalar_becomes_sequence() {
    let doc = build_text("command: echo\n");
    let command = doc.as_map().unwrap().get("command").unwrap();
    assert_eq!(command.as_seq().unwrap().len(), 1);
  }

  #[test]
  fn sequence_of_maps_preserves_siblings() {
    let text = "spec:\n  containers:\n    - name: app\n      image: app:latest\n      ports:\n        - containerPort: 80\n";
    let doc = build_text(text);
    let containers = doc.as_map().unwrap().get_path("spec.containers").unwrap().as_seq().unwrap();
    assert_eq!(containers.len(), 1);
    let first = containers[0].as_map().unwrap();
    assert_eq!(first.get("name").unwrap().as_str(), Some("app"));
    assert_eq!(first.get("image").unwrap().as_str(), Some("app:latest"));
    let ports = first.get("ports").unwrap().as_seq().unwrap();
    assert_eq!(ports.len(), 1);
  }

  #[test]
  fn bare_scalar_list_under_map_parent_synthesizes_key() {
    let text = "metadata:\n  finalizers:\n    extra: value\n    - orphan\n";
    let outcome_shards = {
      let (mut shards, _) = lexer::lex(text);
      shadow::attach(text, &mut shards);
      shards
    };
    let outcome = build(&outcome_shards);
    assert!(outcome.synthesized_keys >= 1);
  }
}
