//! Layout-preservation index: anchors comments and blank-line gaps to the nearest
//! data-carrying shard so the Serializer can reconstitute human formatting even after keys
//! are reordered by migration.

use std::collections::HashMap;

use crate::shard::Shard;
use crate::value::LayoutItem;

/// Majority indentation step detected across the document, seeding the Serializer's
/// mapping/sequence indent (fallback 2 per §4.2).
pub fn attach(raw_text: &str, shards: &mut [Shard]) -> usize {
  let by_line: HashMap<usize, usize> = shards.iter().enumerate().map(|(i, s)| (s.line, i)).collect();

  let mut pending: Vec<LayoutItem> = Vec::new();
  let mut indent_tally: HashMap<i64, u32> = HashMap::new();
  let mut prev_indent: Option<i64> = None;
  let mut in_block_scalar = false;

  for (idx, raw_line) in raw_text.replace("\r\n", "\n").replace('\r', "\n").split('\n').enumerate() {
    let line_no = idx + 1;

    if let Some(&shard_idx) = by_line.get(&line_no) {
      let shard = &shards[shard_idx];
      if shard.is_block_scalar_continuation {
        in_block_scalar = true;
        continue;
      }
      in_block_scalar = false;

      if shard.is_doc_boundary {
        pending.clear();
        prev_indent = None;
        continue;
      }

      let indent = shard.indent as i64;
      if let Some(prev) = prev_indent {
        let delta = indent - prev;
        if delta > 0 {
          *indent_tally.entry(delta).or_insert(0) += 1;
        }
      }
      prev_indent = Some(indent);

      let layout = std::mem::take(&mut pending);
      let inline_comment = shard.comment.clone();
      let shard = &mut shards[shard_idx];
      shard.layout_sequence = layout;
      if let Some(comment) = inline_comment {
        merge_comment(shard, comment);
      }
      continue;
    }

    if in_block_scalar {
      continue;
    }

    let trimmed = raw_line.trim();
    if trimmed.is_empty() {
      match pending.last_mut() {
        Some(LayoutItem::Gap(n)) => *n += 1,
        _ => pending.push(LayoutItem::Gap(1)),
      }
    } else if trimmed.starts_with('#') {
      pending.push(LayoutItem::Comment(trimmed.to_owned()));
    }
  }

  // Orphaned trailing layout items (no further data shard to attach to) go onto the last
  // non-boundary shard so nothing is silently dropped.
  if !pending.is_empty() {
    if let Some(last) = shards.iter_mut().rev().find(|s| !s.is_doc_boundary && !s.is_block_scalar_continuation) {
      last.layout_sequence.extend(pending);
    }
  }

  majority_step(&indent_tally)
}

fn merge_comment(shard: &mut Shard, inline: String) {
  match &shard.comment {
    Some(existing) if existing == &inline => {}
    Some(existing) => shard.comment = Some(format!("{existing} {inline}")),
    None => shard.comment = Some(inline),
  }
}

fn majority_step(tally: &HashMap<i64, u32>) -> usize {
  tally.iter().max_by_key(|(_, count)| **count).map(|(delta, _)| *delta as usize).unwrap_or(2)
}
