//! The atomic lexical unit produced by the Lexer.

use serde::{Deserialize, Serialize};

use crate::value::LayoutSequence;

/// One repaired line of input, carrying both its parsed semantics and enough layout
/// metadata for the Serializer to reconstitute human formatting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Shard {
  /// 1-indexed source line number, for diagnostics and `line_number` on findings.
  pub line: usize,
  /// Leading space count after tab expansion and indent normalization.
  pub indent: usize,
  pub key: Option<String>,
  pub value: Option<String>,
  pub is_list_item: bool,
  pub is_block_scalar_continuation: bool,
  pub is_doc_boundary: bool,
  pub comment: Option<String>,
  pub raw_line: String,
  #[serde(default)]
  pub layout_sequence: LayoutSequence,
  #[serde(default)]
  pub intent_tag: Option<String>,
  /// Set when this shard's value carries a learning-mode heuristic rather than a
  /// catalog-confirmed classification; caps the confidence score (§4.9).
  #[serde(default)]
  pub heuristic_recovery: bool,
}

impl Shard {
  pub fn new(line: usize, raw_line: String) -> Self {
    Self {
      line,
      indent: 0,
      key: None,
      value: None,
      is_list_item: false,
      is_block_scalar_continuation: false,
      is_doc_boundary: false,
      comment: None,
      raw_line,
      layout_sequence: Vec::new(),
      intent_tag: None,
      heuristic_recovery: false,
    }
  }

  /// A shard "carries data" if it has a key or is a list item — used by the confidence
  /// score's denominator (§4.9) and by the Structurer/Scanner to skip blank/comment-only
  /// lines.
  pub fn carries_data(&self) -> bool {
    self.key.is_some() || self.is_list_item
  }

  pub fn is_blank(&self) -> bool {
    self.key.is_none() && self.value.is_none() && !self.is_list_item && !self.is_doc_boundary
  }
}
