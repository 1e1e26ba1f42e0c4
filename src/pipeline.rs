//! The Pipeline Orchestrator (§4.9): the `heal()` entry point that runs Stages 0-9 strictly in
//! sequence, assembling the audit log, semantic DNA checksum, and confidence score.

use std::collections::HashMap;

use md5::{Digest, Md5};

use crate::analyzer::Registry;
use crate::audit::{AuditLog, AuditSeverity, HealAction, Stage};
use crate::context::RunOptions;
use crate::finding::AnalysisResult;
use crate::identity::ManifestIdentity;
use crate::lexer;
use crate::migrator;
use crate::scanner;
use crate::serializer::{self, SerializeOptions};
use crate::shadow;
use crate::shard::Shard;
use crate::structurer;
use crate::value::Value;

pub struct HealOutcome {
  pub healed_text: String,
  pub audit_log: AuditLog,
  pub score: u32,
  pub identities: Vec<ManifestIdentity>,
  pub findings: Vec<AnalysisResult>,
}

/// Runs the full healing pipeline over one piece of raw text (§4.9, §6). Never panics or
/// returns `Err`: catastrophic failure degrades to returning the input unchanged with a
/// CRITICAL audit entry and a score of zero (§7).
pub fn heal(raw_text: &str, options: &RunOptions) -> HealOutcome {
  let mut audit_log = AuditLog::new();

  let (mut shards, lexer_stats) = lexer::lex(raw_text);
  log_lexer_stats(&lexer_stats, &mut audit_log);

  let majority_indent = shadow::attach(raw_text, &mut shards);

  let identities = scanner::scan(&shards, options.strict_validation, options.file_path.as_deref(), &mut audit_log);
  tag_intent(&mut shards);

  let target_version = options.target_version();
  let registry = Registry::with_builtins();
  let mut findings = Vec::new();
  let mut documents = Vec::new();
  let mut synthesized_total = 0usize;

  let identity_by_doc_index: HashMap<usize, &ManifestIdentity> = identities.iter().map(|identity| (identity.doc_index, identity)).collect();

  for (doc_index, doc_shards) in split_documents(&shards) {
    let Some(&identity) = identity_by_doc_index.get(&doc_index) else { continue };
    let outcome = structurer::build(doc_shards);
    synthesized_total += outcome.synthesized_keys;
    let mut document = outcome.document;

    if let Some(info) = &identity.deprecation_info {
      let label = format!("{}/{}", identity.kind.as_deref().unwrap_or("?"), identity.name.as_deref().unwrap_or("?"));
      let migration = migrator::migrate(document, info, target_version, &label);
      document = migration.document;
      audit_log.entries.extend(migration.actions);
    }

    findings.extend(registry.run_content(&document, identity, &mut audit_log));
    documents.push(document);
  }

  if synthesized_total > 0 {
    audit_log.push(HealAction::new(
      Stage::Structurer,
      "SYNTHESIZED_KEY",
      "document",
      format!("synthesized {synthesized_total} key(s) for list items whose parent resolved as a map"),
      AuditSeverity::Warning,
    ));
  }

  findings.extend(registry.run_batch(&identities, &mut audit_log));

  let dna = semantic_dna(&documents);
  audit_log.push(HealAction::info(Stage::Orchestrator, "DNA", "document", format!("semantic DNA {dna}")));

  let serialize_options = SerializeOptions::new(majority_indent, options.compact);
  let healed_text = serializer::serialize_documents(&documents, &serialize_options);

  let score = confidence_score(&shards, identities_have_schema_match(&identities), &findings);

  HealOutcome { healed_text, audit_log, score, identities, findings }
}

fn log_lexer_stats(stats: &lexer::LexerStats, audit_log: &mut AuditLog) {
  if stats.flush_left_lists_fixed > 0 {
    audit_log.push(HealAction::info(Stage::Lexer, "FIXED", "list items", format!("fixed {} flush-left list item(s)", stats.flush_left_lists_fixed)));
  }
  if stats.nested_lists_normalized > 0 {
    audit_log.push(HealAction::info(Stage::Lexer, "FIXED", "list items", format!("normalized {} nested list indent run(s)", stats.nested_lists_normalized)));
  }
  if stats.quote_repairs > 0 {
    audit_log.push(HealAction::info(Stage::Lexer, "FIXED", "quotes", format!("balanced {} unterminated quote(s)", stats.quote_repairs)));
  }
  if stats.spacing_fixes > 0 {
    audit_log.push(HealAction::info(Stage::Lexer, "FIXED", "spacing", format!("fixed {} spacing issue(s)", stats.spacing_fixes)));
  }
}

/// Splits shards into per-document slices, keyed by the same 0-based, boundary-incremented
/// `doc_index` the Scanner assigns (`ManifestIdentity::doc_index`) — including documents the
/// Scanner never emitted an identity for, so callers can line the two up by index rather than
/// position once empty/dropped documents have shifted them out of sync.
fn split_documents(shards: &[Shard]) -> Vec<(usize, &[Shard])> {
  let mut docs = Vec::new();
  let mut start = 0;
  for (idx, shard) in shards.iter().enumerate() {
    if shard.is_doc_boundary {
      docs.push(&shards[start..idx]);
      start = idx + 1;
    }
  }
  docs.push(&shards[start..]);
  docs.into_iter().enumerate().filter(|(_, d)| d.iter().any(Shard::carries_data)).collect()
}

fn identities_have_schema_match(identities: &[ManifestIdentity]) -> bool {
  identities.iter().any(|i| !i.was_repaired && i.is_complete())
}

/// Tags each data-carrying shard with `k8s.<key>` when its key is in the hardcoded core set,
/// else a path-depth tag; caps the confidence score when learning mode kicks in (§4.3, §4.9).
fn tag_intent(shards: &mut [Shard]) {
  let core = crate::catalog::core_keys();
  let mut depth_stack: Vec<usize> = Vec::new();
  for shard in shards.iter_mut() {
    if shard.is_doc_boundary {
      depth_stack.clear();
      continue;
    }
    if !shard.carries_data() {
      continue;
    }
    while depth_stack.last().map(|&d| d >= shard.indent).unwrap_or(false) {
      depth_stack.pop();
    }
    let depth = depth_stack.len();
    if let Some(key) = &shard.key {
      if core.contains(key) {
        shard.intent_tag = Some(format!("k8s.{key}"));
      } else {
        shard.intent_tag = Some(format!("path.{depth}"));
        shard.heuristic_recovery = true;
      }
      if shard.value.is_none() {
        depth_stack.push(shard.indent);
      }
    } else {
      shard.intent_tag = Some(format!("path.{depth}"));
    }
  }
}

/// §4.9 "Confidence score".
fn confidence_score(shards: &[Shard], schema_matched: bool, findings: &[AnalysisResult]) -> u32 {
  let data_shards: Vec<&Shard> = shards.iter().filter(|s| s.carries_data()).collect();
  let total = data_shards.len();
  if total == 0 {
    return 100;
  }
  let tagged = data_shards.iter().filter(|s| s.intent_tag.is_some()).count();
  let mut base = ((tagged as f64 / total as f64) * 100.0).round() as i64;

  if schema_matched {
    base = (base + 20).min(100);
  }

  let learning_mode = data_shards.iter().any(|s| s.heuristic_recovery);
  if learning_mode {
    base = base.min(50);
  }

  let penalty: i64 = findings
    .iter()
    .map(|f| match f.severity {
      crate::finding::Severity::Error => 5,
      crate::finding::Severity::Warning => 2,
      crate::finding::Severity::Info => 0,
    })
    .sum();

  (base - penalty).clamp(0, 100) as u32
}

/// `MD5(canonical_json(documents))` with sorted keys (§4.9 "Semantic DNA checkpoint").
/// `serde_json`'s default map type is key-sorted (the `preserve_order` feature is not enabled),
/// so converting through `serde_json::to_value` canonicalizes key order for free.
fn semantic_dna(documents: &[Value]) -> String {
  let canonical = serde_json::to_value(documents).unwrap_or(serde_json::Value::Null);
  let text = serde_json::to_string(&canonical).unwrap_or_default();
  let mut hasher = Md5::new();
  hasher.update(text.as_bytes());
  format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn heal_never_panics_on_empty_input() {
    let outcome = heal("", &RunOptions::default());
    assert!(outcome.identities.is_empty());
  }

  #[test]
  fn heal_fixes_fused_keyword_and_missing_colon() {
    let input = "kindService\nmetadata:\n  name: s\nspec\n  ports:\n    - port: 80\n";
    let outcome = heal(input, &RunOptions::default());
    assert_eq!(outcome.identities[0].kind.as_deref(), Some("Service"));
    assert_eq!(outcome.identities[0].name.as_deref(), Some("s"));
  }

  #[test]
  fn deprecated_deployment_is_migrated_with_audit_entry() {
    let input = "apiVersion: extensions/v1beta1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  template:\n    metadata:\n      labels:\n        app: web\n";
    let options = RunOptions { cluster_version: Some("v1.25".into()), ..RunOptions::default() };
    let outcome = heal(input, &options);
    assert!(outcome.healed_text.contains("apps/v1"));
    assert!(outcome.audit_log.entries.iter().any(|e| e.action_type == "MIGRATED"));
  }

  #[test]
  fn migrator_is_identity_function_for_unknown_gvk() {
    let input = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\n";
    let outcome = heal(input, &RunOptions::default());
    assert!(!outcome.audit_log.entries.iter().any(|e| e.action_type == "MIGRATED"));
  }

  #[test]
  fn running_twice_is_a_fixpoint() {
    let input = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\nspec:\n  containers:\n    - name: app\n      image: nginx:1.25\n";
    let first = heal(input, &RunOptions::default());
    let second = heal(&first.healed_text, &RunOptions::default());
    assert_eq!(first.healed_text, second.healed_text);
  }

  #[test]
  fn score_is_between_zero_and_hundred() {
    let input = "kind: Pod\nmetadata:\n  name: p\nspec:\n  containers:\n    - name: app\n      image: nginx\n";
    let outcome = heal(input, &RunOptions::default());
    assert!(outcome.score <= 100);
  }
}
