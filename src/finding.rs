//! Findings emitted by analyzers (§4.6) and the shape used to render them.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled, settings::Style};

/// Severity of an [`AnalysisResult`]. WARNING/ERROR flip a file's status to WARN/FAILED (§7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Tabled)]
pub enum Severity {
  Info,
  Warning,
  Error,
}

impl std::fmt::Display for Severity {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Severity::Info => write!(f, "INFO"),
      Severity::Warning => write!(f, "WARNING"),
      Severity::Error => write!(f, "ERROR"),
    }
  }
}

/// One finding produced by an analyzer (§4.6). `rule_id` is a free-form string rather than a
/// closed enum of codes, since the analyzer registry is pluggable and new analyzers bring new
/// rule families without a crate release.
#[derive(Clone, Debug, Serialize, Deserialize, Tabled)]
pub struct AnalysisResult {
  pub analyzer_name: String,
  pub severity: Severity,
  pub message: String,
  pub resource_kind: String,
  pub resource_name: String,
  #[tabled(display = "opt_string")]
  pub file_path: Option<String>,
  #[tabled(display = "opt_string")]
  pub rule_id: Option<String>,
  #[tabled(display = "opt_usize")]
  pub line_number: Option<usize>,
  #[tabled(display = "opt_string")]
  pub suggestion: Option<String>,
  pub fix_available: bool,
  #[tabled(display = "opt_string")]
  pub fix_id: Option<String>,
}

fn opt_string(value: &Option<String>) -> String {
  value.clone().unwrap_or_default()
}

fn opt_usize(value: &Option<usize>) -> String {
  value.map(|v| v.to_string()).unwrap_or_default()
}

impl AnalysisResult {
  pub fn new(analyzer_name: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
    Self {
      analyzer_name: analyzer_name.into(),
      severity,
      message: message.into(),
      resource_kind: String::new(),
      resource_name: String::new(),
      file_path: None,
      rule_id: None,
      line_number: None,
      suggestion: None,
      fix_available: false,
      fix_id: None,
    }
  }

  pub fn on(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
    self.resource_kind = kind.into();
    self.resource_name = name.into();
    self
  }

  pub fn rule(mut self, rule_id: impl Into<String>) -> Self {
    self.rule_id = Some(rule_id.into());
    self
  }

  pub fn at_line(mut self, line_number: usize) -> Self {
    self.line_number = Some(line_number);
    self
  }

  pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
    self.suggestion = Some(suggestion.into());
    self
  }

  pub fn fixable_with(mut self, fix_id: impl Into<String>) -> Self {
    self.fix_available = true;
    self.fix_id = Some(fix_id.into());
    self
  }

  pub fn file(mut self, file_path: Option<String>) -> Self {
    self.file_path = file_path;
    self
  }
}

pub trait Findings {
  fn to_stdout_table(&self) -> Result<String>;
}

impl Findings for Vec<AnalysisResult> {
  fn to_stdout_table(&self) -> Result<String> {
    if self.is_empty() {
      return Ok(String::new());
    }
    let mut table = Table::new(self);
    table.with(Style::sharp());
    Ok(format!("{table}\n"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_chain_sets_fields() {
    let finding = AnalysisResult::new("images", Severity::Error, "missing tag")
      .on("Pod", "web")
      .rule("images/no-tag")
      .at_line(12)
      .suggest("pin an explicit tag")
      .fixable_with("images.pin_tag");
    assert_eq!(finding.resource_kind, "Pod");
    assert_eq!(finding.line_number, Some(12));
    assert!(finding.fix_available);
  }

  #[test]
  fn severity_orders_info_below_error() {
    assert!(Severity::Info < Severity::Warning);
    assert!(Severity::Warning < Severity::Error);
  }

  #[test]
  fn empty_findings_render_empty_table() {
    let findings: Vec<AnalysisResult> = Vec::new();
    assert_eq!(findings.to_stdout_table().unwrap(), "");
  }
}
