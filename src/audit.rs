//! The structured audit trail accumulated across a `heal()` run (§3 `HealAction`, §7).

use serde::{Deserialize, Serialize};

/// Which pipeline stage produced a [`HealAction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
  Lexer,
  Shadow,
  Scanner,
  Structurer,
  Migrator,
  Analyzer,
  Serializer,
  Orchestrator,
}

impl std::fmt::Display for Stage {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let name = match self {
      Stage::Lexer => "Lexer",
      Stage::Shadow => "Shadow",
      Stage::Scanner => "Scanner",
      Stage::Structurer => "Structurer",
      Stage::Migrator => "Migrator",
      Stage::Analyzer => "Analyzer",
      Stage::Serializer => "Serializer",
      Stage::Orchestrator => "Orchestrator",
    };
    write!(f, "{name}")
  }
}

/// Audit severity, independent of [`crate::finding::Severity`] — an audit entry can be
/// informational even when the stage it describes also emitted an ERROR-severity finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuditSeverity {
  Info,
  Warning,
  Error,
  Critical,
}

/// One entry in the audit log (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealAction {
  pub stage: Stage,
  pub action_type: String,
  pub target: String,
  pub description: String,
  pub severity: AuditSeverity,
}

impl HealAction {
  pub fn new(stage: Stage, action_type: impl Into<String>, target: impl Into<String>, description: impl Into<String>, severity: AuditSeverity) -> Self {
    Self { stage, action_type: action_type.into(), target: target.into(), description: description.into(), severity }
  }

  pub fn info(stage: Stage, action_type: impl Into<String>, target: impl Into<String>, description: impl Into<String>) -> Self {
    Self::new(stage, action_type, target, description, AuditSeverity::Info)
  }
}

/// The accumulating audit log threaded through one pipeline run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditLog {
  pub entries: Vec<HealAction>,
}

impl AuditLog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, action: HealAction) {
    self.entries.push(action);
  }

  pub fn has_severity_at_least(&self, severity: AuditSeverity) -> bool {
    self.entries.iter().any(|e| e.severity >= severity)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn push_and_query_severity() {
    let mut log = AuditLog::new();
    log.push(HealAction::info(Stage::Lexer, "FIXED", "line 3", "fused keyword split"));
    assert!(!log.has_severity_at_least(AuditSeverity::Error));
    log.push(HealAction::new(Stage::Scanner, "DROPPED", "doc 1", "missing kind", AuditSeverity::Error));
    assert!(log.has_severity_at_least(AuditSeverity::Error));
  }
}
