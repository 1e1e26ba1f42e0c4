//! Configuration loaded from `.yamlrc.yaml`, exposing the `IsIgnored`/`HealthThreshold`
//! contract the core requires from an external config loader (§6, §3.1).

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from `.yamlrc.yaml` or an explicit path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub checks: ChecksConfig,
  /// Files/findings below this score or severity mix fail a `scan`/`heal` run.
  #[serde(default = "default_health_threshold")]
  pub health_threshold: i32,
}

fn default_health_threshold() -> i32 {
  70
}

impl Default for Config {
  fn default() -> Self {
    Self { checks: ChecksConfig::default(), health_threshold: default_health_threshold() }
  }
}

/// Glob-based ignore rules, optionally scoped to a specific analyzer rule id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChecksConfig {
  #[serde(default)]
  pub ignore: Vec<IgnoreRule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IgnoreRule {
  pub path: String,
  #[serde(default)]
  pub rule_id: Option<String>,
}

impl ChecksConfig {
  fn matching_globset(&self, rule_id: Option<&str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for rule in &self.ignore {
      if rule.rule_id.is_none() || rule.rule_id.as_deref() == rule_id {
        builder.add(Glob::new(&rule.path).with_context(|| format!("invalid ignore glob '{}'", rule.path))?);
      }
    }
    builder.build().context("failed to build ignore globset")
  }

  /// `is_ignored(file_path, rule_id)` from the config contract (§6). Glob patterns are
  /// supported; a rule with no `rule_id` ignores every finding for matching paths.
  pub fn is_ignored(&self, file_path: &str, rule_id: Option<&str>) -> bool {
    self.matching_globset(rule_id).map(|set| set.is_match(file_path)).unwrap_or(false)
  }
}

const DEFAULT_CONFIG_FILE: &str = ".yamlrc.yaml";

/// Load configuration from an explicit path, the default `.yamlrc.yaml` in the current working
/// directory, or fall back to `Config::default()`.
pub fn load(path: Option<&str>) -> Result<Config> {
  load_from(path, std::env::current_dir().ok().as_deref())
}

fn load_from(path: Option<&str>, base_dir: Option<&std::path::Path>) -> Result<Config> {
  if let Some(p) = path {
    let contents = std::fs::read_to_string(p).with_context(|| format!("Failed to read config file: {p}"))?;
    let config: Config = serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config file: {p}"))?;
    return Ok(config);
  }

  if let Some(dir) = base_dir {
    let default_path = dir.join(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
      let contents = std::fs::read_to_string(&default_path).with_context(|| format!("Failed to read config file: {}", default_path.display()))?;
      let config: Config = serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config file: {}", default_path.display()))?;
      return Ok(config);
    }
  }

  Ok(Config::default())
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[test]
  fn config_default() {
    let cfg = Config::default();
    assert_eq!(cfg.health_threshold, 70);
    assert!(cfg.checks.ignore.is_empty());
  }

  #[test]
  fn is_ignored_matches_glob() {
    let cfg = ChecksConfig { ignore: vec![IgnoreRule { path: "vendor/**".into(), rule_id: None }] };
    assert!(cfg.is_ignored("vendor/chart/templates/deploy.yaml", Some("images/no-latest")));
    assert!(!cfg.is_ignored("charts/app.yaml", None));
  }

  #[test]
  fn is_ignored_scoped_to_rule_id() {
    let cfg = ChecksConfig { ignore: vec![IgnoreRule { path: "tests/**".into(), rule_id: Some("resources/missing-limits".into()) }] };
    assert!(cfg.is_ignored("tests/fixture.yaml", Some("resources/missing-limits")));
    assert!(!cfg.is_ignored("tests/fixture.yaml", Some("images/no-latest")));
  }

  #[test]
  fn deserialize_full_yaml() {
    let yaml = r#"
health_threshold: 85
checks:
  ignore:
    - path: "vendor/**"
    - path: "tests/**"
      rule_id: "resources/missing-limits"
"#;
    let cfg: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.health_threshold, 85);
    assert_eq!(cfg.checks.ignore.len(), 2);
  }

  #[test]
  fn load_explicit_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("my-config.yaml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "health_threshold: 90").unwrap();

    let cfg = load_from(Some(path.to_str().unwrap()), None).unwrap();
    assert_eq!(cfg.health_threshold, 90);
  }

  #[test]
  fn load_default_file_in_base_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let default_path = tmp.path().join(".yamlrc.yaml");
    let mut f = std::fs::File::create(&default_path).unwrap();
    writeln!(f, "health_threshold: 55").unwrap();

    let cfg = load_from(None, Some(tmp.path())).unwrap();
    assert_eq!(cfg.health_threshold, 55);
  }

  #[test]
  fn load_no_base_dir_returns_default() {
    let cfg = load_from(None, None).unwrap();
    assert_eq!(cfg.health_threshold, 70);
  }
}
