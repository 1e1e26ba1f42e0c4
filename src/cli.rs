//! `yamlr` CLI surface (§6): `scan` reports without touching files, `heal` rewrites them in
//! place behind a confirmation prompt unless `--yes`/`--yes-all` is given.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::{fs, process};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::Verbosity;
use serde::{Deserialize, Serialize};

use crate::batch::{self, BatchReport};
use crate::config;
use crate::context::RunOptions;
use crate::output::{self, Format};

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .header(anstyle::Style::new().bold().underline().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .literal(anstyle::Style::new().bold().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightCyan))))
    .usage(anstyle::Style::new().bold().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .placeholder(anstyle::Style::new().bold().underline().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))))
}

#[derive(Parser, Debug)]
#[command(author, about, version)]
#[command(propagate_version = true)]
#[command(styles=get_styles())]
pub struct Cli {
  #[command(subcommand)]
  pub commands: Commands,

  #[clap(flatten)]
  pub verbose: Verbosity,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  #[command(arg_required_else_help = true)]
  Scan(Scan),
  #[command(arg_required_else_help = true)]
  Heal(Heal),
}

/// Scan one or more manifests and report findings without writing anything back (§6).
#[derive(Args, Debug, Serialize, Deserialize)]
pub struct Scan {
  /// YAML files or directories to scan
  #[arg(required = true)]
  pub paths: Vec<String>,

  /// Path to a `.yamlrc.yaml`; defaults to one found in the current directory
  #[arg(short, long)]
  pub config: Option<String>,

  /// Require both kind and apiVersion on every document; drop the rest instead of inferring
  #[arg(long)]
  pub strict: bool,

  /// Target cluster version (`vMAJOR.MINOR`) used to decide which deprecations apply
  #[arg(long)]
  pub cluster_version: Option<String>,

  #[arg(short, long, value_enum, default_value_t)]
  pub format: Format,

  /// Write to file instead of stdout
  #[arg(short, long)]
  pub output: Option<String>,
}

/// Heal one or more manifests: fix syntax, migrate deprecated APIs, and report findings (§6).
#[derive(Args, Debug, Serialize, Deserialize)]
pub struct Heal {
  /// YAML files or directories to heal
  #[arg(required = true)]
  pub paths: Vec<String>,

  #[arg(short, long)]
  pub config: Option<String>,

  #[arg(long)]
  pub strict: bool,

  #[arg(long)]
  pub cluster_version: Option<String>,

  /// Collapse output to indent=2/sequence=2/offset=0 rather than mirroring the input's layout
  #[arg(long)]
  pub compact: bool,

  #[arg(short, long, value_enum, default_value_t)]
  pub format: Format,

  #[arg(short, long)]
  pub output: Option<String>,

  /// Print the healed text instead of writing files back
  #[arg(long)]
  pub dry_run: bool,

  /// Assume yes for each file's write confirmation
  #[arg(short = 'y', long)]
  pub yes: bool,

  /// Assume yes for every file in this run, skipping all prompts
  #[arg(long)]
  pub yes_all: bool,
}

fn collect_files(paths: &[String]) -> Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for path in paths {
    collect_one(Path::new(path), &mut files)?;
  }
  Ok(files)
}

fn collect_one(path: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
  if path.is_dir() {
    for entry in fs::read_dir(path).with_context(|| format!("failed to read directory '{}'", path.display()))? {
      let entry = entry?;
      let child = entry.path();
      if child.is_dir() {
        collect_one(&child, out)?;
      } else if matches!(child.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")) {
        out.push(child);
      }
    }
  } else {
    out.push(path.to_path_buf());
  }
  Ok(())
}

fn read_inputs(paths: &[String]) -> Result<Vec<(String, String)>> {
  let files = collect_files(paths)?;
  files
    .into_iter()
    .map(|path| {
      let text = fs::read_to_string(&path).with_context(|| format!("failed to read '{}'", path.display()))?;
      Ok((path.to_string_lossy().into_owned(), text))
    })
    .collect()
}

fn filter_ignored(report: &mut BatchReport, cfg: &config::Config) {
  report.findings.retain(|f| !cfg.checks.is_ignored(f.file_path.as_deref().unwrap_or(""), f.rule_id.as_deref()));
  for file in &mut report.files {
    let path = file.file_path.clone();
    file.findings.retain(|f| !cfg.checks.is_ignored(f.file_path.as_deref().unwrap_or(&path), f.rule_id.as_deref()));
  }
}

pub fn scan(args: Scan) -> Result<()> {
  let cfg = config::load(args.config.as_deref())?;
  let inputs = read_inputs(&args.paths)?;
  let options = RunOptions { strict_validation: args.strict, compact: false, cluster_version: args.cluster_version.clone(), file_path: None };

  let mut report = batch::run(&inputs, &options);
  filter_ignored(&mut report, &cfg);
  output::output(&report, &args.format, &args.output)?;

  process::exit(report.exit_code());
}

pub fn heal(args: Heal) -> Result<()> {
  let cfg = config::load(args.config.as_deref())?;
  let inputs = read_inputs(&args.paths)?;
  let options = RunOptions { strict_validation: args.strict, compact: args.compact, cluster_version: args.cluster_version.clone(), file_path: None };

  let mut report = batch::run(&inputs, &options);
  filter_ignored(&mut report, &cfg);

  if args.dry_run {
    output::output(&report, &args.format, &args.output)?;
    process::exit(report.exit_code());
  }

  let mut assume_yes = args.yes_all;
  let mut unconfirmed = false;
  for file in &report.files {
    if !file.changed {
      continue;
    }
    if !assume_yes && !args.yes && !confirm(&format!("write healed output to {}?", file.file_path))? {
      unconfirmed = true;
      continue;
    }
    fs::write(&file.file_path, &file.healed_text).with_context(|| format!("failed to write '{}'", file.file_path))?;
    if args.yes_all {
      assume_yes = true;
    }
  }

  output::output(&report, &args.format, &args.output)?;

  let any_error = report.findings.iter().any(|f| f.severity == crate::finding::Severity::Error);
  process::exit(if unconfirmed || any_error { 1 } else { 0 });
}

fn confirm(prompt: &str) -> Result<bool> {
  print!("{prompt} [y/N] ");
  std::io::stdout().flush()?;
  let mut line = String::new();
  std::io::stdin().read_line(&mut line)?;
  Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
