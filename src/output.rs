//! Thin reporter for the `scan`/`heal` CLI surface. JSON/SARIF reporters that turn findings
//! into richer formats are out of scope for the core; this only renders what `heal()` already
//! returns.

use std::fs::File;
use std::io::prelude::*;

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::batch::BatchReport;
use crate::finding::Findings;

#[derive(Clone, Copy, Debug, Default, ValueEnum, Serialize, Deserialize)]
pub enum Format {
  /// JSON format used for logging or writing to a *.json file.
  Json,
  /// Text table format used for writing to stdout.
  #[default]
  Text,
}

pub(crate) fn output(report: &BatchReport, format: &Format, filename: &Option<String>) -> Result<()> {
  let rendered = match format {
    Format::Json => serde_json::to_string_pretty(report)?,
    Format::Text => report.findings.to_stdout_table()?,
  };

  match filename {
    Some(filename) => {
      let mut file = File::create(filename)?;
      file.write_all(rendered.as_bytes())?;
    }
    None => println!("{rendered}"),
  }

  Ok(())
}
