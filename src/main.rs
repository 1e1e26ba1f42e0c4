//! `yamlr` is a forgiving healer for Kubernetes YAML manifests.

use anyhow::Result;
use clap::Parser;
use tracing_log::AsTrace;
use tracing_subscriber::FmtSubscriber;
use yamlr::{Cli, Commands, heal, scan};

fn main() -> Result<()> {
  let cli = Cli::parse();

  let subscriber = FmtSubscriber::builder().with_max_level(cli.verbose.log_level_filter().as_trace()).without_time().pretty().finish();
  tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

  match cli.commands {
    Commands::Scan(args) => scan(args)?,
    Commands::Heal(args) => heal(args)?,
  }

  Ok(())
}
