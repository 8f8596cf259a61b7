pub mod commands;
pub mod errors;
pub mod output;

use crate::config::{AgentConfig, ConfigArgs};
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "spreadsheet-agent",
    version,
    about = "Drive a spreadsheet from a stream of agent tool calls"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Print JSON on a single line")]
    pub compact: bool,

    #[arg(long, global = true, help = "Suppress pretty-printing and logs below warn")]
    pub quiet: bool,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Feed a JSONL file of tool-call events through a fresh session.
    Replay {
        events: PathBuf,
        #[arg(long, value_name = "FILE", help = "Start from this xlsx workbook")]
        workbook: Option<PathBuf>,
        #[arg(long, value_name = "FILE", help = "Write the resulting workbook here")]
        output: Option<PathBuf>,
    },
    /// Print the context snapshot the agent would see for an xlsx workbook.
    Snapshot { file: PathBuf },
    /// Build the request sent to the agent for one user message.
    Prompt {
        message: String,
        #[arg(long, value_name = "FILE")]
        workbook: Option<PathBuf>,
    },
    /// List the tool definitions advertised to the agent.
    Tools,
}

pub async fn run_command(command: Commands, config: ConfigArgs) -> Result<Value> {
    let config = AgentConfig::from_args(config)?;
    match command {
        Commands::Replay {
            events,
            workbook,
            output,
        } => commands::replay::replay(config, events, workbook, output).await,
        Commands::Snapshot { file } => commands::inspect::snapshot(config, file),
        Commands::Prompt { message, workbook } => {
            commands::inspect::prompt(config, message, workbook)
        }
        Commands::Tools => commands::inspect::tools(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_global_config_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "spreadsheet-agent",
            "replay",
            "events.jsonl",
            "--output",
            "out.xlsx",
            "--snapshot-row-cap",
            "50",
        ]);
        assert_eq!(cli.config.snapshot_row_cap, Some(50));
        assert_matches!(
            cli.command,
            Commands::Replay { workbook: None, output: Some(_), .. }
        );
    }
}
