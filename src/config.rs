use crate::snapshot::{self, SnapshotLimits};
use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HIGHLIGHT_MS: u64 = 1_500;
const DEFAULT_ROWS: u32 = 200;
const DEFAULT_COLS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub snapshot_max_chars: usize,
    pub snapshot_row_cap: u32,
    pub highlight_ms: u64,
    pub default_rows: u32,
    pub default_cols: u32,
    pub chars_per_token: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            snapshot_max_chars: snapshot::DEFAULT_MAX_CHARS,
            snapshot_row_cap: snapshot::DEFAULT_ROW_CAP,
            highlight_ms: DEFAULT_HIGHLIGHT_MS,
            default_rows: DEFAULT_ROWS,
            default_cols: DEFAULT_COLS,
            chars_per_token: snapshot::AVG_CHARS_PER_TOKEN,
        }
    }
}

impl AgentConfig {
    pub fn from_args(args: ConfigArgs) -> Result<Self> {
        let ConfigArgs {
            config,
            snapshot_max_chars: cli_snapshot_max_chars,
            snapshot_row_cap: cli_snapshot_row_cap,
            highlight_ms: cli_highlight_ms,
            default_rows: cli_default_rows,
            default_cols: cli_default_cols,
            chars_per_token: cli_chars_per_token,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            snapshot_max_chars: file_snapshot_max_chars,
            snapshot_row_cap: file_snapshot_row_cap,
            highlight_ms: file_highlight_ms,
            default_rows: file_default_rows,
            default_cols: file_default_cols,
            chars_per_token: file_chars_per_token,
        } = file_config;

        let defaults = Self::default();

        let snapshot_max_chars = cli_snapshot_max_chars
            .or(file_snapshot_max_chars)
            .unwrap_or(defaults.snapshot_max_chars);
        anyhow::ensure!(
            snapshot_max_chars > 0,
            "snapshot_max_chars must be greater than zero"
        );

        let snapshot_row_cap = cli_snapshot_row_cap
            .or(file_snapshot_row_cap)
            .unwrap_or(defaults.snapshot_row_cap);
        anyhow::ensure!(
            snapshot_row_cap > 0,
            "snapshot_row_cap must be greater than zero"
        );

        let highlight_ms = cli_highlight_ms
            .or(file_highlight_ms)
            .unwrap_or(defaults.highlight_ms);

        let default_rows = cli_default_rows
            .or(file_default_rows)
            .unwrap_or(defaults.default_rows)
            .max(1);
        let default_cols = cli_default_cols
            .or(file_default_cols)
            .unwrap_or(defaults.default_cols)
            .max(1);

        let chars_per_token = cli_chars_per_token
            .or(file_chars_per_token)
            .unwrap_or(defaults.chars_per_token)
            .max(1);

        Ok(Self {
            snapshot_max_chars,
            snapshot_row_cap,
            highlight_ms,
            default_rows,
            default_cols,
            chars_per_token,
        })
    }

    pub fn snapshot_limits(&self) -> SnapshotLimits {
        SnapshotLimits {
            max_chars: self.snapshot_max_chars,
            row_cap: self.snapshot_row_cap,
        }
    }

    pub fn highlight_ttl(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "SPREADSHEET_AGENT_SNAPSHOT_MAX_CHARS",
        value_name = "N",
        help = "Character budget for the workbook snapshot (default: 24000)",
        global = true
    )]
    pub snapshot_max_chars: Option<usize>,

    #[arg(
        long,
        env = "SPREADSHEET_AGENT_SNAPSHOT_ROW_CAP",
        value_name = "N",
        help = "Rows scanned per sheet when building a snapshot (default: 200)",
        global = true
    )]
    pub snapshot_row_cap: Option<u32>,

    #[arg(
        long,
        env = "SPREADSHEET_AGENT_HIGHLIGHT_MS",
        value_name = "MS",
        help = "How long written cells stay highlighted (default: 1500)",
        global = true
    )]
    pub highlight_ms: Option<u64>,

    #[arg(
        long,
        env = "SPREADSHEET_AGENT_DEFAULT_ROWS",
        value_name = "N",
        help = "Row count of newly created sheets (default: 200)",
        global = true
    )]
    pub default_rows: Option<u32>,

    #[arg(
        long,
        env = "SPREADSHEET_AGENT_DEFAULT_COLS",
        value_name = "N",
        help = "Column count of newly created sheets (default: 60)",
        global = true
    )]
    pub default_cols: Option<u32>,

    #[arg(
        long,
        env = "SPREADSHEET_AGENT_CHARS_PER_TOKEN",
        value_name = "N",
        help = "Characters per token used for the running token estimate (default: 4)",
        global = true
    )]
    pub chars_per_token: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    snapshot_max_chars: Option<usize>,
    snapshot_row_cap: Option<u32>,
    highlight_ms: Option<u64>,
    default_rows: Option<u32>,
    default_cols: Option<u32>,
    chars_per_token: Option<usize>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
