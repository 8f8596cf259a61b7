use crate::config::AgentConfig;
use crate::snapshot;
use crate::state::AppState;
use crate::tools::tool_definitions;
use crate::xlsx;
use anyhow::Result;
use serde_json::{Value, json};
use std::path::PathBuf;

pub fn snapshot(config: AgentConfig, file: PathBuf) -> Result<Value> {
    let workbook = xlsx::import(&file, config.default_rows, config.default_cols)?;
    let text = snapshot::serialize(&workbook, config.snapshot_limits());
    Ok(json!({
        "file": file.display().to_string(),
        "chars": text.chars().count(),
        "snapshot": text,
    }))
}

pub fn prompt(config: AgentConfig, message: String, workbook: Option<PathBuf>) -> Result<Value> {
    let mut state = AppState::new(config);
    if let Some(path) = workbook {
        let book = xlsx::import(&path, state.config().default_rows, state.config().default_cols)?;
        state.start_session_with(Box::new(book));
    }
    let request = state.prepare_turn(&message);
    let mut value = serde_json::to_value(&request)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "tokenEstimate".to_string(),
            json!(state.active_session().token_estimate()),
        );
    }
    Ok(value)
}

pub fn tools() -> Result<Value> {
    Ok(serde_json::to_value(tool_definitions())?)
}
