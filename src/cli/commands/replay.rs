use crate::config::AgentConfig;
use crate::reconciler::ToolCallEvent;
use crate::snapshot;
use crate::state::AppState;
use crate::xlsx;
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

const EVENT_BUFFER: usize = 64;

pub async fn replay(
    config: AgentConfig,
    events: PathBuf,
    workbook: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<Value> {
    let events = load_events(&events)?;

    let mut state = AppState::new(config);
    if let Some(path) = workbook {
        let book = xlsx::import(&path, state.config().default_rows, state.config().default_cols)?;
        state.start_session_with(Box::new(book));
    }

    let origin = state.active_id().clone();
    let cancel = state.stream_token();
    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
    let producer = tokio::spawn(async move {
        for event in events {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });

    let summary = state.pump(origin, &mut rx, cancel).await;
    producer.await.context("event producer task failed")?;

    let session = state.active_session();
    if let Some(path) = output.as_deref() {
        xlsx::export(session.workbook(), path)?;
    }

    Ok(json!({
        "session": session.id(),
        "summary": summary,
        "steps": session.steps(),
        "charts": session.charts(),
        "activeHighlights": session.highlights().len(),
        "snapshot": snapshot::serialize(session.workbook(), state.config().snapshot_limits()),
    }))
}

/// One event per line; blank lines are skipped.
fn load_events(path: &Path) -> Result<Vec<ToolCallEvent>> {
    if !path.exists() {
        anyhow::bail!("events file {:?} does not exist", path);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read events {:?}", path))?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid event on line {} of {:?}", idx + 1, path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reports_the_line_of_a_bad_event() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"toolCallId":"a","toolName":"add_sheet","state":"call","args":{{}}}}"#)
            .unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        let err = load_events(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }
}
