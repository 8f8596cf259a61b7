//! One chat session: its workbook, execution record, charts, highlights and step transcript.

use crate::errors::InvalidParamsError;
use crate::executor::{self, ExecutionOutcome, Workspace};
use crate::highlight::HighlightScheduler;
use crate::model::ChartRecord;
use crate::reconciler::ExecutionRecord;
use crate::tools::Operation;
use crate::utils::make_short_random_id;
use crate::workbook::Workbook;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::{Duration, Instant};

pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(make_short_random_id("session"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Error,
}

/// One tool invocation as shown in the chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallStep {
    pub id: String,
    pub tool_name: String,
    pub description: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Everything one chat session owns: its document, the ids it already executed,
/// charts, live highlights and the transcript of tool steps.
pub struct SessionContext {
    id: SessionId,
    title: String,
    created_at: DateTime<Utc>,
    workbook: Box<dyn Workbook>,
    record: ExecutionRecord,
    charts: Vec<ChartRecord>,
    highlights: HighlightScheduler,
    steps: Vec<ToolCallStep>,
    token_estimate: usize,
}

impl SessionContext {
    pub fn new(id: SessionId, workbook: Box<dyn Workbook>, highlight_ttl: Duration) -> Self {
        Self {
            id,
            title: DEFAULT_SESSION_TITLE.to_string(),
            created_at: Utc::now(),
            workbook,
            record: ExecutionRecord::default(),
            charts: Vec::new(),
            highlights: HighlightScheduler::new(highlight_ttl),
            steps: Vec::new(),
            token_estimate: 0,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn workbook(&self) -> &dyn Workbook {
        self.workbook.as_ref()
    }

    pub fn workbook_mut(&mut self) -> &mut dyn Workbook {
        self.workbook.as_mut()
    }

    pub fn record(&self) -> &ExecutionRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut ExecutionRecord {
        &mut self.record
    }

    /// Start a fresh execution record; used when the session becomes active.
    pub(crate) fn reset_record(&mut self) {
        self.record = ExecutionRecord::default();
    }

    pub fn charts(&self) -> &[ChartRecord] {
        &self.charts
    }

    pub fn remove_chart(&mut self, id: &str) -> bool {
        let before = self.charts.len();
        self.charts.retain(|chart| chart.id != id);
        self.charts.len() != before
    }

    pub fn clear_charts(&mut self) {
        self.charts.clear();
    }

    pub fn highlights(&self) -> &HighlightScheduler {
        &self.highlights
    }

    pub fn expire_highlights(&mut self, now: Instant) -> usize {
        self.highlights.expire(now).len()
    }

    pub fn steps(&self) -> &[ToolCallStep] {
        &self.steps
    }

    pub fn token_estimate(&self) -> usize {
        self.token_estimate
    }

    pub fn add_tokens(&mut self, tokens: usize) {
        self.token_estimate = self.token_estimate.saturating_add(tokens);
    }

    pub fn reset_tokens(&mut self) {
        self.token_estimate = 0;
    }

    /// Run one operation and append its step to the transcript.
    pub fn execute(&mut self, tool_call_id: &str, op: &Operation, now: Instant) -> ExecutionOutcome {
        let step_index = self.steps.len();
        self.steps.push(ToolCallStep {
            id: tool_call_id.to_string(),
            tool_name: op.kind().name().to_string(),
            description: op.describe(),
            status: StepStatus::Running,
            detail: None,
        });

        let mut workspace = Workspace {
            workbook: self.workbook.as_mut(),
            charts: &mut self.charts,
            highlights: &mut self.highlights,
        };
        let outcome = executor::execute(&mut workspace, op, now);

        let step = &mut self.steps[step_index];
        match &outcome {
            ExecutionOutcome::Applied => step.status = StepStatus::Completed,
            ExecutionOutcome::Skipped { reason } => {
                step.status = StepStatus::Completed;
                step.detail = Some(reason.clone());
            }
            ExecutionOutcome::Recovered { written, skipped } => {
                step.status = StepStatus::Completed;
                step.detail = Some(format!("{written} cells written, {skipped} skipped"));
            }
            ExecutionOutcome::Failed { error } => {
                step.status = StepStatus::Error;
                step.detail = Some(error.clone());
            }
        }
        outcome
    }

    /// Record an invocation whose arguments failed validation.
    pub fn record_rejection(&mut self, tool_call_id: &str, tool: &str, error: &InvalidParamsError) {
        self.steps.push(ToolCallStep {
            id: tool_call_id.to_string(),
            tool_name: tool.to_string(),
            description: format!("Rejected {tool} call"),
            status: StepStatus::Error,
            detail: Some(error.to_string()),
        });
    }
}
