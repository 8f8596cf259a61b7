//! Application state: the session registry, the active binding and the event pump.

use crate::config::AgentConfig;
use crate::executor::ExecutionOutcome;
use crate::memory::MemoryWorkbook;
use crate::prompt::{self, SYSTEM_PROMPT, TurnRequest};
use crate::reconciler::{Decision, IgnoreReason, Reconciler, ToolCallEvent};
use crate::session::{SessionContext, SessionId};
use crate::snapshot;
use crate::tools::tool_definitions;
use crate::workbook::Workbook;
use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type WorkbookFactory = Box<dyn Fn(&AgentConfig) -> Box<dyn Workbook>>;

/// What happened to one observed event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    Ignored {
        reason: IgnoreReason,
    },
    Pending,
    Executed {
        id: String,
        tool: String,
        outcome: ExecutionOutcome,
    },
    Rejected {
        id: String,
        tool: String,
        error: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PumpSummary {
    pub executed: usize,
    pub rejected: usize,
    pub ignored: usize,
    pub pending: usize,
    pub cancelled: bool,
}

impl PumpSummary {
    fn record(&mut self, observation: &Observation) {
        match observation {
            Observation::Ignored { .. } => self.ignored += 1,
            Observation::Pending => self.pending += 1,
            Observation::Executed { .. } => self.executed += 1,
            Observation::Rejected { .. } => self.rejected += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub created_at: String,
    pub active: bool,
    pub token_estimate: usize,
}

pub struct AppState {
    config: AgentConfig,
    sessions: IndexMap<SessionId, SessionContext>,
    active: SessionId,
    reconciler: Reconciler,
    stream_token: CancellationToken,
    factory: WorkbookFactory,
}

impl AppState {
    pub fn new(config: AgentConfig) -> Self {
        Self::with_factory(
            config,
            Box::new(|config: &AgentConfig| -> Box<dyn Workbook> {
                Box::new(MemoryWorkbook::new(config.default_rows, config.default_cols))
            }),
        )
    }

    pub fn with_factory(config: AgentConfig, factory: WorkbookFactory) -> Self {
        let id = SessionId::generate();
        let workbook = factory(&config);
        let session = SessionContext::new(id.clone(), workbook, config.highlight_ttl());
        let mut sessions = IndexMap::new();
        sessions.insert(id.clone(), session);
        Self {
            config,
            sessions,
            active: id.clone(),
            reconciler: Reconciler::new(id),
            stream_token: CancellationToken::new(),
            factory,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn active_id(&self) -> &SessionId {
        &self.active
    }

    /// Token of the stream currently allowed to mutate the active session.
    pub fn stream_token(&self) -> CancellationToken {
        self.stream_token.clone()
    }

    pub fn start_session(&mut self) -> SessionId {
        let workbook = (self.factory)(&self.config);
        self.start_session_with(workbook)
    }

    pub fn start_session_with(&mut self, workbook: Box<dyn Workbook>) -> SessionId {
        let id = SessionId::generate();
        let session = SessionContext::new(id.clone(), workbook, self.config.highlight_ttl());
        self.sessions.insert(id.clone(), session);
        self.activate(id.clone());
        id
    }

    pub fn switch_session(&mut self, id: &SessionId) -> Result<()> {
        if !self.sessions.contains_key(id) {
            return Err(anyhow!("session {id} not found"));
        }
        if *id != self.active {
            self.activate(id.clone());
        }
        Ok(())
    }

    pub fn delete_session(&mut self, id: &SessionId) -> Result<()> {
        if self.sessions.shift_remove(id).is_none() {
            return Err(anyhow!("session {id} not found"));
        }
        info!(session = %id, "session deleted");
        if self.sessions.is_empty() {
            self.start_session();
        } else if *id == self.active
            && let Some(first) = self.sessions.keys().next().cloned()
        {
            self.activate(first);
        }
        Ok(())
    }

    pub fn rename_session(&mut self, id: &SessionId, title: &str) -> Result<()> {
        let title = title.trim();
        anyhow::ensure!(!title.is_empty(), "session title must not be empty");
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| anyhow!("session {id} not found"))?;
        session.set_title(title);
        Ok(())
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.sessions
            .values()
            .map(|session| SessionSummary {
                id: session.id().clone(),
                title: session.title().to_string(),
                created_at: session.created_at().to_rfc3339(),
                active: *session.id() == self.active,
                token_estimate: session.token_estimate(),
            })
            .collect()
    }

    pub fn session(&self, id: &SessionId) -> Option<&SessionContext> {
        self.sessions.get(id)
    }

    pub fn active_session(&self) -> &SessionContext {
        self.sessions
            .get(&self.active)
            .expect("active session is always registered")
    }

    pub fn active_session_mut(&mut self) -> &mut SessionContext {
        self.sessions
            .get_mut(&self.active)
            .expect("active session is always registered")
    }

    fn activate(&mut self, id: SessionId) {
        self.stream_token.cancel();
        self.stream_token = CancellationToken::new();
        if let Some(session) = self.sessions.get_mut(&id) {
            session.reset_record();
        }
        self.reconciler.rebind(id.clone());
        info!(session = %id, previous = %self.active, "session activated");
        self.active = id;
    }

    /// Feed one stream event through the reconciler and execute it if it is due.
    pub fn observe(&mut self, origin: &SessionId, event: &ToolCallEvent) -> Observation {
        let Some(session) = self.sessions.get_mut(&self.active) else {
            return Observation::Ignored {
                reason: IgnoreReason::StaleSession,
            };
        };

        match self.reconciler.observe(origin, event, session.record_mut()) {
            Decision::Ignore(reason) => {
                debug!(session = %origin, ?reason, "event ignored");
                Observation::Ignored { reason }
            }
            Decision::Pending => Observation::Pending,
            Decision::Execute {
                id,
                tool,
                operation,
            } => {
                let outcome = session.execute(&id, &operation, Instant::now());
                Observation::Executed { id, tool, outcome }
            }
            Decision::Reject { id, tool, error } => {
                warn!(tool_call_id = %id, tool = %tool, error = %error, "tool call rejected");
                session.record_rejection(&id, &tool, &error);
                Observation::Rejected {
                    id,
                    tool,
                    error: error.to_string(),
                }
            }
        }
    }

    /// Expire due highlights in every session.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.sessions
            .values_mut()
            .map(|session| session.expire_highlights(now))
            .sum()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.sessions
            .values()
            .filter_map(|session| session.highlights().next_deadline())
            .min()
    }

    /// Drain `rx` until it closes or `cancel` fires, clearing highlights as they come due.
    pub async fn pump(
        &mut self,
        origin: SessionId,
        rx: &mut mpsc::Receiver<ToolCallEvent>,
        cancel: CancellationToken,
    ) -> PumpSummary {
        let mut summary = PumpSummary::default();
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => {
                        let observation = self.observe(&origin, &event);
                        summary.record(&observation);
                    }
                    None => break,
                },
                _ = wait_for(deadline) => {
                    self.tick(Instant::now());
                }
            }
        }
        debug!(session = %origin, ?summary, "stream finished");
        summary
    }

    /// Wait out every scheduled highlight.
    pub async fn settle(&mut self) {
        while let Some(deadline) = self.next_deadline() {
            sleep_until(deadline).await;
            self.tick(Instant::now());
        }
    }

    /// Build the outbound request for one user turn with a fresh snapshot.
    pub fn prepare_turn(&mut self, message: &str) -> TurnRequest {
        let limits = self.config.snapshot_limits();
        let chars_per_token = self.config.chars_per_token;
        let session = self.active_session_mut();
        let request = TurnRequest {
            session_id: session.id().clone(),
            system: SYSTEM_PROMPT.to_string(),
            message: message.to_string(),
            snapshot: snapshot::serialize(session.workbook(), limits),
            tools: tool_definitions(),
        };
        let tokens = prompt::estimate_tokens(request.payload_chars(), chars_per_token);
        session.add_tokens(tokens);
        debug!(session = %request.session_id, tokens, "turn prepared");
        request
    }

    pub fn remove_chart(&mut self, id: &str) -> bool {
        self.active_session_mut().remove_chart(id)
    }

    pub fn clear_charts(&mut self) {
        self.active_session_mut().clear_charts();
    }

    pub fn reset_tokens(&mut self) {
        self.active_session_mut().reset_tokens();
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::ToolCallState;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn write_event(id: &str, row: u32) -> ToolCallEvent {
        ToolCallEvent::new(
            id,
            "write_cell",
            ToolCallState::InputAvailable,
            Some(json!({"row": row, "col": 0, "value": "x"})),
        )
    }

    #[test]
    fn switching_cancels_the_previous_stream() {
        let mut state = AppState::new(AgentConfig::default());
        let first = state.active_id().clone();
        let token = state.stream_token();
        let second = state.start_session();

        assert!(token.is_cancelled());
        assert!(!state.stream_token().is_cancelled());
        assert_matches!(
            state.observe(&first, &write_event("t1", 0)),
            Observation::Ignored {
                reason: IgnoreReason::StaleSession
            }
        );
        assert_matches!(
            state.observe(&second, &write_event("t1", 0)),
            Observation::Executed { .. }
        );
    }

    #[test]
    fn deleting_the_last_session_starts_a_new_one() {
        let mut state = AppState::new(AgentConfig::default());
        let only = state.active_id().clone();
        state.delete_session(&only).unwrap();
        assert_eq!(state.sessions().len(), 1);
        assert_ne!(state.active_id(), &only);
        assert!(state.delete_session(&only).is_err());
    }

    #[test]
    fn deleting_the_active_session_activates_the_first() {
        let mut state = AppState::new(AgentConfig::default());
        let first = state.active_id().clone();
        let second = state.start_session();
        state.delete_session(&second).unwrap();
        assert_eq!(state.active_id(), &first);
    }

    #[test]
    fn prepared_turns_accumulate_token_estimate() {
        let mut state = AppState::new(AgentConfig::default());
        let request = state.prepare_turn("hello");
        assert_eq!(request.snapshot, "Sheet \"Sheet1\": empty");
        let expected = prompt::estimate_tokens(request.payload_chars(), 4);
        assert_eq!(state.active_session().token_estimate(), expected);
        state.reset_tokens();
        assert_eq!(state.active_session().token_estimate(), 0);
    }

    #[test]
    fn rename_rejects_blank_titles() {
        let mut state = AppState::new(AgentConfig::default());
        let id = state.active_id().clone();
        assert!(state.rename_session(&id, "   ").is_err());
        state.rename_session(&id, "Budget").unwrap();
        assert_eq!(state.sessions()[0].title, "Budget");
    }
}
