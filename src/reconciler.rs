//! Turns the agent's streamed tool-call events into at-most-once executions.
//!
//! Per invocation id: `unseen -> pending -> ready -> executed`. The first event
//! in a sufficient state whose payload decodes is executed; the id then lands in
//! the session's [`ExecutionRecord`] and every later event for it is ignored.
//! Events whose origin is not the session the reconciler is bound to are dropped.

use crate::errors::InvalidParamsError;
use crate::session::SessionId;
use crate::tools::Operation;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCallState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
    PartialCall,
    Call,
    Result,
    #[serde(other)]
    Unknown,
}

impl ToolCallState {
    /// Arguments are complete once any of these states is reached.
    pub fn is_sufficient(self) -> bool {
        matches!(
            self,
            Self::InputAvailable | Self::OutputAvailable | Self::Result | Self::Call
        )
    }
}

/// One message of the agent stream describing a tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallEvent {
    #[serde(default, alias = "id")]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Message-part type such as `tool-write_cell`; names the tool when `toolName` is absent.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub part_type: Option<String>,
    #[serde(default)]
    pub state: Option<ToolCallState>,
    #[serde(default, alias = "args")]
    pub input: Option<Value>,
    #[serde(default, alias = "result", skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl ToolCallEvent {
    pub fn new(id: &str, tool: &str, state: ToolCallState, input: Option<Value>) -> Self {
        Self {
            tool_call_id: Some(id.to_string()),
            tool_name: Some(tool.to_string()),
            state: Some(state),
            input,
            ..Default::default()
        }
    }

    pub fn tool(&self) -> Option<&str> {
        self.tool_name
            .as_deref()
            .or_else(|| self.part_type.as_deref()?.strip_prefix("tool-"))
            .filter(|name| !name.is_empty())
    }

    pub fn id(&self) -> Option<&str> {
        self.tool_call_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Invocation ids already executed in one session. Append-only.
#[derive(Debug, Default, Clone)]
pub struct ExecutionRecord {
    ids: AHashSet<String>,
}

impl ExecutionRecord {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns false if the id was already recorded.
    pub fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Ready,
    Executed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The event came from a stream that no longer owns the active session.
    StaleSession,
    Malformed(String),
    AlreadyExecuted,
}

#[derive(Debug)]
pub enum Decision {
    Ignore(IgnoreReason),
    /// Seen, but the arguments are not complete yet.
    Pending,
    Execute {
        id: String,
        tool: String,
        operation: Operation,
    },
    /// Complete arguments that fail validation; consumed without executing.
    Reject {
        id: String,
        tool: String,
        error: InvalidParamsError,
    },
}

#[derive(Debug)]
pub struct Reconciler {
    bound: SessionId,
    phases: AHashMap<String, Phase>,
}

impl Reconciler {
    pub fn new(bound: SessionId) -> Self {
        Self {
            bound,
            phases: AHashMap::new(),
        }
    }

    pub fn bound(&self) -> &SessionId {
        &self.bound
    }

    /// Detach from the current stream and accept events only for `session`.
    pub fn rebind(&mut self, session: SessionId) {
        debug!(from = %self.bound, to = %session, "reconciler rebound");
        self.bound = session;
        self.phases.clear();
    }

    pub fn phase(&self, id: &str) -> Option<Phase> {
        self.phases.get(id).copied()
    }

    pub fn observe(
        &mut self,
        origin: &SessionId,
        event: &ToolCallEvent,
        record: &mut ExecutionRecord,
    ) -> Decision {
        if *origin != self.bound {
            return Decision::Ignore(IgnoreReason::StaleSession);
        }
        let Some(id) = event.id() else {
            return Decision::Ignore(IgnoreReason::Malformed("missing toolCallId".to_string()));
        };
        if record.contains(id) {
            self.phases.insert(id.to_string(), Phase::Executed);
            return Decision::Ignore(IgnoreReason::AlreadyExecuted);
        }
        let Some(tool) = event.tool() else {
            return Decision::Ignore(IgnoreReason::Malformed(format!("{id}: missing toolName")));
        };
        let Some(state) = event.state else {
            return Decision::Ignore(IgnoreReason::Malformed(format!("{id}: missing state")));
        };

        if !state.is_sufficient() {
            self.phases.entry(id.to_string()).or_insert(Phase::Pending);
            debug!(tool_call_id = id, tool, ?state, "tool call pending");
            return Decision::Pending;
        }
        let Some(input) = event.input.as_ref() else {
            return Decision::Ignore(IgnoreReason::Malformed(format!(
                "{id}: state {state:?} without input"
            )));
        };
        self.phases.insert(id.to_string(), Phase::Ready);

        let decision = match Operation::decode(tool, input) {
            Ok(operation) => Decision::Execute {
                id: id.to_string(),
                tool: tool.to_string(),
                operation,
            },
            Err(error) => Decision::Reject {
                id: id.to_string(),
                tool: tool.to_string(),
                error,
            },
        };
        record.insert(id);
        self.phases.insert(id.to_string(), Phase::Executed);
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn session(name: &str) -> SessionId {
        SessionId::from(name)
    }

    #[test]
    fn wire_events_decode_from_stream_shapes() {
        let event: ToolCallEvent = serde_json::from_value(json!({
            "type": "tool-write_cell",
            "toolCallId": "call_1",
            "state": "input-available",
            "input": {"row": 0, "col": 0, "value": 1}
        }))
        .unwrap();
        assert_eq!(event.tool(), Some("write_cell"));
        assert_eq!(event.state, Some(ToolCallState::InputAvailable));

        let legacy: ToolCallEvent = serde_json::from_value(json!({
            "toolCallId": "call_2",
            "toolName": "add_sheet",
            "state": "something-new",
            "args": {}
        }))
        .unwrap();
        assert_eq!(legacy.state, Some(ToolCallState::Unknown));
        assert!(legacy.input.is_some());
    }

    #[test]
    fn executes_once_across_available_states() {
        let a = session("a");
        let mut reconciler = Reconciler::new(a.clone());
        let mut record = ExecutionRecord::default();
        let input = json!({"row": 0, "col": 0, "value": "x"});

        let streaming = ToolCallEvent::new("t1", "write_cell", ToolCallState::InputStreaming, None);
        assert_matches!(reconciler.observe(&a, &streaming, &mut record), Decision::Pending);
        assert_eq!(reconciler.phase("t1"), Some(Phase::Pending));

        let available =
            ToolCallEvent::new("t1", "write_cell", ToolCallState::InputAvailable, Some(input.clone()));
        assert_matches!(
            reconciler.observe(&a, &available, &mut record),
            Decision::Execute { .. }
        );
        let output =
            ToolCallEvent::new("t1", "write_cell", ToolCallState::OutputAvailable, Some(input));
        assert_matches!(
            reconciler.observe(&a, &output, &mut record),
            Decision::Ignore(IgnoreReason::AlreadyExecuted)
        );
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn stale_origin_is_ignored_after_rebind() {
        let (a, b) = (session("a"), session("b"));
        let mut reconciler = Reconciler::new(a.clone());
        reconciler.rebind(b.clone());
        let mut record = ExecutionRecord::default();
        let event = ToolCallEvent::new(
            "t1",
            "add_sheet",
            ToolCallState::Call,
            Some(json!({})),
        );
        assert_matches!(
            reconciler.observe(&a, &event, &mut record),
            Decision::Ignore(IgnoreReason::StaleSession)
        );
        assert!(record.is_empty());
        assert_matches!(reconciler.observe(&b, &event, &mut record), Decision::Execute { .. });
    }

    #[test]
    fn malformed_events_are_dropped_without_recording() {
        let a = session("a");
        let mut reconciler = Reconciler::new(a.clone());
        let mut record = ExecutionRecord::default();

        let no_id = ToolCallEvent {
            tool_name: Some("write_cell".into()),
            state: Some(ToolCallState::InputAvailable),
            input: Some(json!({})),
            ..Default::default()
        };
        assert_matches!(
            reconciler.observe(&a, &no_id, &mut record),
            Decision::Ignore(IgnoreReason::Malformed(_))
        );

        let no_input = ToolCallEvent::new("t2", "write_cell", ToolCallState::OutputAvailable, None);
        assert_matches!(
            reconciler.observe(&a, &no_input, &mut record),
            Decision::Ignore(IgnoreReason::Malformed(_))
        );
        assert!(record.is_empty());
    }

    #[test]
    fn invalid_arguments_are_rejected_once() {
        let a = session("a");
        let mut reconciler = Reconciler::new(a.clone());
        let mut record = ExecutionRecord::default();
        let bad = ToolCallEvent::new(
            "t3",
            "write_cell",
            ToolCallState::InputAvailable,
            Some(json!({"row": "first"})),
        );
        assert_matches!(reconciler.observe(&a, &bad, &mut record), Decision::Reject { .. });
        assert_matches!(
            reconciler.observe(&a, &bad, &mut record),
            Decision::Ignore(IgnoreReason::AlreadyExecuted)
        );
    }
}
