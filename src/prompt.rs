use crate::session::SessionId;
use crate::tools::ToolDefinition;
use serde::Serialize;

pub const SYSTEM_PROMPT: &str = "\
You are a spreadsheet assistant working inside a live workbook. Change the workbook \
only through the provided tools; never describe edits you did not make with a tool.

Rules:
- Rows and columns are zero-based integers (A1 is row 0, col 0).
- Formulas are strings starting with '='. Prefer formulas over hard-coded totals.
- Colors are hex strings like #112233.
- Operations apply to the active sheet unless `sheet` gives a zero-based sheet index. \
add_sheet makes the new sheet active.
- Coordinates outside the sheet are clamped to its edges.
- Keep replies short and say what you changed.

The current workbook contents follow. Cells show the formula when one is present, \
otherwise the value; empty fields are blank.";

/// Everything the agent service needs for one turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub session_id: SessionId,
    pub system: String,
    pub message: String,
    pub snapshot: String,
    pub tools: Vec<ToolDefinition>,
}

impl TurnRequest {
    /// Characters in the parts of the request that count toward the context budget.
    pub fn payload_chars(&self) -> usize {
        self.system.chars().count() + self.message.chars().count() + self.snapshot.chars().count()
    }
}

pub fn estimate_tokens(chars: usize, chars_per_token: usize) -> usize {
    chars.div_ceil(chars_per_token.max(1))
}
