pub mod cli;
pub mod config;
pub mod errors;
pub mod executor;
pub mod highlight;
pub mod memory;
pub mod model;
pub mod prompt;
pub mod range;
pub mod reconciler;
pub mod rules;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod styles;
pub mod tools;
pub mod utils;
pub mod workbook;
pub mod xlsx;

pub use config::AgentConfig;
pub use executor::ExecutionOutcome;
pub use memory::MemoryWorkbook;
pub use reconciler::{ToolCallEvent, ToolCallState};
pub use session::SessionId;
pub use state::{AppState, Observation};
pub use tools::Operation;
pub use workbook::Workbook;
