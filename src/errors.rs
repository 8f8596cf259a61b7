use thiserror::Error;

/// A tool call whose arguments do not match the operation's schema.
#[derive(Debug, Error)]
#[error("{tool}: {message}")]
pub struct InvalidParamsError {
    tool: String,
    message: String,
    path: Option<String>,
}

impl InvalidParamsError {
    pub fn new(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

/// Failures reported by the host spreadsheet engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkbookError {
    #[error("sheet index {0} does not exist")]
    SheetNotFound(usize),
    #[error("sheet '{0}' already exists")]
    DuplicateSheetName(String),
    #[error("sheet name must not be empty")]
    EmptySheetName,
    #[error("cell {address} is outside the sheet bounds")]
    OutOfBounds { address: String },
    #[error("host rejected the write: {0}")]
    Rejected(String),
}
