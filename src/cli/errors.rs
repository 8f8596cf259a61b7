use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_you_mean: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub try_this: Option<String>,
}

pub fn envelope_for(error: &anyhow::Error) -> ErrorEnvelope {
    let message = format!("{error:#}");

    if message.contains("does not exist") || message.contains("failed to read workbook") {
        return ErrorEnvelope {
            code: "FILE_NOT_FOUND".to_string(),
            message,
            did_you_mean: None,
            try_this: Some("check the file path and permissions".to_string()),
        };
    }

    if message.contains("invalid event on line") {
        return ErrorEnvelope {
            code: "INVALID_EVENT".to_string(),
            message,
            did_you_mean: None,
            try_this: Some(
                "write one JSON object per line, e.g. {\"toolCallId\":\"t1\",\"toolName\":\"write_cell\",\"state\":\"input-available\",\"input\":{...}}"
                    .to_string(),
            ),
        };
    }

    if message.contains("unsupported config extension") {
        return ErrorEnvelope {
            code: "INVALID_CONFIG".to_string(),
            message,
            did_you_mean: Some("yaml".to_string()),
            try_this: Some("use a .yaml, .yml or .json config file".to_string()),
        };
    }

    if message.contains("must be greater than zero") || message.contains("failed to parse") {
        return ErrorEnvelope {
            code: "INVALID_CONFIG".to_string(),
            message,
            did_you_mean: None,
            try_this: None,
        };
    }

    ErrorEnvelope {
        code: "COMMAND_FAILED".to_string(),
        message,
        did_you_mean: None,
        try_this: None,
    }
}
