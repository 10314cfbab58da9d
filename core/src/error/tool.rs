use thiserror::Error;

/// Failures raised by tool dispatch and the providers behind it.
///
/// Every variant carries enough structure (tool name, message) that a caller
/// can surface it verbatim without further processing.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("tool '{tool}' missing or invalid parameter: {message}")]
    InvalidParams { tool: String, message: String },

    #[error("unknown tool: '{0}'")]
    UnknownTool(String),

    #[error("command blocked by validator: {reason}")]
    BlockedCommand { reason: String },

    #[error("tool '{tool}' execution failed: {message}")]
    ExecutionFailure { tool: String, message: String },
}

impl ToolError {
    pub fn invalid_params(tool: &str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    pub fn execution(tool: &str, message: impl Into<String>) -> Self {
        Self::ExecutionFailure {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    /// Whether retry-with-backoff or self-correction may legitimately re-run
    /// the operation. Validation and dispatch errors never retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExecutionFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_execution_failures_retry() {
        assert!(ToolError::execution("runCommand", "exit 1").is_retryable());
        assert!(!ToolError::UnknownTool("fooBar".into()).is_retryable());
        assert!(!ToolError::invalid_params("readFile", "path").is_retryable());
        assert!(!ToolError::BlockedCommand {
            reason: "rm -rf /".into()
        }
        .is_retryable());
    }

    #[test]
    fn display_names_the_tool() {
        let err = ToolError::invalid_params("writeFile", "content is required");
        assert_eq!(
            err.to_string(),
            "tool 'writeFile' missing or invalid parameter: content is required"
        );
        assert_eq!(
            ToolError::UnknownTool("frobnicate".into()).to_string(),
            "unknown tool: 'frobnicate'"
        );
    }
}
