use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    NotFound(String),

    #[error("unknown workflow: {0}")]
    WorkflowNotFound(String),

    #[error("tool '{tool}' is missing required parameter '{parameter}'")]
    ParameterMissing { tool: String, parameter: String },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),
}
