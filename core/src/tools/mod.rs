pub mod error;
pub mod executor;
pub mod extractor;
pub mod native;
pub mod registry;
pub mod result;
pub mod traits;
pub mod workflow;

// Re-export common types
pub use error::ToolError;
pub use executor::{validate_params, ToolExecutor, DEFAULT_TOOL_TIMEOUT_MS};
pub use extractor::{coerce_value, parse_params, Grammar, ToolCallExtractor};
pub use registry::ToolRegistry;
pub use result::ToolResult;
pub use traits::{ParamType, ParameterSchema, ParameterSpec, Tool, ToolDefinition};
pub use workflow::{WorkflowDefinition, WorkflowStep};
