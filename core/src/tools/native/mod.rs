pub mod clock;
pub mod http_fetch;

pub use clock::ClockTool;
pub use http_fetch::{HttpFetchConfig, HttpFetchTool};

use std::sync::Arc;

use super::ToolRegistry;

/// Register every built-in tool
pub fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(ClockTool));
    registry.register(Arc::new(HttpFetchTool::new()));
}
