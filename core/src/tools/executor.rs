use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use super::error::ToolError;
use super::registry::ToolRegistry;
use super::result::ToolResult;
use super::traits::ParameterSchema;

/// Default upper bound for a single tool invocation
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;

/// Validates parameters against a tool's schema and invokes it.
///
/// Never returns an error: unknown tools, missing parameters, failures,
/// panics and timeouts all become failed `ToolResult`s carrying `runtime_ms`.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout_ms: u64,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            timeout_ms: DEFAULT_TOOL_TIMEOUT_MS,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[tracing::instrument(name = "tool_executor.execute", skip(self, raw_params), fields(tool.name = %name))]
    pub async fn execute(&self, name: &str, raw_params: Map<String, Value>) -> ToolResult {
        let Some(tool) = self.registry.get(name) else {
            warn!(target: "tool_executor", tool = %name, "Unknown tool requested");
            return ToolResult::failed(name, &ToolError::NotFound(name.to_string()), 0);
        };

        let params = match validate_params(name, &tool.parameters(), raw_params) {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "tool_executor", tool = %name, error = %e, "Parameter validation failed");
                return ToolResult::failed(name, &e, 0);
            }
        };

        debug!(target: "tool_executor", tool = %name, "Invoking tool");
        let started = Instant::now();
        let call = AssertUnwindSafe(tool.call(params)).catch_unwind();
        let outcome = match timeout(Duration::from_millis(self.timeout_ms), call).await {
            Ok(Ok(res)) => res,
            Ok(Err(_)) => Err(ToolError::ExecutionFailed("tool panicked".into())),
            Err(_) => Err(ToolError::Timeout(self.timeout_ms)),
        };
        let runtime_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(data) => ToolResult::ok(name, data, runtime_ms),
            Err(e) => {
                warn!(target: "tool_executor", tool = %name, error = %e, runtime_ms, "Tool execution failed");
                ToolResult::failed(name, &e, runtime_ms)
            }
        }
    }

    /// Run a registered workflow step by step. Shared `params` are merged
    /// under each step's own parameters; a failing step does not stop the rest.
    #[tracing::instrument(name = "tool_executor.run_workflow", skip(self, params), fields(workflow = %name))]
    pub async fn run_workflow(&self, name: &str, params: Map<String, Value>) -> Vec<ToolResult> {
        let Some(workflow) = self.registry.workflow(name) else {
            warn!(target: "tool_executor", workflow = %name, "Unknown workflow requested");
            return vec![ToolResult::failed(name, &ToolError::WorkflowNotFound(name.to_string()), 0)];
        };

        let mut results = Vec::with_capacity(workflow.steps.len());
        for step in &workflow.steps {
            let mut merged = params.clone();
            merged.extend(step.params.clone());
            results.push(self.execute(&step.tool, merged).await);
        }
        results
    }
}

/// Apply declared defaults and reject missing required parameters.
/// Parameters the schema does not declare are passed through untouched.
pub fn validate_params(
    tool: &str,
    schema: &ParameterSchema,
    mut supplied: Map<String, Value>,
) -> Result<Map<String, Value>, ToolError> {
    for (name, spec) in schema {
        if supplied.contains_key(name) {
            continue;
        }
        if let Some(default) = &spec.default {
            supplied.insert(name.clone(), default.clone());
        } else if spec.required {
            return Err(ToolError::ParameterMissing {
                tool: tool.to_string(),
                parameter: name.clone(),
            });
        }
    }
    Ok(supplied)
}
