use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::traits::{Tool, ToolDefinition};
use super::workflow::WorkflowDefinition;

/// A registry for managing available tools and workflows
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn Tool>>>,
    workflows: Arc<DashMap<String, WorkflowDefinition>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool; a tool with the same name is replaced
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        info!(target: "tool_registry", tool = %name, "Registering tool");
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(target: "tool_registry", tool = %name, "Replaced existing tool");
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Snapshot of every tool definition, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.iter().map(|t| t.value().definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn register_workflow(&self, workflow: WorkflowDefinition) {
        info!(target: "tool_registry", workflow = %workflow.name, steps = workflow.steps.len(), "Registering workflow");
        self.workflows.insert(workflow.name.clone(), workflow);
    }

    pub fn workflow(&self, name: &str) -> Option<WorkflowDefinition> {
        self.workflows.get(name).map(|w| w.clone())
    }

    /// Snapshot of every workflow, sorted by name
    pub fn workflows(&self) -> Vec<WorkflowDefinition> {
        let mut all: Vec<WorkflowDefinition> =
            self.workflows.iter().map(|w| w.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParameterSchema, ToolError, WorkflowStep};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> String {
            self.0.to_string()
        }
        fn description(&self) -> String {
            format!("{} tool", self.0)
        }
        fn parameters(&self) -> ParameterSchema {
            ParameterSchema::new()
        }
        async fn call(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
            Ok(json!(self.0))
        }
    }

    #[test]
    fn definitions_are_sorted_and_replaced_by_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Named("zeta")));
        registry.register(Arc::new(Named("alpha")));
        registry.register(Arc::new(Named("alpha")));

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister("zeta"));
        assert!(!registry.contains("zeta"));
    }

    #[test]
    fn clones_share_the_same_tables() {
        let registry = ToolRegistry::new();
        let view = registry.clone();
        registry.register(Arc::new(Named("alpha")));
        registry.register_workflow(
            WorkflowDefinition::new("restock", "check then reorder").step(WorkflowStep::new("alpha")),
        );
        assert!(view.get("alpha").is_some());
        assert_eq!(view.workflows().len(), 1);
        assert_eq!(view.workflow("restock").map(|w| w.steps.len()), Some(1));
    }
}
