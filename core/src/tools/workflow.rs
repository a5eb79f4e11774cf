use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step of a workflow: a tool name plus the parameters fixed for that step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl WorkflowStep {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Named, ordered sequence of tool invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: String,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }
}
