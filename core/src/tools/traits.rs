use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::error::ToolError;

/// Coarse type hint for a declared parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamType {
    fn json_type(&self) -> Option<&'static str> {
        match self {
            ParamType::String => Some("string"),
            ParamType::Number => Some("number"),
            ParamType::Integer => Some("integer"),
            ParamType::Boolean => Some("boolean"),
            ParamType::Object => Some("object"),
            ParamType::Array => Some("array"),
            ParamType::Any => None,
        }
    }
}

/// Declared parameter of a tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub type_hint: ParamType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParameterSpec {
    pub fn required(type_hint: ParamType) -> Self {
        Self {
            required: true,
            type_hint,
            ..Default::default()
        }
    }

    pub fn optional(type_hint: ParamType) -> Self {
        Self {
            required: false,
            type_hint,
            ..Default::default()
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

pub type ParameterSchema = BTreeMap<String, ParameterSpec>;

/// Read-only snapshot of a registered tool, handed to adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl ToolDefinition {
    /// JSON Schema object describing the parameters, as vendors expect it
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, spec) in &self.parameters {
            let mut prop = Map::new();
            if let Some(t) = spec.type_hint.json_type() {
                prop.insert("type".into(), json!(t));
            }
            if !spec.description.is_empty() {
                prop.insert("description".into(), json!(spec.description));
            }
            if let Some(default) = &spec.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(name.clone(), Value::Object(prop));
            if spec.required {
                required.push(json!(name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// The core trait for all tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of the tool (e.g., "inventory.lookup")
    fn name(&self) -> String;

    /// A human-readable description of what the tool does
    fn description(&self) -> String;

    /// Declared parameters
    fn parameters(&self) -> ParameterSchema;

    /// Execute the tool with already validated arguments
    async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }
}
