use std::collections::BTreeMap;

use serde::Serialize;

/// Every tool the server knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ToolName {
    AskModel,
    ListModels,
    HealthCheck,
}

impl ToolName {
    /// Registration order, which is also the `tools/list` order
    pub const ALL: [ToolName; 3] = [
        ToolName::AskModel,
        ToolName::ListModels,
        ToolName::HealthCheck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::AskModel => "ask_model",
            ToolName::ListModels => "list_models",
            ToolName::HealthCheck => "health_check",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }
}

/// MCP tool definition
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: &'static str,
    pub properties: BTreeMap<String, SchemaProperty>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SchemaProperty {
    #[serde(rename = "type")]
    pub property_type: &'static str,
    pub description: String,
}

impl InputSchema {
    fn object() -> Self {
        Self {
            schema_type: "object",
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    fn property(mut self, name: &str, property_type: &'static str, description: &str) -> Self {
        self.properties.insert(
            name.to_string(),
            SchemaProperty {
                property_type,
                description: description.to_string(),
            },
        );
        self
    }

    fn required_property(mut self, name: &str, property_type: &'static str, description: &str) -> Self {
        self.required.push(name.to_string());
        self.property(name, property_type, description)
    }
}

fn descriptor(tool: ToolName) -> ToolDescriptor {
    let (description, input_schema) = match tool {
        ToolName::AskModel => (
            "Ask the configured model deployment a question and return its answer.",
            InputSchema::object()
                .required_property("question", "string", "Your question or prompt")
                .property(
                    "context",
                    "string",
                    "Additional context placed before the question (optional)",
                ),
        ),
        ToolName::ListModels => (
            "List the model deployments and services available through this server.",
            InputSchema::object(),
        ),
        ToolName::HealthCheck => (
            "Check that the model endpoint is reachable and accepts the configured credential.",
            InputSchema::object(),
        ),
    };

    ToolDescriptor {
        name: tool.as_str().to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Immutable, ordered table of tool descriptors built once at startup
#[derive(Debug, Clone)]
pub(crate) struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: ToolName::ALL.into_iter().map(descriptor).collect(),
        }
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Resolve a tool name against the registered set
    pub fn lookup(&self, name: &str) -> Option<ToolName> {
        self.tools
            .iter()
            .find(|tool| tool.name == name)
            .and_then(|tool| ToolName::from_name(&tool.name))
    }
}
