//! Tool registry: name lookup, argument validation and invocation.

use super::{stringify, Tool, ToolSchema};
use crate::agent::ToolCallRequest;
use crate::error::{KallError, Result};
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

struct Entry {
    schema: ToolSchema,
    tool: Arc<dyn Tool>,
}

/// Fixed mapping from tool name to tool, built once at agent construction.
pub struct ToolRegistry {
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
}

/// Result of dispatching one tool call, ready to become a tool message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    /// Identifier of the originating call.
    pub call_id: String,
    /// Tool name the model asked for.
    pub name: String,
    /// Stringified return value or error description.
    pub content: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl ToolRegistry {
    /// Build a registry. Tool names must be unique.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        let mut entries = Vec::with_capacity(tools.len());
        let mut by_name = HashMap::with_capacity(tools.len());

        for tool in tools {
            let schema = tool.schema();
            if by_name.insert(schema.name.clone(), entries.len()).is_some() {
                return Err(KallError::Config(format!(
                    "Tool '{}' is registered twice",
                    schema.name
                )));
            }
            entries.push(Entry { schema, tool });
        }

        Ok(Self { entries, by_name })
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.by_name
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| KallError::UnknownTool(name.to_string()))
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Result<&Arc<dyn Tool>> {
        self.entry(name).map(|e| &e.tool)
    }

    /// Validate `arguments` against the tool's schema, then call it.
    ///
    /// The tool is not called when validation fails.
    pub async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value> {
        let entry = self.entry(name)?;
        let args = entry.schema.validate(arguments)?;

        entry
            .tool
            .call(&args)
            .await
            .map_err(|source| KallError::ToolExecution {
                tool: name.to_string(),
                source,
            })
    }

    /// Execute a model-issued tool call.
    ///
    /// Never fails: errors are rendered into the outcome so the model can
    /// react to them.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> ToolOutcome {
        debug!("Dispatching tool call {} ({})", call.id, call.name);

        let result = match parse_arguments(&call.name, &call.arguments) {
            Ok(args) => self.invoke(&call.name, &args).await,
            Err(e) => Err(e),
        };

        let (content, is_error) = match result {
            Ok(value) => (stringify(&value), false),
            Err(e) => (format!("Error: {}", e), true),
        };

        ToolOutcome {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content,
            is_error,
        }
    }

    /// Schemas of all registered tools, in registration order.
    pub fn schemas(&self) -> impl Iterator<Item = &ToolSchema> {
        self.entries.iter().map(|e| &e.schema)
    }

    /// OpenAI tool definitions for every registered tool.
    pub fn definitions(&self) -> Vec<ChatCompletionTool> {
        tool_definitions(self.schemas())
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse the raw argument text the model sent. Empty text means no arguments.
pub(crate) fn parse_arguments(tool: &str, raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| KallError::InvalidArguments {
        tool: tool.to_string(),
        reason: format!("arguments are not valid JSON: {}", e),
    })
}

/// Get OpenAI function/tool definitions for a set of schemas.
pub fn tool_definitions<'a>(schemas: impl IntoIterator<Item = &'a ToolSchema>) -> Vec<ChatCompletionTool> {
    schemas
        .into_iter()
        .map(|schema| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: schema.name.clone(),
                description: Some(schema.description.clone()),
                parameters: Some(schema.to_json_schema()),
                strict: None,
            },
        })
        .collect()
}
