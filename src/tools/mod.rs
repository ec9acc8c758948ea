//! Tools the agent can call, and the registry that validates and runs them.
//!
//! Every tool declares a [`ToolSchema`]; the registry checks model-supplied
//! arguments against it before the tool runs.

mod arithmetic;
mod policy;
mod registry;
mod schema;

pub use arithmetic::{AddTool, MultiplyTool};
pub use policy::LookupPolicyTool;
pub use registry::{tool_definitions, ToolOutcome, ToolRegistry};
pub use schema::{Arguments, ParamKind, Parameter, ToolSchema};

use async_trait::async_trait;
use serde_json::Value;

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declared name and parameters.
    fn schema(&self) -> ToolSchema;

    /// Run the tool with already validated arguments.
    async fn call(&self, args: &Arguments) -> anyhow::Result<Value>;
}

/// Render a tool's return value as tool-result content.
///
/// Strings are passed through unquoted; everything else is compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&json!(15)), "15");
        assert_eq!(stringify(&json!("refunds allowed")), "refunds allowed");
        assert_eq!(stringify(&json!({"ok": true})), r#"{"ok":true}"#);
        assert_eq!(stringify(&Value::Null), "null");
    }
}
