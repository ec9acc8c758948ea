//! Integer arithmetic tools.

use super::{Arguments, ParamKind, Parameter, Tool, ToolSchema};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::Value;

fn integer(args: &Arguments, name: &str) -> anyhow::Result<i64> {
    args.get(name)
        .and_then(Value::as_i64)
        .with_context(|| format!("argument '{}' is not a 64-bit integer", name))
}

fn binary_schema(name: &str, description: &str) -> ToolSchema {
    ToolSchema::new(name, description)
        .with_param(Parameter::required("a", ParamKind::Integer, "First operand"))
        .with_param(Parameter::required("b", ParamKind::Integer, "Second operand"))
}

/// Multiply two integers and return the result.
pub struct MultiplyTool;

#[async_trait]
impl Tool for MultiplyTool {
    fn schema(&self) -> ToolSchema {
        binary_schema("multiply", "Multiply two integers and return the result")
    }

    async fn call(&self, args: &Arguments) -> anyhow::Result<Value> {
        let (a, b) = (integer(args, "a")?, integer(args, "b")?);
        let product = a
            .checked_mul(b)
            .ok_or_else(|| anyhow!("{} * {} overflows a 64-bit integer", a, b))?;
        Ok(Value::from(product))
    }
}

/// Add two integers and return the result.
pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn schema(&self) -> ToolSchema {
        binary_schema("add", "Add two integers and return the result")
    }

    async fn call(&self, args: &Arguments) -> anyhow::Result<Value> {
        let (a, b) = (integer(args, "a")?, integer(args, "b")?);
        let sum = a
            .checked_add(b)
            .ok_or_else(|| anyhow!("{} + {} overflows a 64-bit integer", a, b))?;
        Ok(Value::from(sum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_multiply() {
        let result = MultiplyTool.call(&args(json!({"a": 3, "b": 5}))).await.unwrap();
        assert_eq!(result, json!(15));
    }

    #[tokio::test]
    async fn test_add_negative() {
        let result = AddTool.call(&args(json!({"a": -4, "b": 10}))).await.unwrap();
        assert_eq!(result, json!(6));
    }

    #[tokio::test]
    async fn test_overflow_is_an_error() {
        let result = MultiplyTool
            .call(&args(json!({"a": i64::MAX, "b": 2})))
            .await;
        assert!(result.unwrap_err().to_string().contains("overflows"));
    }

    #[test]
    fn test_schema_names() {
        assert_eq!(MultiplyTool.schema().name, "multiply");
        assert_eq!(AddTool.schema().parameters.len(), 2);
    }
}
