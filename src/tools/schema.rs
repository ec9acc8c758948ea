//! Declared tool parameters and argument validation.

use crate::error::{KallError, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Arguments passed to a tool: parameter name to JSON value.
pub type Arguments = Map<String, Value>;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamKind {
    /// Whether `value` has this JSON type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

impl Parameter {
    /// A required parameter.
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
        }
    }

    /// An optional parameter.
    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Name, description and parameters of a tool, as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
}

impl ToolSchema {
    /// Create a schema without parameters.
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Render the parameters as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({ "type": p.kind.as_str(), "description": p.description }),
                )
            })
            .collect();

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Check `arguments` against the declared parameters.
    ///
    /// Rejects non-objects, missing required fields, unknown fields and
    /// values of the wrong type.
    pub fn validate(&self, arguments: &Value) -> Result<Arguments> {
        let invalid = |reason: String| KallError::InvalidArguments {
            tool: self.name.clone(),
            reason,
        };

        let args = arguments
            .as_object()
            .ok_or_else(|| invalid(format!("expected a JSON object, got {}", arguments)))?;

        for param in &self.parameters {
            match args.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(invalid(format!("missing required argument '{}'", param.name)));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.kind.accepts(value) => {
                    return Err(invalid(format!(
                        "argument '{}' must be {}, got {}",
                        param.name, param.kind, value
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some(extra) = args
            .keys()
            .find(|key| !self.parameters.iter().any(|p| &p.name == *key))
        {
            return Err(invalid(format!("unexpected argument '{}'", extra)));
        }

        Ok(args.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_schema() -> ToolSchema {
        ToolSchema::new("add", "Add two integers")
            .with_param(Parameter::required("a", ParamKind::Integer, "First"))
            .with_param(Parameter::required("b", ParamKind::Integer, "Second"))
            .with_param(Parameter::optional("note", ParamKind::String, "Ignored"))
    }

    #[test]
    fn test_json_schema() {
        let schema = add_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "integer");
        assert_eq!(schema["required"], json!(["a", "b"]));
    }

    #[test]
    fn test_valid_arguments() {
        let args = add_schema().validate(&json!({"a": 3, "b": 5})).unwrap();
        assert_eq!(args["a"], 3);

        assert!(add_schema()
            .validate(&json!({"a": 3, "b": 5, "note": null}))
            .is_ok());
    }

    #[test]
    fn test_missing_argument() {
        let err = add_schema().validate(&json!({"a": 3})).unwrap_err();
        match err {
            KallError::InvalidArguments { tool, reason } => {
                assert_eq!(tool, "add");
                assert!(reason.contains("'b'"));
            }
            other => panic!("Expected InvalidArguments, got {:?}", other),
        }
    }

    #[test]
    fn test_extra_argument() {
        let err = add_schema()
            .validate(&json!({"a": 3, "b": 5, "c": 7}))
            .unwrap_err();
        assert!(err.to_string().contains("unexpected argument 'c'"));
    }

    #[test]
    fn test_mistyped_argument() {
        assert!(add_schema().validate(&json!({"a": "3", "b": 5})).is_err());
        assert!(add_schema().validate(&json!({"a": 3.5, "b": 5})).is_err());
        assert!(add_schema().validate(&json!([3, 5])).is_err());
    }

    #[test]
    fn test_number_accepts_integers() {
        assert!(ParamKind::Number.accepts(&json!(3)));
        assert!(ParamKind::Number.accepts(&json!(3.5)));
        assert!(!ParamKind::Integer.accepts(&json!(3.5)));
    }
}
