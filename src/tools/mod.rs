mod builtin;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::{SchemaError, ToolError};

pub use builtin::{builtin_tools, calculate_sum};

type ToolHandler = dyn Fn(Value) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync;

/// A callable tool the model may invoke, with the JSON schema it is advertised under.
#[derive(Clone)]
pub struct ToolSpec {
    name: String,
    description: String,
    json_schema: Value,
    handler: Arc<ToolHandler>,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("json_schema", &self.json_schema)
            .finish()
    }
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        let unconfigured = name.clone();
        Self {
            name,
            description: description.into(),
            json_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": true,
            }),
            handler: Arc::new(move |_args| {
                let message = format!("no handler configured for {unconfigured}");
                Box::pin(async move { Err(ToolError::Execution(message)) })
            }),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Result<Self, SchemaError> {
        validate_schema(&schema)?;
        self.json_schema = schema;
        Ok(self)
    }

    pub fn with_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        self.handler = Arc::new(move |args| Box::pin(handler(args)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn json_schema(&self) -> &Value {
        &self.json_schema
    }

    /// Validates `args` against the schema, then runs the handler.
    pub async fn execute(&self, args: Value) -> Result<String, ToolError> {
        validate_arguments(self.name(), &self.json_schema, &args)?;
        (self.handler)(args).await
    }
}

fn validate_schema(schema: &Value) -> Result<(), SchemaError> {
    let schema_obj = schema.as_object().ok_or(SchemaError::SchemaNotObject)?;

    if schema_obj.get("type").and_then(Value::as_str) != Some("object") {
        return Err(SchemaError::RootTypeMustBeObject);
    }

    if let Some(required) = schema_obj.get("required") {
        let all_strings = required
            .as_array()
            .is_some_and(|fields| fields.iter().all(Value::is_string));
        if !all_strings {
            return Err(SchemaError::InvalidRequired);
        }
    }

    Ok(())
}

fn validate_arguments(tool_name: &str, schema: &Value, args: &Value) -> Result<(), ToolError> {
    let invalid = |message: String| ToolError::InvalidArguments {
        tool: tool_name.to_string(),
        message,
    };

    let args_obj = args
        .as_object()
        .ok_or_else(|| invalid("arguments must be a JSON object".to_string()))?;
    let schema_obj = schema
        .as_object()
        .ok_or_else(|| invalid("tool schema must be a JSON object".to_string()))?;

    let required = schema_obj
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for field in required {
        if !args_obj.contains_key(field) {
            return Err(invalid(format!("missing required field: {field}")));
        }
    }

    let properties = schema_obj.get("properties").and_then(Value::as_object);
    let closed = schema_obj
        .get("additionalProperties")
        .and_then(Value::as_bool)
        == Some(false);

    for (key, value) in args_obj {
        let field_schema = properties.and_then(|props| props.get(key));
        match field_schema {
            None if closed => return Err(invalid(format!("unknown field: {key}"))),
            None => {}
            Some(field_schema) => {
                if let Some(type_name) = field_schema.get("type").and_then(Value::as_str) {
                    if !value_matches_type(value, type_name) {
                        return Err(invalid(format!("field '{key}' must be of type {type_name}")));
                    }
                }
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, type_name: &str) -> bool {
    match type_name {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn echo_tool() -> ToolSpec {
        ToolSpec::new("echo", "echo a word")
            .with_schema(json!({
                "type": "object",
                "properties": {"word": {"type": "string"}},
                "required": ["word"],
                "additionalProperties": false
            }))
            .expect("schema valid")
            .with_handler(|args| async move {
                Ok(args["word"].as_str().unwrap_or_default().to_string())
            })
    }

    #[test]
    fn schema_validation_rejects_non_object_root() {
        let result = ToolSpec::new("bad", "bad").with_schema(json!({"type": "string"}));
        assert!(matches!(result, Err(SchemaError::RootTypeMustBeObject)));
    }

    #[test]
    fn schema_validation_rejects_non_string_required() {
        let result = ToolSpec::new("bad", "bad")
            .with_schema(json!({"type": "object", "required": ["a", 1]}));
        assert!(matches!(result, Err(SchemaError::InvalidRequired)));
    }

    #[tokio::test]
    async fn execute_runs_handler_for_valid_arguments() {
        let output = echo_tool()
            .execute(json!({"word": "hello"}))
            .await
            .expect("tool executes");
        assert_eq!(output, "hello");
    }

    #[tokio::test]
    async fn argument_validation_reports_missing_required() {
        let err = echo_tool()
            .execute(json!({}))
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("missing required field: word"));
    }

    #[tokio::test]
    async fn argument_validation_rejects_unknown_and_mistyped_fields() {
        let unknown = echo_tool()
            .execute(json!({"word": "hi", "extra": true}))
            .await
            .expect_err("unknown field");
        assert!(unknown.to_string().contains("unknown field: extra"));

        let mistyped = echo_tool()
            .execute(json!({"word": 5}))
            .await
            .expect_err("wrong type");
        assert!(mistyped.to_string().contains("must be of type string"));
    }

    #[tokio::test]
    async fn tool_without_handler_fails_with_execution_error() {
        let err = ToolSpec::new("idle", "nothing")
            .execute(json!({}))
            .await
            .expect_err("no handler");
        assert!(matches!(err, ToolError::Execution(_)));
    }
}
