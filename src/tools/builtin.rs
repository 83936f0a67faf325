use serde_json::{Value, json};

use crate::error::{SchemaError, ToolError};
use crate::tools::ToolSpec;

/// Tools the workshop agent gets unless `--no-tools` is passed.
pub fn builtin_tools() -> Result<Vec<ToolSpec>, SchemaError> {
    Ok(vec![calculate_sum()?])
}

pub fn calculate_sum() -> Result<ToolSpec, SchemaError> {
    let tool = ToolSpec::new("calculate_sum", "Add two integers and return their sum.")
        .with_schema(json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer", "description": "first addend"},
                "b": {"type": "integer", "description": "second addend"}
            },
            "required": ["a", "b"],
            "additionalProperties": false
        }))?;
    Ok(tool.with_handler(|args| async move { sum(&args) }))
}

fn sum(args: &Value) -> Result<String, ToolError> {
    let a = integer_arg(args, "a")?;
    let b = integer_arg(args, "b")?;
    a.checked_add(b)
        .map(|total| total.to_string())
        .ok_or_else(|| ToolError::Execution(format!("{a} + {b} overflows a 64-bit integer")))
}

fn integer_arg(args: &Value, key: &str) -> Result<i64, ToolError> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| ToolError::Execution(format!("{key} must fit in a signed 64-bit integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn adds_two_integers() {
        let output = calculate_sum()
            .expect("schema valid")
            .execute(json!({"a": 40, "b": 2}))
            .await
            .expect("sum");
        assert_eq!(output, "42");
    }

    #[tokio::test]
    async fn overflow_is_an_execution_error() {
        let err = calculate_sum()
            .expect("schema valid")
            .execute(json!({"a": i64::MAX, "b": 1}))
            .await
            .expect_err("overflow");
        assert!(matches!(err, ToolError::Execution(_)));
    }

    #[tokio::test]
    async fn non_integer_arguments_are_rejected_before_the_handler() {
        let err = calculate_sum()
            .expect("schema valid")
            .execute(json!({"a": 1.5, "b": 2}))
            .await
            .expect_err("float");
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn builtin_set_contains_calculate_sum() {
        let names = builtin_tools()
            .expect("schemas valid")
            .iter()
            .map(|tool| tool.name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["calculate_sum"]);
    }
}
