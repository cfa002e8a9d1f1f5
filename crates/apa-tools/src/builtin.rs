//! Built-in tools. `calculate` is the one built-in required to do real
//! work; the rest are stubs — concrete tool behavior (web search, e-mail,
//! database access) is out of scope here.

use async_trait::async_trait;
use serde_json::{json, Value};

use apa_core::error::{Error, Result};

use crate::registry::Tool;

/// Test/demo tool that echoes its input back.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the input message back"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": { "type": "string", "description": "The message to echo" }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("No message provided");
        Ok(json!({ "message": format!("Echo: {message}") }))
    }
}

/// Evaluates an arithmetic expression with a real parser — no host-language
/// `eval`, no arbitrary code execution. Built on `meval`'s restricted
/// grammar (numbers, `+ - * / ^ ( )`, and a small fixed function set).
pub struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression safely"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "An arithmetic expression, e.g. '2 + 2 * 3'"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let expression = args
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::validation("expression is required"))?;

        let result: f64 = meval::eval_str(expression)
            .map_err(|e| Error::tool(format!("invalid expression '{expression}': {e}")))?;

        Ok(json!({ "expression": expression, "result": result }))
    }
}

macro_rules! stub_tool {
    ($struct_name:ident, $name:literal, $description:literal) => {
        pub struct $struct_name;

        #[async_trait]
        impl Tool for $struct_name {
            fn name(&self) -> &str {
                $name
            }

            fn description(&self) -> &str {
                $description
            }

            fn parameters(&self) -> Value {
                json!({ "type": "object", "properties": {} })
            }

            async fn execute(&self, _args: Value) -> Result<Value> {
                Ok(json!({ "status": "mock", "tool": $name, "note": "not implemented" }))
            }
        }
    };
}

stub_tool!(SearchTool, "search", "Search the web (stub: not implemented)");
stub_tool!(
    HttpRequestTool,
    "http_request",
    "Issue an HTTP request (stub: not implemented)"
);
stub_tool!(
    SendEmailTool,
    "send_email",
    "Send an e-mail (stub: not implemented)"
);
stub_tool!(
    FileOperationTool,
    "file_operation",
    "Read or write a file (stub: not implemented)"
);
stub_tool!(
    DatabaseQueryTool,
    "database_query",
    "Query a database (stub: not implemented)"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_the_message() {
        let tool = EchoTool;
        let result = tool.execute(json!({"message": "hi"})).await.unwrap();
        assert_eq!(result["message"], "Echo: hi");
    }

    #[tokio::test]
    async fn calculate_evaluates_expression() {
        let tool = CalculateTool;
        let result = tool.execute(json!({"expression": "2+2*3"})).await.unwrap();
        assert_eq!(result["result"], 8.0);
    }

    #[tokio::test]
    async fn calculate_rejects_malformed_expression() {
        let tool = CalculateTool;
        let err = tool.execute(json!({"expression": "2+"})).await.unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
    }

    #[tokio::test]
    async fn stub_tools_return_mock_status() {
        let result = SearchTool.execute(json!({})).await.unwrap();
        assert_eq!(result["status"], "mock");
    }
}
