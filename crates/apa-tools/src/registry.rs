//! Tool Registry: resolves an action type to a handler and executes it.
//! Unknown names are a structured outcome, not an exception — the executor
//! folds the result straight into an observation either way.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use apa_core::error::Result;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolOutcome {
    pub status: String,
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_tools: Option<Vec<String>>,
}

impl ToolOutcome {
    pub fn success(tool: impl Into<String>, result: Value) -> Self {
        Self {
            status: "success".to_string(),
            tool: tool.into(),
            result: Some(result),
            error: None,
            available_tools: None,
        }
    }

    pub fn error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            tool: tool.into(),
            result: None,
            error: Some(message.into()),
            available_tools: None,
        }
    }

    pub fn not_found(tool: impl Into<String>, available_tools: Vec<String>) -> Self {
        let tool = tool.into();
        Self {
            status: "error".to_string(),
            tool: tool.clone(),
            result: None,
            error: Some(format!("Tool '{tool}' not found")),
            available_tools: Some(available_tools),
        }
    }
}

/// Supplies tools resolved by name from an external source (e.g. a
/// database-declared tool table) rather than the built-in table. Built-ins
/// always win a name collision.
#[async_trait]
pub trait DynamicToolSource: Send + Sync {
    async fn list(&self) -> Result<Vec<ToolSchema>>;
    async fn get(&self, name: &str) -> Result<Option<Arc<dyn Tool>>>;
}

#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn register(&self, tool: Arc<dyn Tool>) -> Result<()>;
    async fn execute_tool(
        &self,
        name: &str,
        parameters: Value,
        agent_id: Option<&str>,
    ) -> Result<ToolOutcome>;
    async fn get_tool_schema(&self, name: &str) -> Result<Option<ToolSchema>>;
    async fn list_available_tools(&self, agent_id: Option<&str>) -> Result<Vec<ToolSchema>>;
}

pub struct DefaultToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
    dynamic_source: Option<Arc<dyn DynamicToolSource>>,
}

impl DefaultToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
            dynamic_source: None,
        }
    }

    pub fn with_dynamic_source(dynamic_source: Arc<dyn DynamicToolSource>) -> Self {
        Self {
            tools: DashMap::new(),
            dynamic_source: Some(dynamic_source),
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for DefaultToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRegistry for DefaultToolRegistry {
    async fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        tracing::info!(tool = %name, "registering tool");
        if self.tools.contains_key(&name) {
            return Err(apa_core::Error::internal(format!(
                "tool '{name}' is already registered"
            )));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    async fn execute_tool(
        &self,
        name: &str,
        parameters: Value,
        _agent_id: Option<&str>,
    ) -> Result<ToolOutcome> {
        if let Some(tool) = self.tools.get(name) {
            tracing::debug!(tool = %name, "executing built-in tool");
            return match tool.execute(parameters).await {
                Ok(result) => Ok(ToolOutcome::success(name, result)),
                Err(err) => Ok(ToolOutcome::error(name, err.to_string())),
            };
        }

        if let Some(source) = &self.dynamic_source {
            if let Some(tool) = source.get(name).await? {
                tracing::debug!(tool = %name, "executing database-declared tool");
                return match tool.execute(parameters).await {
                    Ok(result) => Ok(ToolOutcome::success(name, result)),
                    Err(err) => Ok(ToolOutcome::error(name, err.to_string())),
                };
            }
        }

        let available = self.list_available_tools(None).await?;
        Ok(ToolOutcome::not_found(
            name,
            available.into_iter().map(|t| t.name).collect(),
        ))
    }

    async fn get_tool_schema(&self, name: &str) -> Result<Option<ToolSchema>> {
        if let Some(tool) = self.tools.get(name) {
            return Ok(Some(ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            }));
        }
        if let Some(source) = &self.dynamic_source {
            for schema in source.list().await? {
                if schema.name == name {
                    return Ok(Some(schema));
                }
            }
        }
        Ok(None)
    }

    async fn list_available_tools(&self, _agent_id: Option<&str>) -> Result<Vec<ToolSchema>> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .iter()
            .map(|entry| ToolSchema {
                name: entry.key().clone(),
                description: entry.value().description().to_string(),
                parameters: entry.value().parameters(),
            })
            .collect();

        if let Some(source) = &self.dynamic_source {
            for schema in source.list().await? {
                if !self.tools.contains_key(&schema.name) {
                    schemas.push(schema);
                }
            }
        }
        Ok(schemas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::EchoTool;

    #[tokio::test]
    async fn register_and_list() {
        let registry = DefaultToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await.unwrap();
        let tools = registry.list_available_tools(None).await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
    }

    #[tokio::test]
    async fn execute_known_tool() {
        let registry = DefaultToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await.unwrap();
        let outcome = registry
            .execute_tool("echo", serde_json::json!({"message": "hi"}), None)
            .await
            .unwrap();
        assert_eq!(outcome.status, "success");
    }

    #[tokio::test]
    async fn unknown_tool_is_structured_not_an_error() {
        let registry = DefaultToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await.unwrap();
        let outcome = registry
            .execute_tool("nonexistent", serde_json::json!({}), None)
            .await
            .unwrap();
        assert_eq!(outcome.status, "error");
        assert_eq!(outcome.error.unwrap(), "Tool 'nonexistent' not found");
        assert_eq!(outcome.available_tools.unwrap(), vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let registry = DefaultToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await.unwrap();
        assert!(registry.register(Arc::new(EchoTool)).await.is_err());
    }
}
