//! Tool Registry.

pub mod builtin;
pub mod registry;

pub use registry::{DefaultToolRegistry, DynamicToolSource, Tool, ToolOutcome, ToolRegistry, ToolSchema};

use std::sync::Arc;

/// A registry pre-loaded with the built-in handler table. The only
/// process-wide read-only state the core needs (spec.md §9).
pub fn create_default_registry() -> DefaultToolRegistry {
    DefaultToolRegistry::new()
}

/// Registers the built-in tools into an already-constructed registry.
pub async fn register_builtins(registry: &dyn ToolRegistry) -> apa_core::error::Result<()> {
    registry.register(Arc::new(builtin::EchoTool)).await?;
    registry.register(Arc::new(builtin::CalculateTool)).await?;
    registry.register(Arc::new(builtin::SearchTool)).await?;
    registry.register(Arc::new(builtin::HttpRequestTool)).await?;
    registry.register(Arc::new(builtin::SendEmailTool)).await?;
    registry.register(Arc::new(builtin::FileOperationTool)).await?;
    registry.register(Arc::new(builtin::DatabaseQueryTool)).await?;
    Ok(())
}
