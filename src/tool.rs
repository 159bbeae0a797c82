//! Tool capabilities and the subtype-keyed tool factory
//!
//! Tools are built from `tool` nodes through a [`ToolRegistry`]: an explicit
//! map from node subtype to builder, populated at startup. Built-in subtypes
//! cover the provider-hosted tools plus a placeholder function tool; hosts
//! register their own subtypes next to them.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::WarbandError;
use crate::graph::Node;

/// Tools executed by the model provider rather than locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostedTool {
    Mcp {
        url: String,
    },
    CodeInterpreter,
    FileSearch {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        vector_store_ids: Vec<String>,
    },
    WebSearch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection: Option<String>,
    },
}

/// Description of a tool as handed to an agent backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted: Option<HostedTool>,
}

/// A capability an agent may invoke
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            hosted: None,
        }
    }

    async fn invoke(&self, args: Value) -> anyhow::Result<Value>;
}

/// Provider-hosted tool descriptor
#[derive(Debug, Clone)]
pub struct HostedToolHandle {
    name: String,
    description: String,
    tool: HostedTool,
}

impl HostedToolHandle {
    pub fn new(name: impl Into<String>, description: impl Into<String>, tool: HostedTool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tool,
        }
    }

    pub fn hosted(&self) -> &HostedTool {
        &self.tool
    }
}

#[async_trait]
impl Tool for HostedToolHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            hosted: Some(self.tool.clone()),
        }
    }

    async fn invoke(&self, _args: Value) -> anyhow::Result<Value> {
        bail!("{} is executed by the model provider", self.name)
    }
}

/// Function tool without a bound implementation; echoes its input
#[derive(Debug, Clone)]
pub struct PlaceholderFunction {
    name: String,
    description: String,
}

impl PlaceholderFunction {
    pub fn from_node(node: &Node) -> Self {
        Self {
            name: node
                .data
                .name
                .clone()
                .unwrap_or_else(|| "tool_function".to_string()),
            description: node
                .data
                .description
                .clone()
                .unwrap_or_else(|| "A custom function tool".to_string()),
        }
    }
}

#[async_trait]
impl Tool for PlaceholderFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, args: Value) -> anyhow::Result<Value> {
        let input = match args.get("input") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => args.to_string(),
        };
        Ok(Value::String(format!("Function tool placeholder: {input}")))
    }
}

/// Builds a tool from a tool node
pub type ToolBuilder = Arc<dyn Fn(&Node) -> anyhow::Result<Arc<dyn Tool>> + Send + Sync>;

/// Registry of tool builders keyed by node subtype
pub struct ToolRegistry {
    builders: RwLock<HashMap<String, ToolBuilder>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            builders: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the built-in subtypes registered
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("mcp-tool", build_mcp);
        registry.register("code-interpreter", |node| {
            Ok(hosted(node, "Runs code in a provider sandbox", HostedTool::CodeInterpreter))
        });
        registry.register("file-search", build_file_search);
        registry.register("google-search", build_web_search);
        registry.register("bing-search", build_web_search);
        registry.register("function", |node| {
            Ok(Arc::new(PlaceholderFunction::from_node(node)) as Arc<dyn Tool>)
        });
        registry
    }

    /// Register (or replace) the builder for `subtype`
    pub fn register<F>(&self, subtype: impl Into<String>, builder: F)
    where
        F: Fn(&Node) -> anyhow::Result<Arc<dyn Tool>> + Send + Sync + 'static,
    {
        let subtype = subtype.into();
        debug!(subtype = %subtype, "Registering tool builder");
        self.builders.write().insert(subtype, Arc::new(builder));
    }

    pub fn contains(&self, subtype: &str) -> bool {
        self.builders.read().contains_key(subtype)
    }

    /// Registered subtypes, sorted
    pub fn subtypes(&self) -> Vec<String> {
        let mut subtypes: Vec<String> = self.builders.read().keys().cloned().collect();
        subtypes.sort();
        subtypes
    }

    /// Build the tool for `node`
    ///
    /// Returns `Ok(None)` when the node has no subtype or the subtype is not
    /// registered; builder failures are returned as errors.
    pub fn build_tool(&self, node: &Node) -> anyhow::Result<Option<Arc<dyn Tool>>> {
        let Some(subtype) = node.data.subtype.as_deref() else {
            warn!(node_id = %node.id, "Tool node has no subtype");
            return Ok(None);
        };

        // Clone the builder out so a builder may itself touch the registry.
        let builder = self.builders.read().get(subtype).cloned();
        match builder {
            Some(builder) => builder(node).map(Some),
            None => {
                warn!(node_id = %node.id, subtype, "Tool subtype not implemented");
                Ok(None)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn config_str<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.data
        .tool_config
        .as_ref()
        .and_then(|cfg| cfg.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn hosted(node: &Node, description: &str, tool: HostedTool) -> Arc<dyn Tool> {
    let description = node.data.description.as_deref().unwrap_or(description);
    Arc::new(HostedToolHandle::new(node.label(), description, tool))
}

fn build_mcp(node: &Node) -> anyhow::Result<Arc<dyn Tool>> {
    let url = config_str(node, "apiEndpoint").ok_or_else(|| {
        WarbandError::ToolConfig("MCP tool requires apiEndpoint in toolConfig".into())
    })?;
    Ok(hosted(
        node,
        "Tools served by a remote MCP server",
        HostedTool::Mcp {
            url: url.to_string(),
        },
    ))
}

fn build_file_search(node: &Node) -> anyhow::Result<Arc<dyn Tool>> {
    let vector_store_ids = node
        .data
        .tool_config
        .as_ref()
        .and_then(|cfg| cfg.get("vectorStoreIds"))
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    Ok(hosted(
        node,
        "Searches uploaded files",
        HostedTool::FileSearch { vector_store_ids },
    ))
}

fn build_web_search(node: &Node) -> anyhow::Result<Arc<dyn Tool>> {
    let connection = config_str(node, "connectionName")
        .or_else(|| config_str(node, "connectionId"))
        .map(str::to_owned);
    Ok(hosted(
        node,
        "Searches the web",
        HostedTool::WebSearch { connection },
    ))
}
