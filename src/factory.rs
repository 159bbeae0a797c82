//! Agent capability contract and construction
//!
//! Concrete LLM clients live outside this crate. The orchestrator resolves an
//! [`AgentSpec`] for each agent node and hands it to an [`AgentFactory`]; the
//! factory returns a [`ChatAgent`] that streams [`AgentUpdate`]s for a prompt.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::AgentDefaults;
use crate::event::Event;
use crate::graph::Node;
use crate::tool::Tool;

/// System prompt used when an agent node has none
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful AI agent.";

/// Sampling temperature used when an agent node has none
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// A tool invocation announced by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallInfo {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallInfo {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// One fragment of an agent's streamed response
#[derive(Debug, Clone, PartialEq)]
pub enum AgentUpdate {
    /// Text delta and/or tool calls
    Fragment {
        delta: Option<String>,
        tool_calls: Vec<ToolCallInfo>,
    },
    /// Anything the backend emits that carries neither field
    Other(Value),
}

impl AgentUpdate {
    pub fn delta(delta: impl Into<String>) -> Self {
        Self::Fragment {
            delta: Some(delta.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallInfo>) -> Self {
        Self::Fragment {
            delta: None,
            tool_calls,
        }
    }

    /// Translate into unstamped events, one per tool call
    pub fn into_events(self) -> Vec<Event> {
        match self {
            Self::Fragment { delta, tool_calls } => {
                let mut events = Vec::with_capacity(tool_calls.len() + 1);
                if let Some(delta) = delta.filter(|d| !d.is_empty()) {
                    events.push(Event::text(delta));
                }
                for call in tool_calls {
                    let name = if call.name.is_empty() {
                        "unknown".to_string()
                    } else {
                        call.name
                    };
                    events.push(Event::tool_call(name, call.arguments));
                }
                events
            }
            Self::Other(Value::String(s)) => vec![Event::text(s)],
            Self::Other(value) => vec![Event::text(value.to_string())],
        }
    }
}

/// A constructed agent that can answer a prompt as a stream
pub trait ChatAgent: Send + Sync {
    fn name(&self) -> &str;

    /// Stream the agent's response to `prompt`
    fn run_stream(&self, prompt: &str) -> BoxStream<'static, anyhow::Result<AgentUpdate>>;
}

/// Model provider family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Azure,
}

impl Provider {
    /// `azure` selects Azure; every other value uses the OpenAI client
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("azure") {
            Self::Azure
        } else {
            if !value.eq_ignore_ascii_case("openai") {
                debug!(provider = value, "Unknown provider, using openai");
            }
            Self::OpenAi
        }
    }
}

/// Everything a factory needs to construct one agent
#[derive(Clone)]
pub struct AgentSpec {
    pub node_id: String,
    pub name: String,
    pub provider: Provider,
    pub model: String,
    pub instructions: String,
    pub temperature: f64,
    pub description: Option<String>,
    pub top_p: Option<f64>,
    pub max_completion_tokens: Option<u64>,
    pub response_format: Option<Value>,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl AgentSpec {
    /// Resolve an agent node against the project defaults
    pub fn resolve(node: &Node, tools: Vec<Arc<dyn Tool>>, defaults: &AgentDefaults) -> Self {
        let data = &node.data;
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        Self {
            node_id: node.id.clone(),
            name: node.label().to_string(),
            provider: Provider::parse(
                data.provider
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .unwrap_or(defaults.provider.as_str()),
            ),
            model: non_empty(&data.model).unwrap_or_else(|| defaults.model.clone()),
            instructions: non_empty(&data.system)
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            temperature: data.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            description: non_empty(&data.description),
            top_p: data.top_p,
            max_completion_tokens: data.max_completion_tokens,
            response_format: data.response_format.clone(),
            tools,
        }
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl fmt::Debug for AgentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSpec")
            .field("node_id", &self.node_id)
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("tools", &self.tool_names())
            .finish_non_exhaustive()
    }
}

/// Builds agents from resolved specs
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn create_agent(&self, spec: AgentSpec) -> anyhow::Result<Arc<dyn ChatAgent>>;
}
