//! Agent unit - a single agent wrapped as a runnable leaf

use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::event::{Event, EventContext};
use crate::factory::ChatAgent;
use crate::graph::Node;
use crate::tool::Tool;
use crate::unit::{EventStream, UnitKind};

/// Leaf of the execution tree: one constructed agent plus its tools
pub struct AgentUnit {
    /// Node id
    pub id: String,
    /// Display label
    pub label: String,
    /// Constructed agent capability
    agent: Arc<dyn ChatAgent>,
    /// Tools bound through tool edges
    tools: Vec<Arc<dyn Tool>>,
}

impl AgentUnit {
    /// Wrap a constructed agent for `node`
    pub fn new(node: &Node, agent: Arc<dyn ChatAgent>, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label().to_string(),
            agent,
            tools,
        }
    }

    /// Get the wrapped agent
    pub fn agent(&self) -> &Arc<dyn ChatAgent> {
        &self.agent
    }

    /// Get the bound tools
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    fn stamp(&self, event: Event) -> Event {
        event.with_default_context(|| EventContext::new(&self.id, &self.label, UnitKind::Agent))
    }

    /// Run the agent, translating its updates into stamped events
    ///
    /// A failing agent stream becomes an `error` event; it never ends the
    /// caller's stream early.
    pub fn run_stream(self: Arc<Self>, message: Arc<str>) -> EventStream {
        Box::pin(stream! {
            yield self.stamp(Event::notice(format!("{} starting execution", self.label)));

            debug!(agent_id = %self.id, tools = self.tools.len(), "Agent run started");
            let mut updates = self.agent.run_stream(&message);
            while let Some(update) = updates.next().await {
                match update {
                    Ok(update) => {
                        for event in update.into_events() {
                            yield self.stamp(event);
                        }
                    }
                    Err(e) => {
                        warn!(agent_id = %self.id, error = %e, "Agent stream failed");
                        yield self.stamp(Event::error(e.to_string()));
                        break;
                    }
                }
            }

            yield self.stamp(Event::notice(format!("{} finished", self.label)));
        })
    }
}
