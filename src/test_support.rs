//! Test-only agents, factories and graph builders.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;

use crate::config::TeamSettings;
use crate::event::Event;
use crate::factory::{AgentFactory, AgentSpec, AgentUpdate, ChatAgent};
use crate::graph::{Edge, Node, NodeKind, ProjectGraph};
use crate::tool::{PlaceholderFunction, Tool, ToolRegistry};
use crate::unit::EventStream;

/// One step of a scripted agent response
#[derive(Debug, Clone)]
pub enum Step {
    Update(AgentUpdate),
    Fail(String),
    Pause(u64),
}

pub fn say(text: &str) -> Step {
    Step::Update(AgentUpdate::delta(text))
}

/// Agent replaying a fixed script and recording the prompts it saw
pub struct ScriptedAgent {
    name: String,
    steps: Vec<Step>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAgent {
    pub fn new(name: &str, steps: Vec<Step>) -> Self {
        Self {
            name: name.to_string(),
            steps,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl ChatAgent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_stream(&self, prompt: &str) -> BoxStream<'static, anyhow::Result<AgentUpdate>> {
        self.prompts.lock().push(prompt.to_string());
        let steps = self.steps.clone();
        Box::pin(async_stream::stream! {
            for step in steps {
                match step {
                    Step::Update(update) => {
                        yield Ok(update);
                    }
                    Step::Fail(message) => {
                        yield Err(anyhow!(message));
                    }
                    Step::Pause(ms) => {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                    }
                }
            }
        })
    }
}

/// Factory handing out scripted agents, counting every call
#[derive(Default)]
pub struct ScriptedFactory {
    scripts: HashMap<String, Vec<Step>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
    specs: Mutex<Vec<AgentSpec>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the agent built for `node_id`
    pub fn script(mut self, node_id: &str, steps: Vec<Step>) -> Self {
        self.scripts.insert(node_id.to_string(), steps);
        self
    }

    /// Make construction of `node_id` fail
    pub fn failing(mut self, node_id: &str) -> Self {
        self.failing.insert(node_id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn spec(&self, node_id: &str) -> Option<AgentSpec> {
        self.specs
            .lock()
            .iter()
            .find(|s| s.node_id == node_id)
            .cloned()
    }
}

#[async_trait]
impl AgentFactory for ScriptedFactory {
    async fn create_agent(&self, spec: AgentSpec) -> anyhow::Result<Arc<dyn ChatAgent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&spec.node_id) {
            return Err(anyhow!("no credentials for {}", spec.node_id));
        }
        let steps = self
            .scripts
            .get(&spec.node_id)
            .cloned()
            .unwrap_or_else(|| vec![say(&format!("{} reply", spec.name))]);
        let agent = ScriptedAgent::new(&spec.name, steps);
        self.specs.lock().push(spec);
        Ok(Arc::new(agent))
    }
}

/// Registry with a counted `function` builder and an always-failing `broken` builder
pub fn counting_registry() -> (ToolRegistry, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = ToolRegistry::new();
    let seen = Arc::clone(&counter);
    registry.register("function", move |node| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(PlaceholderFunction::from_node(node)) as Arc<dyn Tool>)
    });
    registry.register("broken", |node| Err(anyhow!("cannot build {}", node.id)));
    (registry, counter)
}

pub fn agent(id: &str) -> Node {
    Node::new(id, NodeKind::Agent).with_label(&id.to_uppercase())
}

pub fn manager(id: &str, strategy: &str) -> Node {
    Node::new(id, NodeKind::TeamManager)
        .with_label(&id.to_uppercase())
        .with_strategy(strategy)
}

pub fn director(id: &str, strategy: &str) -> Node {
    Node::new(id, NodeKind::TeamDirector)
        .with_label(&id.to_uppercase())
        .with_strategy(strategy)
}

pub fn tool(id: &str, subtype: &str) -> Node {
    let mut node = Node::new(id, NodeKind::Tool).with_subtype(subtype);
    node.data.name = Some(format!("{id}_fn"));
    node
}

pub fn edge(source: &str, target: &str) -> Edge {
    Edge::new(source, target)
}

pub fn graph(nodes: Vec<Node>, edges: Vec<Edge>) -> ProjectGraph {
    ProjectGraph::new(nodes, edges, TeamSettings::default()).expect("valid test graph")
}

pub async fn collect(stream: EventStream) -> Vec<Event> {
    stream.collect().await
}

/// Messages of every notice/error, in order
pub fn messages(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| e.message().map(str::to_owned))
        .collect()
}

/// Text deltas produced by `unit_id`, in order
pub fn deltas_from(events: &[Event], unit_id: &str) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.unit_id() == Some(unit_id))
        .filter_map(|e| e.delta().map(str::to_owned))
        .collect()
}
