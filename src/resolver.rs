//! Graph resolver - turns a project graph into a runnable hierarchy
//!
//! Edge conventions:
//!
//! - a tool and an agent joined by an edge (either direction) bind the tool
//!   to the agent
//! - an agent joined to a manager or director (either direction) reports to it
//! - `manager -> manager` reads as parent -> child; a manager with no manager
//!   pointing at it is a root manager
//!
//! Only manager cycles are fatal. Tools or agents that fail to construct are
//! logged and left out.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::agent::AgentUnit;
use crate::config::AgentDefaults;
use crate::error::WarbandError;
use crate::factory::{AgentFactory, AgentSpec};
use crate::graph::{Node, NodeKind, ProjectGraph};
use crate::hierarchy::Hierarchy;
use crate::manager::{ManagerUnit, Strategy};
use crate::tool::{Tool, ToolRegistry};
use crate::unit::{ExecutionUnit, UnitKind};

/// Id given to the director synthesized when the graph declares none
///
/// When a node already uses it, the first free `teamDirector-<n>` is taken.
pub const SYNTHESIZED_DIRECTOR_ID: &str = "teamDirector";

/// One-shot builder of a [`Hierarchy`]
pub struct Resolver<'a> {
    graph: &'a ProjectGraph,
    agent_factory: &'a dyn AgentFactory,
    tool_registry: &'a ToolRegistry,
    defaults: AgentDefaults,
    hierarchy: Hierarchy,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over `graph`, building agents with `agent_factory`
    /// and tools with `tool_registry`
    pub fn new(
        graph: &'a ProjectGraph,
        agent_factory: &'a dyn AgentFactory,
        tool_registry: &'a ToolRegistry,
        defaults: AgentDefaults,
    ) -> Self {
        Self {
            graph,
            agent_factory,
            tool_registry,
            defaults,
            hierarchy: Hierarchy::default(),
        }
    }

    /// Build tools, agents, managers and the director
    pub async fn resolve(mut self) -> Result<Hierarchy, WarbandError> {
        let graph = self.graph;
        let agent_ids = graph.ids_of_kind(NodeKind::Agent);
        let manager_ids = graph.ids_of_kind(NodeKind::TeamManager);
        let director_ids = graph.ids_of_kind(NodeKind::TeamDirector);

        if director_ids.len() > 1 {
            warn!(
                using = director_ids[0],
                ignored = ?&director_ids[1..],
                "Multiple team directors declared"
            );
        }

        self.build_tools();

        for agent_id in &agent_ids {
            self.build_agent_unit(agent_id).await;
        }

        for manager_id in &manager_ids {
            self.ensure_manager_unit(manager_id, &mut Vec::new()).await?;
        }
        self.hierarchy.manager_ids = manager_ids
            .iter()
            .filter(|id| self.hierarchy.managers.contains_key(**id))
            .map(|id| id.to_string())
            .collect();

        self.hierarchy.root_manager_ids = manager_ids
            .iter()
            .filter(|id| graph.sources_of(id, &[NodeKind::TeamManager]).is_empty())
            .map(|id| id.to_string())
            .collect();

        let declared = director_ids.first().and_then(|id| graph.node(id));
        self.hierarchy.director = self.build_director(declared).await?;

        info!(
            agents = self.hierarchy.agents.len(),
            managers = self.hierarchy.managers.len(),
            tools = self.hierarchy.tools.len(),
            roots = ?self.hierarchy.root_manager_ids,
            director = self.hierarchy.director.is_some(),
            "Resolved team hierarchy"
        );

        Ok(self.hierarchy)
    }

    fn build_tools(&mut self) {
        for node in self.graph.nodes().iter().filter(|n| n.kind == NodeKind::Tool) {
            match self.tool_registry.build_tool(node) {
                Ok(Some(tool)) => {
                    debug!(tool_id = %node.id, name = tool.name(), "Built tool");
                    self.hierarchy.tools.insert(node.id.clone(), tool);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(tool_id = %node.id, error = %e, "Failed to build tool");
                }
            }
        }
    }

    async fn build_agent_unit(&mut self, agent_id: &str) {
        if self.hierarchy.agents.contains_key(agent_id) {
            return;
        }
        let Some(node) = self.graph.node(agent_id) else {
            return;
        };

        let tools: Vec<Arc<dyn Tool>> = self
            .graph
            .neighbours_of(agent_id, &[NodeKind::Tool])
            .into_iter()
            .filter_map(|id| self.hierarchy.tools.get(id).cloned())
            .collect();

        let spec = AgentSpec::resolve(node, tools.clone(), &self.defaults);
        match self.agent_factory.create_agent(spec).await {
            Ok(agent) => {
                debug!(agent_id, tools = tools.len(), "Built agent");
                let unit = Arc::new(AgentUnit::new(node, agent, tools));
                self.hierarchy.agent_ids.push(node.id.clone());
                self.hierarchy
                    .units
                    .insert(node.id.clone(), ExecutionUnit::from(Arc::clone(&unit)));
                self.hierarchy.agents.insert(node.id.clone(), unit);
            }
            Err(e) => {
                warn!(agent_id, error = %e, "Failed to build agent");
            }
        }
    }

    /// Child ids of a manager or director, in edge order
    fn child_ids(&self, coordinator_id: &str, is_director: bool) -> Vec<&'a str> {
        let graph = self.graph;
        let mut seen = HashSet::new();
        graph
            .edges()
            .iter()
            .filter_map(|edge| {
                if edge.source == coordinator_id {
                    match graph.kind_of(&edge.target)? {
                        NodeKind::Agent | NodeKind::TeamManager => Some(edge.target.as_str()),
                        _ => None,
                    }
                } else if edge.target == coordinator_id {
                    match graph.kind_of(&edge.source)? {
                        NodeKind::Agent => Some(edge.source.as_str()),
                        NodeKind::TeamManager if is_director => Some(edge.source.as_str()),
                        _ => None,
                    }
                } else {
                    None
                }
            })
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Build a manager after its child managers, failing on cycles
    fn ensure_manager_unit<'s>(
        &'s mut self,
        manager_id: &'s str,
        stack: &'s mut Vec<String>,
    ) -> BoxFuture<'s, Result<Option<Arc<ManagerUnit>>, WarbandError>> {
        Box::pin(async move {
            if let Some(unit) = self.hierarchy.managers.get(manager_id) {
                return Ok(Some(Arc::clone(unit)));
            }
            let Some(node) = self.graph.node(manager_id) else {
                return Ok(None);
            };

            if let Some(pos) = stack.iter().position(|id| id == manager_id) {
                let mut path = stack[pos..].to_vec();
                path.push(manager_id.to_string());
                return Err(WarbandError::CircularDependency { path });
            }

            stack.push(manager_id.to_string());
            let mut children = Vec::new();
            for child_id in self.child_ids(manager_id, false) {
                if let Some(child) = self.resolve_child(child_id, stack).await? {
                    children.push(child);
                }
            }
            stack.pop();

            let unit = Arc::new(ManagerUnit::from_node(node, UnitKind::TeamManager, children));
            debug!(
                manager_id,
                members = unit.children().len(),
                strategy = %unit.strategy(),
                "Built manager"
            );
            self.hierarchy
                .units
                .insert(node.id.clone(), ExecutionUnit::from(Arc::clone(&unit)));
            self.hierarchy.managers.insert(node.id.clone(), Arc::clone(&unit));
            Ok(Some(unit))
        })
    }

    async fn resolve_child(
        &mut self,
        child_id: &str,
        stack: &mut Vec<String>,
    ) -> Result<Option<ExecutionUnit>, WarbandError> {
        match self.graph.kind_of(child_id) {
            Some(NodeKind::Agent) => Ok(self
                .hierarchy
                .agents
                .get(child_id)
                .map(|unit| ExecutionUnit::from(Arc::clone(unit)))),
            Some(NodeKind::TeamManager) => Ok(self
                .ensure_manager_unit(child_id, stack)
                .await?
                .map(ExecutionUnit::from)),
            _ => Ok(None),
        }
    }

    fn synthesized_director_id(&self) -> String {
        if self.graph.node(SYNTHESIZED_DIRECTOR_ID).is_none() {
            return SYNTHESIZED_DIRECTOR_ID.to_string();
        }
        let id = (1..)
            .map(|n| format!("{SYNTHESIZED_DIRECTOR_ID}-{n}"))
            .find(|id| self.graph.node(id).is_none())
            .unwrap_or_default();
        warn!(
            taken = SYNTHESIZED_DIRECTOR_ID,
            director_id = %id,
            "Director id already used by a node; renaming synthesized director"
        );
        id
    }

    async fn build_director(
        &mut self,
        declared: Option<&'a Node>,
    ) -> Result<Option<Arc<ManagerUnit>>, WarbandError> {
        let mut child_ids: Vec<String> = declared
            .map(|node| self.child_ids(&node.id, true))
            .unwrap_or_default()
            .into_iter()
            .map(str::to_owned)
            .collect();
        if child_ids.is_empty() {
            child_ids = self
                .hierarchy
                .fallback_units()
                .iter()
                .map(|unit| unit.id().to_string())
                .collect();
        }

        let mut children = Vec::new();
        for child_id in &child_ids {
            if let Some(child) = self.resolve_child(child_id, &mut Vec::new()).await? {
                children.push(child);
            }
        }
        if children.is_empty() {
            debug!("No director: nothing to coordinate");
            return Ok(None);
        }

        let unit = Arc::new(match declared {
            Some(node) => ManagerUnit::from_node(node, UnitKind::TeamDirector, children),
            None => {
                let settings = self.graph.settings();
                ManagerUnit::new(
                    self.synthesized_director_id(),
                    settings.director_label(),
                    UnitKind::TeamDirector,
                    Strategy::parse(settings.director_strategy()),
                    children,
                )
            }
        });
        info!(
            director_id = %unit.id,
            synthesized = declared.is_none(),
            members = unit.children().len(),
            strategy = %unit.strategy(),
            "Built team director"
        );
        self.hierarchy
            .units
            .insert(unit.id.clone(), ExecutionUnit::from(Arc::clone(&unit)));
        Ok(Some(unit))
    }
}
