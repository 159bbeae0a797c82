//! Resolved team hierarchy

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::AgentUnit;
use crate::manager::ManagerUnit;
use crate::tool::Tool;
use crate::unit::{ExecutionUnit, UnitKind};

/// Counts reported by a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub agents: usize,
    pub team_managers: usize,
    pub tools: usize,
    pub director: bool,
}

/// Serializable snapshot of a unit and its members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTree {
    pub id: String,
    pub label: String,
    pub kind: UnitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UnitTree>,
}

impl UnitTree {
    fn of(unit: &ExecutionUnit) -> Self {
        match unit {
            ExecutionUnit::Agent(agent) => Self {
                id: agent.id.clone(),
                label: agent.label.clone(),
                kind: UnitKind::Agent,
                strategy: None,
                tools: agent.tools().iter().map(|t| t.name().to_string()).collect(),
                children: Vec::new(),
            },
            ExecutionUnit::Manager(manager) => Self {
                id: manager.id.clone(),
                label: manager.label.clone(),
                kind: manager.kind,
                strategy: Some(manager.strategy().to_string()),
                tools: Vec::new(),
                children: manager.children().iter().map(Self::of).collect(),
            },
        }
    }

    /// Number of units in this subtree, including itself
    pub fn unit_count(&self) -> usize {
        1 + self.children.iter().map(UnitTree::unit_count).sum::<usize>()
    }

    /// Depth of the deepest leaf below this unit (a leaf has depth 0)
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Every unit built for one graph, memoized by node id
#[derive(Default)]
pub struct Hierarchy {
    /// Built agents, in declaration order
    pub(crate) agent_ids: Vec<String>,
    /// Built managers, in declaration order
    pub(crate) manager_ids: Vec<String>,
    /// Agent units by node id
    pub(crate) agents: HashMap<String, Arc<AgentUnit>>,
    /// Manager units by node id
    pub(crate) managers: HashMap<String, Arc<ManagerUnit>>,
    /// Tools by node id, shared between agents
    pub(crate) tools: HashMap<String, Arc<dyn Tool>>,
    /// Every runnable unit by id, director included
    pub(crate) units: HashMap<String, ExecutionUnit>,
    /// Managers with no manager parent, in declaration order
    pub(crate) root_manager_ids: Vec<String>,
    /// Declared or synthesized director
    pub(crate) director: Option<Arc<ManagerUnit>>,
}

impl Hierarchy {
    /// Counts of what was built
    pub fn summary(&self) -> BuildSummary {
        BuildSummary {
            agents: self.agents.len(),
            team_managers: self.managers.len(),
            tools: self.tools.len(),
            director: self.director.is_some(),
        }
    }

    /// Look up any runnable unit, director included
    pub fn unit(&self, id: &str) -> Option<&ExecutionUnit> {
        self.units.get(id)
    }

    /// Get an agent unit by node id
    pub fn agent(&self, id: &str) -> Option<&Arc<AgentUnit>> {
        self.agents.get(id)
    }

    /// Get a manager unit by node id
    pub fn manager(&self, id: &str) -> Option<&Arc<ManagerUnit>> {
        self.managers.get(id)
    }

    /// Get a built tool by node id
    pub fn tool(&self, id: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(id)
    }

    /// Get the director, if the team has one
    pub fn director(&self) -> Option<&Arc<ManagerUnit>> {
        self.director.as_ref()
    }

    /// Managers that no other manager coordinates
    pub fn root_manager_ids(&self) -> &[String] {
        &self.root_manager_ids
    }

    /// Top-level units when there is no director: root managers, else all
    /// managers, else all agents
    pub fn fallback_units(&self) -> Vec<ExecutionUnit> {
        let ids = if !self.root_manager_ids.is_empty() {
            &self.root_manager_ids
        } else if !self.manager_ids.is_empty() {
            &self.manager_ids
        } else {
            &self.agent_ids
        };
        ids.iter().filter_map(|id| self.units.get(id).cloned()).collect()
    }

    /// Snapshot of what a `team` run executes
    pub fn tree(&self) -> Vec<UnitTree> {
        match &self.director {
            Some(director) => vec![UnitTree::of(&ExecutionUnit::Manager(Arc::clone(director)))],
            None => self.fallback_units().iter().map(UnitTree::of).collect(),
        }
    }
}
