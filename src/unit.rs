//! Execution units - the runnable nodes of a resolved hierarchy

use std::fmt;
use std::sync::Arc;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::agent::AgentUnit;
use crate::event::Event;
use crate::manager::ManagerUnit;

/// Lazy sequence of events produced by a unit run
pub type EventStream = BoxStream<'static, Event>;

/// Kind reported in event context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnitKind {
    Agent,
    TeamManager,
    TeamDirector,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::TeamManager => "teamManager",
            Self::TeamDirector => "teamDirector",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single agent or a coordinating manager
#[derive(Clone)]
pub enum ExecutionUnit {
    Agent(Arc<AgentUnit>),
    Manager(Arc<ManagerUnit>),
}

impl ExecutionUnit {
    pub fn id(&self) -> &str {
        match self {
            Self::Agent(unit) => &unit.id,
            Self::Manager(unit) => &unit.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Agent(unit) => &unit.label,
            Self::Manager(unit) => &unit.label,
        }
    }

    pub fn kind(&self) -> UnitKind {
        match self {
            Self::Agent(_) => UnitKind::Agent,
            Self::Manager(unit) => unit.kind,
        }
    }

    /// Run the unit with `message`, producing its annotated event stream
    pub fn run_stream(&self, message: Arc<str>) -> EventStream {
        match self {
            Self::Agent(unit) => Arc::clone(unit).run_stream(message),
            Self::Manager(unit) => Arc::clone(unit).run_stream(message),
        }
    }
}

impl fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("id", &self.id())
            .field("label", &self.label())
            .field("kind", &self.kind())
            .finish()
    }
}

impl From<Arc<AgentUnit>> for ExecutionUnit {
    fn from(unit: Arc<AgentUnit>) -> Self {
        Self::Agent(unit)
    }
}

impl From<Arc<ManagerUnit>> for ExecutionUnit {
    fn from(unit: Arc<ManagerUnit>) -> Self {
        Self::Manager(unit)
    }
}
