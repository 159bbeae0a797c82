//! # Warband
//!
//! Graph-driven team orchestration for AI agents.
//!
//! A project graph of agents, tools, team managers and an optional team
//! director is resolved into a tree of runnable units. Running the tree
//! produces one ordered stream of events.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         TEAM MANAGER                                │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐               │
//! │  │ Project Graph│  │   Resolver   │  │ Event Stream │               │
//! │  └──────────────┘  └──────────────┘  └──────────────┘               │
//! └────────────────────────────┬────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                      ┌───────────────┐
//!                      │ Team Director │  (declared or synthesized)
//!                      └───────┬───────┘
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!   ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//!   │   Manager   │     │   Manager   │     │    Agent    │
//!   │ (sequential)│     │ (concurrent)│     │             │
//!   └──────┬──────┘     └──────┬──────┘     └─────────────┘
//!     ┌────┴────┐         ┌────┴────┐
//!     ▼         ▼         ▼         ▼
//!   ┌───┐     ┌───┐     ┌───┐     ┌───┐
//!   │A1 │     │A2 │     │A3 │     │A4 │ ◄── tools bound by edges
//!   └───┘     └───┘     └───┘     └───┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Agent unit**: one constructed agent and its tools
//! - **Manager unit**: coordinates members sequentially or concurrently
//! - **Director**: the top-level manager of the whole team
//! - **Event**: a notice, text delta, tool call or error, stamped with the
//!   unit that produced it and the managers that forwarded it

pub mod agent;
pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod factory;
pub mod graph;
pub mod hierarchy;
pub mod logging;
pub mod manager;
pub mod orchestrator;
pub mod resolver;
pub mod tool;
pub mod unit;

#[cfg(test)]
mod test_support;

pub use agent::AgentUnit;
pub use channel::{RunReceiver, DEFAULT_RUN_CAPACITY};
pub use config::{AgentDefaults, TeamSettings};
pub use error::WarbandError;
pub use event::{Event, EventContext, EventKind, EventPayload};
pub use factory::{AgentFactory, AgentSpec, AgentUpdate, ChatAgent, Provider, ToolCallInfo};
pub use graph::{Edge, Node, NodeData, NodeKind, Project, ProjectGraph};
pub use hierarchy::{BuildSummary, Hierarchy, UnitTree};
pub use manager::{ManagerUnit, Strategy};
pub use orchestrator::{RunTarget, RunTranscript, TeamManager};
pub use tool::{HostedTool, Tool, ToolDefinition, ToolRegistry};
pub use unit::{EventStream, ExecutionUnit, UnitKind};
