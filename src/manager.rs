//! Manager unit - coordinates a team of child units
//!
//! A manager runs its children either one after another (`sequential`) or
//! all at once (`concurrent`). Concurrent children are merged into the
//! manager's own stream and polled in place, never spawned. Dropping the
//! manager's stream drops every child stream before the drop returns.

use std::fmt;
use std::sync::Arc;

use async_stream::stream;
use futures::stream::select_all;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::event::{Event, EventContext};
use crate::graph::Node;
use crate::unit::{EventStream, ExecutionUnit, UnitKind};

/// How a manager delegates to its children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Strategy {
    #[default]
    Sequential,
    Concurrent,
    /// Unknown value; runs sequentially after a notice
    Unrecognized(String),
}

impl Strategy {
    /// Parse a strategy name, case-insensitively
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "" | "sequential" | "sequence" => Self::Sequential,
            "concurrent" => Self::Concurrent,
            _ => Self::Unrecognized(normalized),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Concurrent => f.write_str("concurrent"),
            Self::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// Internal node of the execution tree
pub struct ManagerUnit {
    /// Node id, or the synthesized director id
    pub id: String,
    /// Display label
    pub label: String,
    /// `TeamManager` or `TeamDirector`
    pub kind: UnitKind,
    /// Delegation policy
    strategy: Strategy,
    /// Members in edge order
    children: Vec<ExecutionUnit>,
}

impl ManagerUnit {
    /// Create a manager over already-built children
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        kind: UnitKind,
        strategy: Strategy,
        children: Vec<ExecutionUnit>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            strategy,
            children,
        }
    }

    /// Build a manager for a declared node, reading its strategy
    pub fn from_node(node: &Node, kind: UnitKind, children: Vec<ExecutionUnit>) -> Self {
        let strategy = node
            .data
            .strategy
            .as_deref()
            .map(Strategy::parse)
            .unwrap_or_default();
        Self::new(node.id.clone(), node.label(), kind, strategy, children)
    }

    /// Get the delegation strategy
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Get the team members
    pub fn children(&self) -> &[ExecutionUnit] {
        &self.children
    }

    fn stamp(&self, event: Event) -> Event {
        event.with_default_context(|| EventContext::new(&self.id, &self.label, self.kind))
    }

    fn forward(&self, event: Event) -> Event {
        event.forwarded_by(&self.id, &self.label, self.kind)
    }

    /// Coordinate the children, bracketing their output with notices
    pub fn run_stream(self: Arc<Self>, message: Arc<str>) -> EventStream {
        Box::pin(stream! {
            yield self.stamp(Event::notice(format!(
                "{} coordinating {} member(s) via {} strategy",
                self.label,
                self.children.len(),
                self.strategy
            )));

            if self.children.is_empty() {
                warn!(manager_id = %self.id, "Manager has no team members");
                yield self.stamp(Event::error(format!(
                    "{} has no assigned team members",
                    self.label
                )));
            } else {
                info!(
                    manager_id = %self.id,
                    members = self.children.len(),
                    strategy = %self.strategy,
                    "Coordinating team"
                );

                let mut events = match &self.strategy {
                    Strategy::Concurrent => Arc::clone(&self).run_concurrent(Arc::clone(&message)),
                    Strategy::Sequential => Arc::clone(&self).run_sequential(Arc::clone(&message)),
                    Strategy::Unrecognized(raw) => {
                        warn!(manager_id = %self.id, strategy = %raw, "Unrecognized strategy");
                        yield self.stamp(Event::notice(format!(
                            "{} does not recognize '{}' strategy; defaulting to sequential execution",
                            self.label, raw
                        )));
                        Arc::clone(&self).run_sequential(Arc::clone(&message))
                    }
                };
                while let Some(event) = events.next().await {
                    yield event;
                }
            }

            yield self.stamp(Event::notice(format!("{} finished coordination", self.label)));
        })
    }

    /// Drain each child fully before starting the next
    fn run_sequential(self: Arc<Self>, message: Arc<str>) -> EventStream {
        Box::pin(stream! {
            for child in &self.children {
                yield self.stamp(Event::notice(format!(
                    "{} delegating to {}",
                    self.label,
                    child.label()
                )));
                debug!(manager_id = %self.id, child_id = %child.id(), "Delegating");

                let mut events = child.run_stream(Arc::clone(&message));
                while let Some(event) = events.next().await {
                    yield self.forward(event);
                }
            }
        })
    }

    /// Run all children at once, forwarding events in arrival order
    fn run_concurrent(self: Arc<Self>, message: Arc<str>) -> EventStream {
        Box::pin(stream! {
            for child in &self.children {
                yield self.stamp(Event::notice(format!(
                    "{} launching {} concurrently",
                    self.label,
                    child.label()
                )));
            }

            let mut merged = select_all(
                self.children
                    .iter()
                    .map(|child| child.run_stream(Arc::clone(&message))),
            );
            while let Some(event) = merged.next().await {
                yield self.forward(event);
            }
        })
    }
}
