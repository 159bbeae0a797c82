//! Team manager - owns a project graph and runs it

use std::fmt;
use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::AgentDefaults;
use crate::error::WarbandError;
use crate::event::Event;
use crate::factory::AgentFactory;
use crate::graph::ProjectGraph;
use crate::hierarchy::{BuildSummary, Hierarchy};
use crate::resolver::Resolver;
use crate::tool::ToolRegistry;
use crate::unit::{EventStream, ExecutionUnit};

/// What a run executes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum RunTarget {
    /// The director, or the top-level units when there is none
    #[default]
    Team,
    /// A single unit by node id
    Unit(String),
}

impl From<&str> for RunTarget {
    fn from(value: &str) -> Self {
        match value {
            "" | "team" => Self::Team,
            id => Self::Unit(id.to_string()),
        }
    }
}

impl From<String> for RunTarget {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Team => f.write_str("team"),
            Self::Unit(id) => f.write_str(id),
        }
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTranscript {
    /// Concatenated text deltas
    pub text: String,
    /// Every event, in stream order
    pub events: Vec<Event>,
}

impl RunTranscript {
    /// Iterate over the `error` events
    pub fn errors(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.is_error())
    }
}

impl FromIterator<Event> for RunTranscript {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut transcript = Self::default();
        for event in iter {
            if let Some(delta) = event.delta() {
                transcript.text.push_str(delta);
            }
            transcript.events.push(event);
        }
        transcript
    }
}

/// Orchestrator for one project graph
///
/// The hierarchy is resolved on first use and cached for the lifetime of the
/// manager. Concurrent callers of [`TeamManager::build`] share one
/// resolution; a failed resolution caches nothing.
pub struct TeamManager {
    /// Read-only project graph
    graph: Arc<ProjectGraph>,
    /// Builds agent capabilities
    agent_factory: Arc<dyn AgentFactory>,
    /// Builds tools by subtype
    tool_registry: Arc<ToolRegistry>,
    /// Provider and model for agents that do not set their own
    defaults: AgentDefaults,
    /// Set once by the first successful build
    hierarchy: OnceCell<Arc<Hierarchy>>,
}

impl TeamManager {
    /// Create a manager whose agent defaults come from the graph settings
    /// and the environment
    pub fn new(
        graph: ProjectGraph,
        agent_factory: Arc<dyn AgentFactory>,
        tool_registry: Arc<ToolRegistry>,
    ) -> Self {
        let defaults = AgentDefaults::from_settings(graph.settings());
        Self::with_defaults(graph, agent_factory, tool_registry, defaults)
    }

    /// Create a manager with explicit agent defaults
    pub fn with_defaults(
        graph: ProjectGraph,
        agent_factory: Arc<dyn AgentFactory>,
        tool_registry: Arc<ToolRegistry>,
        defaults: AgentDefaults,
    ) -> Self {
        Self {
            graph: Arc::new(graph),
            agent_factory,
            tool_registry,
            defaults,
            hierarchy: OnceCell::new(),
        }
    }

    /// Get the project graph
    pub fn graph(&self) -> &ProjectGraph {
        &self.graph
    }

    /// Resolve the hierarchy if it has not been resolved yet
    #[instrument(skip(self))]
    pub async fn build(&self) -> Result<BuildSummary, WarbandError> {
        Ok(self.ensure_built().await?.summary())
    }

    /// The resolved hierarchy, if [`TeamManager::build`] has succeeded
    pub fn hierarchy(&self) -> Option<&Arc<Hierarchy>> {
        self.hierarchy.get()
    }

    async fn ensure_built(&self) -> Result<&Arc<Hierarchy>, WarbandError> {
        self.hierarchy
            .get_or_try_init(|| async move {
                info!(
                    nodes = self.graph.nodes().len(),
                    edges = self.graph.edges().len(),
                    "Building team hierarchy"
                );
                let hierarchy = Resolver::new(
                    &self.graph,
                    self.agent_factory.as_ref(),
                    &self.tool_registry,
                    self.defaults.clone(),
                )
                .resolve()
                .await?;
                Ok(Arc::new(hierarchy))
            })
            .await
    }

    /// Build if needed, then stream a run against `target`
    ///
    /// The stream always opens with `Starting team execution...` and closes
    /// with `Execution complete`. Only a structural graph error is returned
    /// as `Err`; everything that goes wrong during the run is an event.
    pub async fn run_stream(
        &self,
        message: impl Into<Arc<str>>,
        target: impl Into<RunTarget>,
    ) -> Result<EventStream, WarbandError> {
        let hierarchy = Arc::clone(self.ensure_built().await?);
        let message: Arc<str> = message.into();
        let target = target.into();
        let run_id = Uuid::new_v4();
        info!(%run_id, %target, "Starting run");

        Ok(Box::pin(stream! {
            yield Event::notice("Starting team execution...");

            let units = match &target {
                RunTarget::Team => {
                    yield Event::notice("Running team workflow");
                    team_units(&hierarchy)
                }
                RunTarget::Unit(id) => hierarchy.unit(id).cloned().into_iter().collect(),
            };

            if units.is_empty() {
                let message = match &target {
                    RunTarget::Team => "No agents or managers available".to_string(),
                    RunTarget::Unit(id) => format!("Target {id} not found"),
                };
                warn!(%run_id, %target, "{message}");
                yield Event::error(message);
            }

            for unit in units {
                debug!(%run_id, unit_id = %unit.id(), kind = %unit.kind(), "Running unit");
                let mut events = unit.run_stream(Arc::clone(&message));
                while let Some(event) = events.next().await {
                    yield event;
                }
            }

            info!(%run_id, "Run complete");
            yield Event::notice("Execution complete");
        }))
    }

    /// Run to completion, collecting every event
    pub async fn run(
        &self,
        message: impl Into<Arc<str>>,
        target: impl Into<RunTarget>,
    ) -> Result<RunTranscript, WarbandError> {
        let events = self.run_stream(message, target).await?;
        Ok(events.collect::<Vec<_>>().await.into_iter().collect())
    }
}

fn team_units(hierarchy: &Hierarchy) -> Vec<ExecutionUnit> {
    match hierarchy.director() {
        Some(director) => vec![ExecutionUnit::from(Arc::clone(director))],
        None => hierarchy.fallback_units(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::logging;
    use crate::test_support::{
        agent, counting_registry, deltas_from, director, edge, graph, manager, messages, say,
        tool, ScriptedFactory, Step,
    };
    use crate::unit::UnitKind;
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn team(graph: ProjectGraph, factory: ScriptedFactory) -> (TeamManager, Arc<ScriptedFactory>) {
        logging::try_init();
        let factory = Arc::new(factory);
        let (registry, _) = counting_registry();
        let manager = TeamManager::with_defaults(
            graph,
            Arc::clone(&factory) as Arc<dyn AgentFactory>,
            Arc::new(registry),
            AgentDefaults::default(),
        );
        (manager, factory)
    }

    #[test]
    fn test_run_target_parse() {
        assert_eq!(RunTarget::from("team"), RunTarget::Team);
        assert_eq!(RunTarget::from(""), RunTarget::Team);
        assert_eq!(RunTarget::from("writer"), RunTarget::Unit("writer".into()));
        assert_eq!(RunTarget::from("writer".to_string()).to_string(), "writer");
    }

    #[tokio::test]
    async fn test_build_is_idempotent() {
        let g = graph(
            vec![tool("t1", "function"), agent("a1"), agent("a2"), manager("m", "sequential")],
            vec![edge("t1", "a1"), edge("m", "a1"), edge("m", "a2")],
        );
        let factory = Arc::new(ScriptedFactory::new());
        let (registry, tools_built) = counting_registry();
        let team = TeamManager::with_defaults(
            g,
            Arc::clone(&factory) as Arc<dyn AgentFactory>,
            Arc::new(registry),
            AgentDefaults::default(),
        );

        let first = assert_ok!(team.build().await);
        let second = assert_ok!(team.build().await);
        assert_eq!(first, second);
        assert_eq!(
            first,
            BuildSummary {
                agents: 2,
                team_managers: 1,
                tools: 1,
                director: true
            }
        );
        assert_eq!(factory.calls(), 2);
        assert_eq!(tools_built.load(std::sync::atomic::Ordering::SeqCst), 1);

        assert_ok!(team.run("again", "team").await);
        assert_eq!(factory.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_builds_share_one_resolution() {
        let (team, factory) = team(graph(vec![agent("a1")], vec![]), ScriptedFactory::new());
        let (a, b) = tokio::join!(team.build(), team.build());
        assert_eq!(assert_ok!(a), assert_ok!(b));
        assert_eq!(factory.calls(), 1);
    }

    #[tokio::test]
    async fn test_cycle_fails_build_and_run() {
        let g = graph(
            vec![manager("a", "sequential"), manager("b", "sequential"), manager("c", "sequential")],
            vec![edge("a", "b"), edge("b", "c"), edge("c", "a")],
        );
        let (team, _) = team(g, ScriptedFactory::new());

        let err = tokio::time::timeout(Duration::from_secs(5), team.build())
            .await
            .expect("cycle detection must not hang")
            .unwrap_err();
        let text = err.to_string();
        for id in ["a", "b", "c"] {
            assert!(text.contains(id), "{text}");
        }
        assert!(team.hierarchy().is_none());
        assert!(matches!(
            team.run_stream("hi", "team").await,
            Err(WarbandError::CircularDependency { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_is_framed() {
        let (team, _) = team(graph(vec![agent("a1")], vec![]), ScriptedFactory::new());
        let transcript = team.run("hello", "team").await.unwrap();

        let first = transcript.events.first().unwrap();
        let last = transcript.events.last().unwrap();
        assert_eq!(first.message(), Some("Starting team execution..."));
        assert_eq!(transcript.events[1].message(), Some("Running team workflow"));
        assert_eq!(last.message(), Some("Execution complete"));
        assert_eq!(transcript.text, "a1 reply");
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let (team, _) = team(graph(vec![agent("a1")], vec![]), ScriptedFactory::new());
        let transcript = team.run("hello", "ghost").await.unwrap();

        assert_eq!(
            messages(&transcript.events),
            vec!["Starting team execution...", "Target ghost not found", "Execution complete"]
        );
        assert_eq!(transcript.events[1].kind(), EventKind::Error);
    }

    #[tokio::test]
    async fn test_empty_graph_reports_no_team() {
        let (team, _) = team(graph(vec![], vec![]), ScriptedFactory::new());
        let transcript = team.run("hello", RunTarget::Team).await.unwrap();

        assert_eq!(transcript.errors().count(), 1);
        assert_eq!(
            messages(&transcript.events),
            vec![
                "Starting team execution...",
                "Running team workflow",
                "No agents or managers available",
                "Execution complete"
            ]
        );
    }

    #[tokio::test]
    async fn test_single_unit_target() {
        let g = graph(
            vec![agent("a1"), agent("a2"), manager("m", "sequential")],
            vec![edge("m", "a1"), edge("m", "a2")],
        );
        let (team, _) = team(g, ScriptedFactory::new());
        let transcript = team.run("hello", "a2").await.unwrap();

        assert_eq!(transcript.text, "a2 reply");
        assert!(deltas_from(&transcript.events, "a1").is_empty());
        let agent_event = transcript.events.iter().find(|e| e.unit_id() == Some("a2")).unwrap();
        assert!(agent_event.lineage().is_empty());
    }

    #[tokio::test]
    async fn test_director_and_nested_lineage() {
        let g = graph(
            vec![agent("x"), manager("ma", "sequential"), director("boss", "sequential")],
            vec![edge("boss", "ma"), edge("ma", "x")],
        );
        let (team, _) = team(g, ScriptedFactory::new());
        let transcript = team.run("hello", "team").await.unwrap();

        let text = transcript
            .events
            .iter()
            .find(|e| e.kind() == EventKind::Text)
            .unwrap();
        let ctx = text.context.as_ref().unwrap();
        assert_eq!(ctx.unit_id, "x");
        assert_eq!(ctx.lineage, vec!["ma", "boss"]);
        assert_eq!(ctx.via.as_deref(), Some("boss"));
        assert_eq!(ctx.via_kind, Some(UnitKind::TeamDirector));
    }

    #[tokio::test]
    async fn test_failing_agent_does_not_stop_team() {
        let g = graph(
            vec![agent("bad"), agent("good"), manager("m", "concurrent")],
            vec![edge("m", "bad"), edge("m", "good")],
        );
        let factory = ScriptedFactory::new()
            .script("bad", vec![Step::Fail("model unavailable".into())])
            .script("good", vec![Step::Pause(20), say("done")]);
        let (team, _) = team(g, factory);

        let transcript = team.run("hello", "team").await.unwrap();
        assert_eq!(transcript.errors().count(), 1);
        assert_eq!(transcript.text, "done");
        assert_eq!(
            transcript.events.last().unwrap().message(),
            Some("Execution complete")
        );
    }

    #[tokio::test]
    async fn test_fallback_without_director_runs_units_in_turn() {
        let (team, _) = team(graph(vec![agent("a1"), agent("a2")], vec![]), ScriptedFactory::new());
        team.build().await.unwrap();
        let hierarchy = Arc::clone(team.hierarchy().unwrap());

        let units = team_units(&hierarchy);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind(), UnitKind::TeamDirector);

        let mut bare = Hierarchy::default();
        bare.agent_ids = hierarchy.agent_ids.clone();
        bare.units = hierarchy.units.clone();
        let ids: Vec<String> = team_units(&bare).iter().map(|u| u.id().to_string()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);

        let transcript = team.run("hello", "team").await.unwrap();
        assert_eq!(deltas_from(&transcript.events, "a1"), vec!["a1 reply"]);
        assert_eq!(deltas_from(&transcript.events, "a2"), vec!["a2 reply"]);
        assert_eq!(transcript.text, "a1 replya2 reply");
    }
}
