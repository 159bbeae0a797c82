//! Project graph - the declarative node/edge description of a team
//!
//! The graph is immutable once ingested. Lookups never mutate it; the
//! resolver reads it to build the runtime hierarchy.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::TeamSettings;
use crate::error::WarbandError;

/// What a node represents on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Agent,
    TeamManager,
    TeamDirector,
    Tool,
    /// Anything the orchestrator does not execute (notes, groups, ...)
    #[default]
    #[serde(other)]
    Other,
}

/// Execution parameters carried by a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// System prompt for agents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Delegation strategy for managers and directors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Tool subtype, e.g. `mcp-tool` or `code-interpreter`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, rename = "top_p", skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(
        default,
        rename = "max_completion_tokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_completion_tokens: Option<u64>,
    #[serde(
        default,
        rename = "response_format",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_format: Option<Value>,
    /// Presentation fields and anything else the editor stores
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single node of the project graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data: NodeData::default(),
        }
    }

    /// Set the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = Some(label.into());
        self
    }

    /// Set the delegation strategy
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.data.strategy = Some(strategy.into());
        self
    }

    /// Set the tool subtype
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.data.subtype = Some(subtype.into());
        self
    }

    /// Human-readable name: label, then name, then id
    pub fn label(&self) -> &str {
        self.data
            .label
            .as_deref()
            .filter(|l| !l.is_empty())
            .or_else(|| self.data.name.as_deref().filter(|n| !n.is_empty()))
            .unwrap_or(&self.id)
    }
}

/// Directed edge between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Serialized form of a graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GraphDocument {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(default)]
    settings: TeamSettings,
}

/// Immutable team graph: nodes in declaration order, edges, settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct ProjectGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    settings: TeamSettings,
    index: HashMap<String, usize>,
}

impl TryFrom<GraphDocument> for ProjectGraph {
    type Error = WarbandError;

    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        ProjectGraph::new(doc.nodes, doc.edges, doc.settings)
    }
}

impl From<ProjectGraph> for GraphDocument {
    fn from(graph: ProjectGraph) -> Self {
        Self {
            nodes: graph.nodes,
            edges: graph.edges,
            settings: graph.settings,
        }
    }
}

impl ProjectGraph {
    /// Create a graph, rejecting duplicate node ids
    pub fn new(
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        settings: TeamSettings,
    ) -> Result<Self, WarbandError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (pos, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), pos).is_some() {
                return Err(WarbandError::DuplicateNode(node.id.clone()));
            }
        }

        debug!(nodes = nodes.len(), edges = edges.len(), "Ingested project graph");

        Ok(Self {
            nodes,
            edges,
            settings,
            index,
        })
    }

    /// Parse the `{nodes, edges, settings}` shape
    pub fn from_json(json: &str) -> Result<Self, WarbandError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse either a bare graph or a project envelope from a value
    pub fn from_value(value: Value) -> Result<Self, WarbandError> {
        if value.get("graph").is_some() {
            let project: Project = serde_json::from_value(value)?;
            project.into_graph()
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }

    /// Load a graph or project file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WarbandError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let value: Value = serde_json::from_str(&raw)?;
        Self::from_value(value)
    }

    pub fn settings(&self) -> &TeamSettings {
        &self.settings
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&pos| &self.nodes[pos])
    }

    pub fn kind_of(&self, id: &str) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    /// Ids of every node of `kind`, in declaration order
    pub fn ids_of_kind(&self, kind: NodeKind) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.kind == kind)
            .map(|n| n.id.as_str())
            .collect()
    }

    /// Targets of edges leaving `source` whose node kind is in `kinds`
    pub fn targets_of(&self, source: &str, kinds: &[NodeKind]) -> Vec<&str> {
        self.collect_unique(self.edges.iter().filter_map(|e| {
            (e.source == source).then_some(e.target.as_str())
        }), kinds)
    }

    /// Sources of edges entering `target` whose node kind is in `kinds`
    pub fn sources_of(&self, target: &str, kinds: &[NodeKind]) -> Vec<&str> {
        self.collect_unique(self.edges.iter().filter_map(|e| {
            (e.target == target).then_some(e.source.as_str())
        }), kinds)
    }

    /// Nodes joined to `id` by an edge in either direction, in edge order
    pub fn neighbours_of(&self, id: &str, kinds: &[NodeKind]) -> Vec<&str> {
        self.collect_unique(self.edges.iter().filter_map(|e| {
            if e.source == id {
                Some(e.target.as_str())
            } else if e.target == id {
                Some(e.source.as_str())
            } else {
                None
            }
        }), kinds)
    }

    fn collect_unique<'a>(
        &'a self,
        ids: impl Iterator<Item = &'a str>,
        kinds: &[NodeKind],
    ) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        ids.filter(|id| {
            self.kind_of(id)
                .map(|kind| kinds.contains(&kind))
                .unwrap_or(false)
        })
        .filter(|id| seen.insert(*id))
        .collect()
    }
}

/// Project envelope as stored by the editor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<TeamSettings>,
    #[serde(default)]
    pub graph: ProjectBody,
}

/// Nodes and edges of a project envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectBody {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Project {
    pub fn from_json(json: &str) -> Result<Self, WarbandError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate ids and produce the immutable graph
    pub fn into_graph(self) -> Result<ProjectGraph, WarbandError> {
        ProjectGraph::new(
            self.graph.nodes,
            self.graph.edges,
            self.settings.unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> ProjectGraph {
        ProjectGraph::new(
            vec![
                Node::new("search", NodeKind::Tool).with_subtype("google-search"),
                Node::new("writer", NodeKind::Agent).with_label("Writer"),
                Node::new("lead", NodeKind::TeamManager),
                Node::new("note", NodeKind::Other),
            ],
            vec![
                Edge::new("search", "writer"),
                Edge::new("lead", "writer"),
                Edge::new("lead", "writer"),
                Edge::new("lead", "ghost"),
            ],
            TeamSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = ProjectGraph::new(
            vec![
                Node::new("a", NodeKind::Agent),
                Node::new("a", NodeKind::TeamManager),
            ],
            vec![],
            TeamSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, WarbandError::DuplicateNode(id) if id == "a"));
    }

    #[test]
    fn test_label_fallbacks() {
        let mut node = Node::new("n1", NodeKind::Agent);
        assert_eq!(node.label(), "n1");
        node.data.name = Some("Named".into());
        assert_eq!(node.label(), "Named");
        node.data.label = Some("Labelled".into());
        assert_eq!(node.label(), "Labelled");
    }

    #[test]
    fn test_lookups_dedupe_and_skip_unknown_endpoints() {
        let graph = sample();
        assert_eq!(graph.targets_of("lead", &[NodeKind::Agent]), vec!["writer"]);
        assert_eq!(graph.sources_of("writer", &[NodeKind::Tool]), vec!["search"]);
        assert_eq!(
            graph.neighbours_of("writer", &[NodeKind::Tool, NodeKind::TeamManager]),
            vec!["search", "lead"]
        );
        assert!(graph.targets_of("lead", &[NodeKind::Tool]).is_empty());
    }

    #[test]
    fn test_ids_of_kind_keeps_declaration_order() {
        let graph = sample();
        assert_eq!(graph.ids_of_kind(NodeKind::Agent), vec!["writer"]);
        assert_eq!(graph.ids_of_kind(NodeKind::Other), vec!["note"]);
    }

    #[test]
    fn test_parse_graph_shape() {
        let graph = ProjectGraph::from_json(
            r#"{
                "nodes": [
                    {"id": "a1", "kind": "agent", "data": {"label": "Researcher", "model": "gpt-4o", "x": 3}},
                    {"id": "m1", "kind": "teamManager", "data": {"strategy": "concurrent"}},
                    {"id": "s1", "kind": "sticky"}
                ],
                "edges": [{"source": "m1", "target": "a1"}],
                "settings": {"defaultModel": "gpt-4o-mini"}
            }"#,
        )
        .unwrap();

        assert_eq!(graph.nodes().len(), 3);
        assert_eq!(graph.kind_of("s1"), Some(NodeKind::Other));
        let agent = graph.node("a1").unwrap();
        assert_eq!(agent.data.model.as_deref(), Some("gpt-4o"));
        assert_eq!(agent.data.extra.get("x"), Some(&Value::from(3)));
        assert_eq!(graph.settings().default_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_parse_rejects_duplicates() {
        let err = ProjectGraph::from_json(
            r#"{"nodes": [{"id": "x", "kind": "agent"}, {"id": "x", "kind": "tool"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, WarbandError::Json(_)));
        assert!(err.to_string().contains("Duplicate node id: x"));
    }

    #[test]
    fn test_load_project_envelope_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "id": "p1",
                "name": "Demo",
                "settings": {{"teamStrategy": "concurrent"}},
                "graph": {{
                    "nodes": [{{"id": "a", "kind": "agent"}}],
                    "edges": []
                }}
            }}"#
        )
        .unwrap();

        let graph = ProjectGraph::load(file.path()).unwrap();
        assert_eq!(graph.ids_of_kind(NodeKind::Agent), vec!["a"]);
        assert_eq!(graph.settings().team_strategy.as_deref(), Some("concurrent"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectGraph::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, WarbandError::Io(_)));
    }
}
