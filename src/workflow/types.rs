//! Core workflow document types
//!
//! Plain data for the graph being edited: the document, its nodes and edges,
//! the canvas viewport and the persisted record. Field names serialize in
//! camelCase so stored records stay compatible with the editor front-end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A complete workflow document: the unit of undo/redo and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    /// Stable identifier for the document's lifetime
    pub id: String,
    /// Human-readable workflow name
    pub name: String,
    /// Nodes in authoring order (entry-point selection depends on this order)
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    /// Edges in authoring order (the first outgoing edge wins for linear kinds)
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Stamped on every committed mutation
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl WorkflowDocument {
    /// Create an empty, untitled document with a fresh id
    pub fn empty() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: "Untitled Workflow".to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            version: 1,
            updated_at: Utc::now(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut WorkflowNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&WorkflowEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut WorkflowEdge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    /// Reset every node's runtime status to idle
    ///
    /// Used when a document is loaded from storage so stale run results
    /// from a previous session are not shown as current.
    pub fn reset_statuses(&mut self) {
        for node in &mut self.nodes {
            node.data.status = NodeStatus::Idle;
        }
    }
}

/// A single task node in the workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique within the document; edges reference nodes by this id
    pub id: String,
    pub position: Position,
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<PortSpec>>,
}

impl WorkflowNode {
    /// Create a node at the origin with an empty config
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            position: Position::default(),
            data: NodeData {
                kind,
                label: label.into(),
                config: Map::new(),
                status: NodeStatus::Idle,
                logs: Vec::new(),
                width: None,
                height: None,
            },
            ports: None,
        }
    }

    /// Replace the node config with the entries of a JSON object
    ///
    /// Non-object values leave the config empty.
    pub fn with_config(mut self, config: Value) -> Self {
        self.data.config = match config {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind
    }
}

/// Canvas position of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Editable payload of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Determines which action executor runs the node
    pub kind: NodeKind,
    pub label: String,
    /// Loosely typed, kind-specific configuration; executors check the fields they read
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

/// Closed taxonomy of node kinds
///
/// Kinds the editor does not know about deserialize as `Unknown` and run as
/// no-op placeholders, so documents authored by newer front-ends still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "trigger.manual")]
    ManualTrigger,
    #[serde(rename = "trigger.webhook")]
    WebhookTrigger,
    #[serde(rename = "action.http")]
    Http,
    #[serde(rename = "action.email")]
    Email,
    #[serde(rename = "action.sms")]
    Sms,
    #[serde(rename = "logic.condition")]
    Condition,
    #[serde(rename = "logic.transform")]
    Transform,
    #[serde(rename = "util.delay")]
    Delay,
    #[serde(rename = "util.log")]
    Log,
    #[serde(rename = "unknown", other)]
    Unknown,
}

impl NodeKind {
    /// Every known kind, in registry order
    pub const ALL: [NodeKind; 9] = [
        NodeKind::ManualTrigger,
        NodeKind::WebhookTrigger,
        NodeKind::Email,
        NodeKind::Sms,
        NodeKind::Http,
        NodeKind::Condition,
        NodeKind::Transform,
        NodeKind::Delay,
        NodeKind::Log,
    ];

    /// Dotted wire name, e.g. `action.email`
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::ManualTrigger => "trigger.manual",
            NodeKind::WebhookTrigger => "trigger.webhook",
            NodeKind::Http => "action.http",
            NodeKind::Email => "action.email",
            NodeKind::Sms => "action.sms",
            NodeKind::Condition => "logic.condition",
            NodeKind::Transform => "logic.transform",
            NodeKind::Delay => "util.delay",
            NodeKind::Log => "util.log",
            NodeKind::Unknown => "unknown",
        }
    }

    pub fn is_trigger(&self) -> bool {
        matches!(self, NodeKind::ManualTrigger | NodeKind::WebhookTrigger)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime status shown on a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
    Skipped,
}

/// Connection point declared on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub direction: PortDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl PortSpec {
    pub fn new(id: &str, direction: PortDirection, required: bool) -> Self {
        Self {
            id: id.to_string(),
            label: Some(id.to_string()),
            direction,
            data_type: None,
            required: Some(required),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    In,
    Out,
}

/// Directed connection between two nodes
///
/// `source` and `target` are not checked against the node list; the runtime
/// treats a dangling target as "no next node".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Branch label; condition nodes follow the edge labelled "true"/"false"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_label: Option<bool>,
}

impl WorkflowEdge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            label: None,
            required_label: None,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Case-insensitive label match used for branch selection
    pub fn has_label(&self, wanted: &str) -> bool {
        self.label
            .as_deref()
            .is_some_and(|label| label.eq_ignore_ascii_case(wanted))
    }
}

/// Canvas pan/zoom state, persisted alongside the document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

/// The single record written to durable storage on every autosave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Older front-ends stored this under `workflow`
    #[serde(alias = "workflow")]
    pub document: WorkflowDocument,
    #[serde(default)]
    pub viewport: Viewport,
}
