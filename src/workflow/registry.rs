//! Node schema registry
//!
//! Static declarative table describing every node kind: its title, the config
//! fields the editor renders, default config for newly created nodes, declared
//! ports, and a validation rule. The simulator never consults this table; the
//! HTTP layer uses it to seed new nodes and to report authoring problems.

use crate::workflow::types::{NodeKind, PortDirection, PortSpec, WorkflowDocument};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static HTTP_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://").unwrap());

const HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];
const MAX_DELAY_MS: f64 = 86_400_000.0;
const MAX_SMS_CHARS: usize = 160;

/// Input widget the editor renders for a config field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Email,
    Url,
    Select,
    Json,
}

/// One editable config field of a node kind
#[derive(Debug, Clone, Serialize)]
pub struct SchemaField {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
}

impl SchemaField {
    fn new(name: &'static str, label: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            label,
            field_type,
            options: Vec::new(),
            placeholder: None,
        }
    }

    fn placeholder(mut self, placeholder: &'static str) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    fn options(mut self, options: &[&'static str]) -> Self {
        self.options = options.to_vec();
        self
    }
}

/// Declared ports of a node kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaPorts {
    #[serde(rename = "in", skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<PortSpec>,
    #[serde(rename = "out", skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<PortSpec>,
}

/// Schema entry for a single node kind
#[derive(Debug, Clone, Serialize)]
pub struct NodeSchema {
    pub kind: NodeKind,
    pub title: &'static str,
    pub description: &'static str,
    pub fields: Vec<SchemaField>,
    pub ports: SchemaPorts,
    /// Config a freshly created node starts with
    pub defaults: Value,
}

/// Look up the schema for a kind
///
/// `NodeKind::Unknown` has no schema.
pub fn schema_for(kind: NodeKind) -> Option<NodeSchema> {
    let single_out = || SchemaPorts {
        inputs: Vec::new(),
        outputs: vec![PortSpec::new("out", PortDirection::Out, true)],
    };

    let schema = match kind {
        NodeKind::ManualTrigger => NodeSchema {
            kind,
            title: "Manual Trigger",
            description: "Start the workflow by hand",
            fields: Vec::new(),
            ports: single_out(),
            defaults: json!({}),
        },
        NodeKind::WebhookTrigger => NodeSchema {
            kind,
            title: "Webhook Trigger",
            description: "Start the workflow when a request hits the path",
            fields: vec![
                SchemaField::new("path", "Path", FieldType::Text).placeholder("/webhook"),
                SchemaField::new("secret", "Secret", FieldType::Text),
            ],
            ports: single_out(),
            defaults: json!({ "path": "/webhook" }),
        },
        NodeKind::Email => NodeSchema {
            kind,
            title: "Send Email",
            description: "Send an email message",
            fields: vec![
                SchemaField::new("to", "To", FieldType::Email),
                SchemaField::new("subject", "Subject", FieldType::Text),
                SchemaField::new("body", "Body", FieldType::Textarea),
            ],
            ports: SchemaPorts::default(),
            defaults: json!({}),
        },
        NodeKind::Sms => NodeSchema {
            kind,
            title: "Send SMS",
            description: "Send a text message",
            fields: vec![
                SchemaField::new("to", "To", FieldType::Text),
                SchemaField::new("message", "Message", FieldType::Textarea),
            ],
            ports: SchemaPorts::default(),
            defaults: json!({}),
        },
        NodeKind::Http => NodeSchema {
            kind,
            title: "HTTP Request",
            description: "Call an HTTP endpoint",
            fields: vec![
                SchemaField::new("url", "URL", FieldType::Url),
                SchemaField::new("method", "Method", FieldType::Select).options(&HTTP_METHODS),
                SchemaField::new("headers", "Headers", FieldType::Json),
                SchemaField::new("body", "Body", FieldType::Json),
            ],
            ports: SchemaPorts::default(),
            defaults: json!({}),
        },
        NodeKind::Condition => NodeSchema {
            kind,
            title: "Condition",
            description: "Branch on an expression over the last response",
            fields: vec![SchemaField::new("expression", "Expression", FieldType::Text)
                .placeholder("response.status == 200")],
            ports: SchemaPorts {
                inputs: vec![PortSpec::new("in", PortDirection::In, true)],
                outputs: vec![
                    PortSpec::new("true", PortDirection::Out, true),
                    PortSpec::new("false", PortDirection::Out, true),
                ],
            },
            defaults: json!({}),
        },
        NodeKind::Transform => NodeSchema {
            kind,
            title: "Transform",
            description: "Reshape data with a script",
            fields: vec![SchemaField::new("script", "Script", FieldType::Textarea)],
            ports: SchemaPorts::default(),
            defaults: json!({}),
        },
        NodeKind::Delay => NodeSchema {
            kind,
            title: "Delay",
            description: "Wait before continuing",
            fields: vec![SchemaField::new("ms", "Milliseconds", FieldType::Number)],
            ports: SchemaPorts::default(),
            defaults: json!({ "ms": 1000 }),
        },
        NodeKind::Log => NodeSchema {
            kind,
            title: "Log",
            description: "Write a message to the run log",
            fields: vec![SchemaField::new("message", "Message", FieldType::Text)],
            ports: SchemaPorts::default(),
            defaults: json!({}),
        },
        NodeKind::Unknown => return None,
    };

    Some(schema)
}

/// All registered schemas in registry order
pub fn all_schemas() -> Vec<NodeSchema> {
    NodeKind::ALL.iter().filter_map(|kind| schema_for(*kind)).collect()
}

/// Default config for a new node of `kind`
pub fn default_config(kind: NodeKind) -> Map<String, Value> {
    match schema_for(kind).map(|s| s.defaults) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn non_empty_str<'a>(config: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    config
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Validate a node config against its kind's rules
///
/// Returns the first problem found, or `None` when the config is acceptable.
pub fn validate(kind: NodeKind, config: &Map<String, Value>) -> Option<String> {
    let problem = match kind {
        NodeKind::WebhookTrigger => {
            non_empty_str(config, "path").is_none().then_some("Path is required")
        }
        NodeKind::Email => {
            if !non_empty_str(config, "to").is_some_and(|to| EMAIL_REGEX.is_match(to)) {
                Some("Valid email is required")
            } else if non_empty_str(config, "subject").is_none() {
                Some("Subject is required")
            } else if non_empty_str(config, "body").is_none() {
                Some("Body is required")
            } else {
                None
            }
        }
        NodeKind::Sms => {
            if !non_empty_str(config, "to").is_some_and(|to| to.chars().count() >= 3) {
                Some("Phone is required")
            } else if !non_empty_str(config, "message")
                .is_some_and(|msg| msg.chars().count() <= MAX_SMS_CHARS)
            {
                Some("Message 1–160 chars")
            } else {
                None
            }
        }
        NodeKind::Http => {
            if !non_empty_str(config, "url").is_some_and(|url| HTTP_URL_REGEX.is_match(url)) {
                Some("Valid http(s) URL required")
            } else {
                match config.get("method") {
                    Some(Value::String(m)) if !m.is_empty() && !HTTP_METHODS.contains(&m.as_str()) => {
                        Some("Invalid method")
                    }
                    _ => None,
                }
            }
        }
        NodeKind::Condition => non_empty_str(config, "expression")
            .is_none()
            .then_some("Expression required"),
        NodeKind::Transform => non_empty_str(config, "script")
            .is_none()
            .then_some("Script required"),
        NodeKind::Delay => {
            let in_range = config
                .get("ms")
                .and_then(Value::as_f64)
                .is_some_and(|ms| (0.0..=MAX_DELAY_MS).contains(&ms));
            (!in_range).then_some("ms must be 0–86400000")
        }
        NodeKind::Log => non_empty_str(config, "message")
            .is_none()
            .then_some("Message required"),
        NodeKind::ManualTrigger | NodeKind::Unknown => None,
    };

    problem.map(str::to_string)
}

/// A validation problem attached to a specific node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIssue {
    pub node_id: String,
    pub kind: NodeKind,
    pub message: String,
}

/// Validate every node of a document, in node order
pub fn validate_document(document: &WorkflowDocument) -> Vec<NodeIssue> {
    document
        .nodes
        .iter()
        .filter_map(|node| {
            validate(node.data.kind, &node.data.config).map(|message| NodeIssue {
                node_id: node.id.clone(),
                kind: node.data.kind,
                message,
            })
        })
        .collect()
}
