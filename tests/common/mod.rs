//! Common test utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use flowdeck::{
    config::{Config, HistoryConfig, ServerConfig, SimulatorConfig, StorageConfig},
    runtime::executor::{EffectError, EmailRequest, HttpRequest, SideEffects, SmsRequest},
    workflow::{DocumentSink, PersistedRecord},
    NodeKind, WorkflowDocument, WorkflowEdge, WorkflowNode,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Node with a JSON config
pub fn node(id: &str, kind: NodeKind, config: Value) -> WorkflowNode {
    WorkflowNode::new(id, kind, id).with_config(config)
}

pub fn edge(id: &str, source: &str, target: &str) -> WorkflowEdge {
    WorkflowEdge::new(id, source, target)
}

pub fn branch(id: &str, source: &str, target: &str, label: &str) -> WorkflowEdge {
    WorkflowEdge::new(id, source, target).labeled(label)
}

pub fn document(nodes: Vec<WorkflowNode>, edges: Vec<WorkflowEdge>) -> Arc<WorkflowDocument> {
    let mut doc = WorkflowDocument::empty();
    doc.name = "test".to_string();
    doc.nodes = nodes;
    doc.edges = edges;
    Arc::new(doc)
}

/// Simulator config with the production latency
pub fn simulator_config() -> SimulatorConfig {
    SimulatorConfig {
        action_latency_ms: 1000,
        max_play_steps: None,
        max_run_steps: 10_000,
    }
}

/// Full config that never touches the environment or the filesystem
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        storage: StorageConfig {
            database_path: "unused.db".to_string(),
            storage_key: "test/current".to_string(),
            sample: None,
        },
        history: HistoryConfig::default(),
        simulator: SimulatorConfig {
            action_latency_ms: 0,
            max_play_steps: None,
            max_run_steps: 500,
        },
    }
}

/// Side effects that record every call and succeed immediately
#[derive(Default)]
pub struct RecordingEffects {
    pub calls: Mutex<Vec<String>>,
    /// Reject every call with this message
    pub reject: Option<String>,
}

impl RecordingEffects {
    pub fn rejecting(message: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reject: Some(message.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, call: String) -> Result<Value, EffectError> {
        self.calls.lock().unwrap().push(call);
        match &self.reject {
            Some(message) => Err(EffectError::Rejected {
                status: 503,
                message: message.clone(),
            }),
            None => Ok(json!({ "status": 202 })),
        }
    }
}

#[async_trait]
impl SideEffects for RecordingEffects {
    async fn send_email(&self, request: &EmailRequest) -> Result<Value, EffectError> {
        self.respond(format!("email:{}", request.to))
    }

    async fn send_sms(&self, request: &SmsRequest) -> Result<Value, EffectError> {
        self.respond(format!("sms:{}:{}", request.to, request.message.clone().unwrap_or_default()))
    }

    async fn http_request(&self, request: &HttpRequest) -> Result<Value, EffectError> {
        self.respond(format!("http:{}:{}", request.method, request.url))
    }
}

/// Sink whose storage cannot be read; saves are accepted and dropped
pub struct UnreadableSink;

#[async_trait]
impl DocumentSink for UnreadableSink {
    async fn load(&self, key: &str) -> anyhow::Result<Option<PersistedRecord>> {
        Err(anyhow::anyhow!("record under '{}' is unreadable", key))
    }

    async fn save(&self, _key: &str, _record: &PersistedRecord) -> anyhow::Result<()> {
        Ok(())
    }
}
