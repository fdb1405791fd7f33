//! Per-kind action executors
//!
//! Each node kind performs one simulated effect through the `SideEffects`
//! seam and reports an `ActionOutcome`. Executors read only the config
//! fields they declare; a missing or mistyped required field fails the
//! action instead of being assumed.

use crate::runtime::expression::evaluate_condition;
use crate::workflow::types::{NodeKind, WorkflowNode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

/// Recipient address that makes simulated email and SMS sends fail
pub const FAILURE_ADDRESS: &str = "failure@gmail.com";

/// URL that makes simulated HTTP calls fail
pub const FAILURE_URL: &str = "http://failure.com";

/// Stands in for a required config value that is absent or mistyped
pub const MISSING_VALUE: &str = "<missing>";

/// Outcome of a single simulation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
    Skipped,
}

/// Rejection from a side-effect provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectError {
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },
}

/// Problem reading a node's config
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigFieldError {
    #[error("missing required field '{0}'")]
    Missing(&'static str),

    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailRequest {
    pub to: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmsRequest {
    pub to: String,
    pub message: Option<String>,
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: Map<String, Value>,
    pub body: Option<Value>,
    pub failed: bool,
}

/// Side effects performed by action nodes
///
/// The simulator only ever talks to this trait, so a run can be backed by
/// the built-in simulation or by a test double that counts or scripts calls.
#[async_trait]
pub trait SideEffects: Send + Sync {
    async fn send_email(&self, request: &EmailRequest) -> Result<Value, EffectError>;

    async fn send_sms(&self, request: &SmsRequest) -> Result<Value, EffectError>;

    async fn http_request(&self, request: &HttpRequest) -> Result<Value, EffectError>;

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Built-in simulation: fixed latency, then success unless a failure is injected
#[derive(Debug, Clone)]
pub struct SimulatedEffects {
    latency: Duration,
}

impl SimulatedEffects {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    async fn settle(&self, fail: bool, message: &str) -> Result<Value, EffectError> {
        tokio::time::sleep(self.latency).await;
        if fail {
            Err(EffectError::Rejected {
                status: 500,
                message: message.to_string(),
            })
        } else {
            Ok(json!({ "status": 200 }))
        }
    }
}

impl Default for SimulatedEffects {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

#[async_trait]
impl SideEffects for SimulatedEffects {
    async fn send_email(&self, request: &EmailRequest) -> Result<Value, EffectError> {
        tracing::debug!("📧 Simulating email to {}", request.to);
        self.settle(request.failed || request.to == FAILURE_ADDRESS, "Failed to send email")
            .await
    }

    async fn send_sms(&self, request: &SmsRequest) -> Result<Value, EffectError> {
        tracing::debug!("📱 Simulating SMS to {}", request.to);
        self.settle(request.failed || request.to == FAILURE_ADDRESS, "Failed to send SMS")
            .await
    }

    async fn http_request(&self, request: &HttpRequest) -> Result<Value, EffectError> {
        tracing::debug!("🌍 Simulating HTTP {} {}", request.method, request.url);
        self.settle(request.failed || request.url == FAILURE_URL, "Failed to make HTTP call")
            .await
    }
}

/// Result of executing one node
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub status: StepStatus,
    pub message: String,
    /// New value for the simulator's last response, when the action produced one
    pub response: Option<Value>,
    /// Branch decision, only for condition nodes
    pub decision: Option<bool>,
}

impl ActionOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Success,
            message: message.into(),
            response: None,
            decision: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Error,
            message: message.into(),
            response: None,
            decision: None,
        }
    }

    fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }
}

fn required_str(config: &Map<String, Value>, field: &'static str) -> Result<String, ConfigFieldError> {
    match config.get(field) {
        None | Some(Value::Null) => Err(ConfigFieldError::Missing(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ConfigFieldError::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn optional_str(config: &Map<String, Value>, field: &str) -> Option<String> {
    config.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Render a config or response value for a log line: integral numbers
/// without a fraction, strings without quotes
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn failed_flag(config: &Map<String, Value>) -> bool {
    config.get("failed").and_then(Value::as_bool).unwrap_or(false)
}

/// Dispatches nodes to their kind's executor
#[derive(Clone)]
pub struct NodeExecutor {
    effects: Arc<dyn SideEffects>,
}

impl NodeExecutor {
    pub fn new(effects: Arc<dyn SideEffects>) -> Self {
        Self { effects }
    }

    /// Execute `node` against the last action response
    ///
    /// Never fails: every problem is reported as an error outcome.
    pub async fn execute_node(&self, node: &WorkflowNode, last_response: Option<&Value>) -> ActionOutcome {
        tracing::info!("🚀 Executing node: {} (kind: {})", node.id, node.kind());
        let start_time = tokio::time::Instant::now();
        let config = &node.data.config;

        let outcome = match node.kind() {
            NodeKind::Condition => self.execute_condition_node(config, last_response),
            NodeKind::Http => self.execute_http_node(config).await,
            NodeKind::Email => self.execute_email_node(config).await,
            NodeKind::Sms => self.execute_sms_node(config).await,
            NodeKind::Delay => self.execute_delay_node(config).await,
            NodeKind::Log => ActionOutcome::success(
                config
                    .get("message")
                    .filter(|m| !m.is_null())
                    .map(|m| match m {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| "Log".to_string()),
            ),
            NodeKind::ManualTrigger | NodeKind::WebhookTrigger | NodeKind::Transform | NodeKind::Unknown => {
                ActionOutcome::success("OK")
            }
        };

        let duration = start_time.elapsed();
        match outcome.status {
            StepStatus::Error => {
                tracing::warn!("❌ Node '{}' failed in {:?}: {}", node.id, duration, outcome.message)
            }
            _ => tracing::info!("✅ Node '{}' completed in {:?}: {}", node.id, duration, outcome.message),
        }
        outcome
    }

    fn execute_condition_node(&self, config: &Map<String, Value>, last_response: Option<&Value>) -> ActionOutcome {
        let expression = config
            .get("expression")
            .map(|e| match e {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        let decision = evaluate_condition(&expression, last_response);
        tracing::debug!("🔀 Condition '{}' decided {}", expression, decision);

        ActionOutcome {
            decision: Some(decision),
            ..ActionOutcome::success(format!("Condition: {}", decision))
        }
    }

    async fn execute_email_node(&self, config: &Map<String, Value>) -> ActionOutcome {
        let address = match required_str(config, "to") {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("🚨 Email node config invalid: {}", e);
                return ActionOutcome::failure(format!("Failed to send to {}", MISSING_VALUE));
            }
        };

        let request = EmailRequest {
            to: address.clone(),
            subject: optional_str(config, "subject"),
            body: optional_str(config, "body"),
            failed: failed_flag(config),
        };
        match self.effects.send_email(&request).await {
            Ok(response) => ActionOutcome::success(format!("Email sent to {}", address)).with_response(response),
            Err(e) => {
                tracing::debug!("📧 Email to {} rejected: {}", address, e);
                ActionOutcome::failure(format!("Failed to send to {}", address))
            }
        }
    }

    async fn execute_sms_node(&self, config: &Map<String, Value>) -> ActionOutcome {
        let number = match required_str(config, "to") {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("🚨 SMS node config invalid: {}", e);
                return ActionOutcome::failure(format!("Failed to send SMS to {}", MISSING_VALUE));
            }
        };

        let request = SmsRequest {
            to: number.clone(),
            message: optional_str(config, "message"),
            failed: failed_flag(config),
        };
        match self.effects.send_sms(&request).await {
            Ok(response) => ActionOutcome::success(format!("SMS sent to {}", number)).with_response(response),
            Err(e) => {
                tracing::debug!("📱 SMS to {} rejected: {}", number, e);
                ActionOutcome::failure(format!("Failed to send SMS to {}", number))
            }
        }
    }

    async fn execute_http_node(&self, config: &Map<String, Value>) -> ActionOutcome {
        let target = match required_str(config, "url") {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("🚨 HTTP node config invalid: {}", e);
                return ActionOutcome::failure(format!("Failed to make HTTP call to {}", MISSING_VALUE));
            }
        };

        let request = HttpRequest {
            url: target.clone(),
            method: optional_str(config, "method").unwrap_or_else(|| "GET".to_string()),
            headers: config
                .get("headers")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            body: config.get("body").filter(|b| !b.is_null()).cloned(),
            failed: failed_flag(config),
        };
        match self.effects.http_request(&request).await {
            Ok(response) => {
                let status = response
                    .get("status")
                    .map(display_value)
                    .unwrap_or_else(|| "200".to_string());
                ActionOutcome::success(format!("HTTP call to {} returned {}", target, status))
                    .with_response(response)
            }
            Err(e) => {
                tracing::debug!("🌍 HTTP call to {} rejected: {}", target, e);
                ActionOutcome::failure(format!("Failed to make HTTP call to {}", target))
            }
        }
    }

    async fn execute_delay_node(&self, config: &Map<String, Value>) -> ActionOutcome {
        let millis = match config.get("ms") {
            Some(Value::Number(n)) => n.as_f64().filter(|ms| *ms >= 0.0 && ms.is_finite()).ok_or(
                ConfigFieldError::WrongType {
                    field: "ms",
                    expected: "a non-negative number",
                },
            ),
            None | Some(Value::Null) => Err(ConfigFieldError::Missing("ms")),
            Some(_) => Err(ConfigFieldError::WrongType {
                field: "ms",
                expected: "a non-negative number",
            }),
        };

        let duration = millis.and_then(|ms| {
            Duration::try_from_secs_f64(ms / 1000.0).map_err(|_| ConfigFieldError::WrongType {
                field: "ms",
                expected: "a representable duration",
            })
        });
        let duration = match duration {
            Ok(duration) => duration,
            Err(e) => {
                tracing::warn!("🚨 Delay node config invalid: {}", e);
                return ActionOutcome::failure(format!("Failed to delay for {}ms", MISSING_VALUE));
            }
        };

        self.effects.sleep(duration).await;

        let shown = config.get("ms").map(display_value).unwrap_or_default();
        ActionOutcome::success(format!("Delayed for {}ms", shown)).with_response(json!({ "status": 200 }))
    }
}

impl std::fmt::Debug for NodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> NodeExecutor {
        NodeExecutor::new(Arc::new(SimulatedEffects::default()))
    }

    fn node(kind: NodeKind, config: Value) -> WorkflowNode {
        WorkflowNode::new("n1", kind, "node").with_config(config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_email_success_sets_response() {
        let outcome = executor()
            .execute_node(&node(NodeKind::Email, json!({ "to": "ana@example.com" })), None)
            .await;
        assert_eq!(outcome.status, StepStatus::Success);
        assert_eq!(outcome.message, "Email sent to ana@example.com");
        assert_eq!(outcome.response, Some(json!({ "status": 200 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sentinels_and_failed_flag_force_failure() {
        let exec = executor();

        let email = exec
            .execute_node(&node(NodeKind::Email, json!({ "to": FAILURE_ADDRESS })), None)
            .await;
        assert_eq!(email.status, StepStatus::Error);
        assert_eq!(email.message, "Failed to send to failure@gmail.com");
        assert_eq!(email.response, None);

        let sms = exec
            .execute_node(&node(NodeKind::Sms, json!({ "to": "+100", "failed": true })), None)
            .await;
        assert_eq!(sms.message, "Failed to send SMS to +100");

        let http = exec
            .execute_node(&node(NodeKind::Http, json!({ "url": FAILURE_URL })), None)
            .await;
        assert_eq!(http.message, "Failed to make HTTP call to http://failure.com");
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_latency_elapses() {
        let start = tokio::time::Instant::now();
        executor()
            .execute_node(&node(NodeKind::Http, json!({ "url": "https://api.example.com" })), None)
            .await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_missing_required_field_fails_closed() {
        let exec = executor();
        let email = exec.execute_node(&node(NodeKind::Email, json!({})), None).await;
        assert_eq!(email.status, StepStatus::Error);
        assert_eq!(email.message, "Failed to send to <missing>");

        let http = exec.execute_node(&node(NodeKind::Http, json!({ "url": 42 })), None).await;
        assert_eq!(http.message, "Failed to make HTTP call to <missing>");

        let delay = exec.execute_node(&node(NodeKind::Delay, json!({ "ms": -5 })), None).await;
        assert_eq!(delay.status, StepStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_and_passive_kinds() {
        let exec = executor();
        let delay = exec.execute_node(&node(NodeKind::Delay, json!({ "ms": 250 })), None).await;
        assert_eq!(delay.message, "Delayed for 250ms");
        assert_eq!(delay.response, Some(json!({ "status": 200 })));

        let log = exec.execute_node(&node(NodeKind::Log, json!({})), None).await;
        assert_eq!(log.message, "Log");
        let log = exec.execute_node(&node(NodeKind::Log, json!({ "message": "hi" })), None).await;
        assert_eq!(log.message, "hi");

        for kind in [NodeKind::ManualTrigger, NodeKind::Transform, NodeKind::Unknown] {
            let outcome = exec.execute_node(&node(kind, json!({})), None).await;
            assert_eq!(outcome.message, "OK");
            assert_eq!(outcome.response, None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_delay_fails_closed() {
        let exec = executor();
        let outcome = exec.execute_node(&node(NodeKind::Delay, json!({ "ms": 1e300 })), None).await;
        assert_eq!(outcome.status, StepStatus::Error);
        assert_eq!(outcome.message, "Failed to delay for <missing>ms");
        assert_eq!(outcome.response, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_lines_render_plain_values() {
        let exec = executor();
        let whole = exec.execute_node(&node(NodeKind::Delay, json!({ "ms": 250.0 })), None).await;
        assert_eq!(whole.message, "Delayed for 250ms");
        let fraction = exec.execute_node(&node(NodeKind::Delay, json!({ "ms": 12.5 })), None).await;
        assert_eq!(fraction.message, "Delayed for 12.5ms");

        struct TextStatus;

        #[async_trait]
        impl SideEffects for TextStatus {
            async fn send_email(&self, _: &EmailRequest) -> Result<Value, EffectError> {
                Ok(json!({ "status": "queued" }))
            }

            async fn send_sms(&self, _: &SmsRequest) -> Result<Value, EffectError> {
                Ok(json!({ "status": "queued" }))
            }

            async fn http_request(&self, _: &HttpRequest) -> Result<Value, EffectError> {
                Ok(json!({ "status": "201 Created" }))
            }
        }

        let outcome = NodeExecutor::new(Arc::new(TextStatus))
            .execute_node(&node(NodeKind::Http, json!({ "url": "https://api.example.com" })), None)
            .await;
        assert_eq!(outcome.message, "HTTP call to https://api.example.com returned 201 Created");
    }

    #[tokio::test]
    async fn test_condition_reports_decision_without_response() {
        let exec = executor();
        let cond = node(NodeKind::Condition, json!({ "expression": "response.status == 200" }));

        let outcome = exec.execute_node(&cond, Some(&json!({ "status": 200 }))).await;
        assert_eq!(outcome.decision, Some(true));
        assert_eq!(outcome.message, "Condition: true");
        assert_eq!(outcome.response, None);

        let outcome = exec.execute_node(&cond, None).await;
        assert_eq!(outcome.decision, Some(false));
        assert_eq!(outcome.message, "Condition: false");
    }
}
