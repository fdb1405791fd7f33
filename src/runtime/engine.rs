//! Step-through execution simulator
//!
//! Walks one document snapshot node by node. Every non-condition node
//! follows its first outgoing edge; condition nodes follow the edge labelled
//! with their decision. `play()` loops `step()` until the walk ends or the
//! running flag is cleared, which is only observed between steps.

use crate::config::SimulatorConfig;
use crate::runtime::{
    executor::{NodeExecutor, SideEffects, SimulatedEffects, StepStatus},
    index::GraphIndex,
};
use crate::workflow::types::{NodeStatus, WorkflowDocument, WorkflowEdge};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// One entry of the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStep {
    pub node_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: StepStatus,
    pub log: String,
}

/// Observable simulator state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    /// Node the next step will execute
    pub current_node: Option<String>,
    pub running: bool,
    pub steps: Vec<SimulationStep>,
    /// -1 before the first step of a run
    pub pointer: i64,
}

/// Edge taken by the most recent step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub edge_id: String,
}

impl Transition {
    fn along(edge: &WorkflowEdge) -> Self {
        Self {
            from: edge.source.clone(),
            to: edge.target.clone(),
            edge_id: edge.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationPhase {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Observation hooks around each executed step
///
/// Errors returned by the hooks are logged and discarded; they never stop a run.
pub trait StepObserver {
    fn on_before(&mut self, _node_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_after(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// No-op observer
impl StepObserver for () {}

/// Observer built from a pair of closures
pub struct Hooks<B, A> {
    before: B,
    after: A,
}

impl<B, A> Hooks<B, A>
where
    B: FnMut(&str) -> anyhow::Result<()>,
    A: FnMut() -> anyhow::Result<()>,
{
    pub fn new(before: B, after: A) -> Self {
        Self { before, after }
    }
}

impl<B, A> StepObserver for Hooks<B, A>
where
    B: FnMut(&str) -> anyhow::Result<()>,
    A: FnMut() -> anyhow::Result<()>,
{
    fn on_before(&mut self, node_id: &str) -> anyhow::Result<()> {
        (self.before)(node_id)
    }

    fn on_after(&mut self) -> anyhow::Result<()> {
        (self.after)()
    }
}

/// Clears the running flag of a simulator from another task
#[derive(Debug, Clone)]
pub struct PauseHandle {
    running: Arc<AtomicBool>,
}

impl PauseHandle {
    pub fn pause(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Execution state machine bound to one document snapshot
#[derive(Debug)]
pub struct Simulator {
    document: Arc<WorkflowDocument>,
    index: GraphIndex,
    executor: NodeExecutor,
    running: Arc<AtomicBool>,
    current_node: Option<String>,
    steps: Vec<SimulationStep>,
    pointer: i64,
    last_response: Option<Value>,
    last_transition: Option<Transition>,
    max_play_steps: Option<usize>,
}

impl Simulator {
    /// Simulator using the built-in simulated side effects
    pub fn new(document: Arc<WorkflowDocument>, config: &SimulatorConfig) -> Self {
        let effects = Arc::new(SimulatedEffects::new(config.action_latency()));
        Self::with_effects(document, effects, config)
    }

    pub fn with_effects(
        document: Arc<WorkflowDocument>,
        effects: Arc<dyn SideEffects>,
        config: &SimulatorConfig,
    ) -> Self {
        let index = GraphIndex::build(&document);
        tracing::info!(
            "🧭 Simulator bound to document '{}' ({} nodes, {} edges), entry: {:?}",
            document.id,
            document.nodes.len(),
            document.edges.len(),
            index.entry_point()
        );
        if index.is_cyclic() {
            match config.max_play_steps {
                Some(limit) => tracing::warn!("⚠️ Document '{}' is cyclic; play() stops after {} steps", document.id, limit),
                None => tracing::warn!("⚠️ Document '{}' is cyclic; play() runs until paused", document.id),
            }
        }

        Self {
            document,
            index,
            executor: NodeExecutor::new(effects),
            running: Arc::new(AtomicBool::new(false)),
            current_node: None,
            steps: Vec::new(),
            pointer: -1,
            last_response: None,
            last_transition: None,
            max_play_steps: config.max_play_steps,
        }
    }

    pub fn document(&self) -> &Arc<WorkflowDocument> {
        &self.document
    }

    pub fn index(&self) -> &GraphIndex {
        &self.index
    }

    pub fn steps(&self) -> &[SimulationStep] {
        &self.steps
    }

    pub fn pointer(&self) -> i64 {
        self.pointer
    }

    pub fn current_node(&self) -> Option<&str> {
        self.current_node.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn last_response(&self) -> Option<&Value> {
        self.last_response.as_ref()
    }

    pub fn last_transition(&self) -> Option<&Transition> {
        self.last_transition.as_ref()
    }

    /// Snapshot of the observable state
    pub fn state(&self) -> SimulationState {
        SimulationState {
            current_node: self.current_node.clone(),
            running: self.is_running(),
            steps: self.steps.clone(),
            pointer: self.pointer,
        }
    }

    pub fn phase(&self) -> SimulationPhase {
        if self.pointer == -1 {
            if self.index.entry_point().is_none() {
                SimulationPhase::Finished
            } else if self.is_running() {
                SimulationPhase::Running
            } else {
                SimulationPhase::Idle
            }
        } else if self.current_node.is_none() {
            SimulationPhase::Finished
        } else if self.is_running() {
            SimulationPhase::Running
        } else {
            SimulationPhase::Paused
        }
    }

    pub fn pause_handle(&self) -> PauseHandle {
        PauseHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Clear the running flag; an in-flight step still completes
    pub fn pause(&self) {
        tracing::info!("⏸️ Simulation paused at pointer {}", self.pointer);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Return to the initial state; the graph index is kept
    pub fn reset(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.pointer = -1;
        self.steps.clear();
        self.current_node = None;
        self.last_response = None;
        self.last_transition = None;
        tracing::debug!("🔄 Simulation reset for document '{}'", self.document.id);
    }

    /// Execute the current node and move to the next one
    ///
    /// No-op once the walk has ended (or when there is no entry point).
    pub async fn step<O>(&mut self, observer: &mut O)
    where
        O: StepObserver + ?Sized,
    {
        if self.pointer == -1 {
            self.current_node = self.index.entry_point().map(str::to_string);
        }
        let Some(node_id) = self.current_node.clone() else {
            tracing::debug!("⏹️ Nothing left to execute");
            return;
        };

        self.pointer += 1;
        tracing::debug!("📍 Step {}: node '{}'", self.pointer, node_id);

        if let Err(e) = observer.on_before(&node_id) {
            tracing::debug!("🙈 on_before hook failed for '{}': {}", node_id, e);
        }
        self.run_one(&node_id).await;
        if let Err(e) = observer.on_after() {
            tracing::debug!("🙈 on_after hook failed for '{}': {}", node_id, e);
        }
    }

    /// Step until the walk ends or the simulator is paused
    pub async fn play<O>(&mut self, observer: &mut O)
    where
        O: StepObserver + ?Sized,
    {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("▶️ Simulation started for document '{}'", self.document.id);

        let mut executed = 0usize;
        while self.is_running() {
            self.step(observer).await;
            executed += 1;
            if self.current_node.is_none() {
                break;
            }
            if let Some(limit) = self.max_play_steps {
                if executed >= limit {
                    tracing::warn!("⚠️ Simulation stopped after {} steps (play limit)", limit);
                    break;
                }
            }
            // Passive nodes never suspend; give pausers and the runtime a turn
            tokio::task::yield_now().await;
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!(
            "⏹️ Simulation stopped after {} steps ({} log entries)",
            executed,
            self.steps.len()
        );
    }

    async fn run_one(&mut self, node_id: &str) {
        let document = Arc::clone(&self.document);
        let Some(node) = self.index.node(&document, node_id) else {
            self.current_node = None;
            return;
        };

        let started_at = Utc::now();
        let outcome = self
            .executor
            .execute_node(node, self.last_response.as_ref())
            .await;
        let finished_at = Utc::now();

        if let Some(response) = outcome.response {
            self.last_response = Some(response);
        }
        self.record(node_id, started_at, finished_at, outcome.status, outcome.message);

        let outgoing = self.index.outgoing(node_id);
        match outcome.decision {
            Some(decision) => {
                let wanted = if decision { "true" } else { "false" };
                let branch = outgoing
                    .iter()
                    .find(|edge| edge.has_label(wanted))
                    .filter(|edge| self.index.contains(&edge.target))
                    .cloned();

                match branch {
                    Some(edge) => {
                        self.current_node = Some(edge.target.clone());
                        self.last_transition = Some(Transition::along(&edge));
                    }
                    None => {
                        tracing::warn!("🚧 Condition '{}' has no usable '{}' edge", node_id, wanted);
                        let now = Utc::now();
                        self.record(node_id, now, now, StepStatus::Error, format!("Missing {} edge", wanted));
                        self.current_node = None;
                        self.last_transition = None;
                    }
                }
            }
            None => {
                let first = outgoing.first().cloned();
                self.current_node = first
                    .as_ref()
                    .filter(|edge| self.index.contains(&edge.target))
                    .map(|edge| edge.target.clone());
                self.last_transition = first.as_ref().map(Transition::along);
            }
        }
    }

    fn record(
        &mut self,
        node_id: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        status: StepStatus,
        log: String,
    ) {
        self.steps.push(SimulationStep {
            node_id: node_id.to_string(),
            started_at,
            finished_at,
            status,
            log,
        });
    }
}

/// Write run results into `document`: each step sets its node's status and
/// appends its log line
///
/// Steps for nodes missing from `document` are skipped.
pub fn fold_results(steps: &[SimulationStep], document: &mut WorkflowDocument) {
    for step in steps {
        if let Some(node) = document.node_mut(&step.node_id) {
            node.data.status = match step.status {
                StepStatus::Success => NodeStatus::Success,
                StepStatus::Error => NodeStatus::Error,
                StepStatus::Skipped => NodeStatus::Skipped,
            };
            node.data.logs.push(step.log.clone());
        }
    }
}
