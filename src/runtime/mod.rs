/// Runtime: graph execution simulator
///
/// This module provides the step-through simulator for workflow documents.
/// It handles:
/// - Indexing a document snapshot (outgoing edges, in-degrees, entry point)
/// - Per-kind simulated actions behind an injectable side-effect seam
/// - Condition predicates in a restricted expression language
/// - The step/play/pause/reset state machine

// Execution state machine
pub mod engine;

// Per-kind action executors and side effects
pub mod executor;

// Condition predicate parser/evaluator
pub mod expression;

// Graph indexer
pub mod index;

// Re-export main types
pub use engine::{
    fold_results, Hooks, PauseHandle, SimulationPhase, SimulationState, SimulationStep, Simulator,
    StepObserver, Transition,
};
pub use executor::{ActionOutcome, NodeExecutor, SideEffects, SimulatedEffects, StepStatus};
pub use index::GraphIndex;
