/// Simulation REST API endpoints
///
/// The interactive simulator lives in shared state and is bound to the
/// snapshot that was current when it was created (or last reset). A one-shot
/// run endpoint plays a fresh simulator to completion and can commit the
/// results back into the document as one undoable edit.

use crate::{
    api::AppState,
    runtime::{fold_results, SimulationPhase, SimulationState, Simulator, Transition},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Simulator state as returned by every simulation endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationView {
    pub document_id: String,
    pub phase: SimulationPhase,
    pub state: SimulationState,
    pub last_transition: Option<Transition>,
    pub last_response: Option<Value>,
}

impl SimulationView {
    fn of(simulator: &Simulator) -> Self {
        Self {
            document_id: simulator.document().id.clone(),
            phase: simulator.phase(),
            state: simulator.state(),
            last_transition: simulator.last_transition().cloned(),
            last_response: simulator.last_response().cloned(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    /// Commit node statuses and logs back into the document
    #[serde(default)]
    pub apply: bool,
}

/// Create simulation control routes
pub fn create_simulation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/simulation", get(get_simulation))
        .route("/api/simulation/run", post(run_simulation))
        .route("/api/simulation/reset", post(reset_simulation))
        .route("/api/simulation/step", post(step_simulation))
        .route("/api/simulation/play", post(play_simulation))
        .route("/api/simulation/pause", post(pause_simulation))
}

/// Bind a new interactive simulator to the current snapshot
fn bind(state: &AppState) -> Simulator {
    let simulator = Simulator::new(state.snapshots.load(), &state.config.simulator);
    state.pause.store(Some(Arc::new(simulator.pause_handle())));
    simulator
}

/// GET /api/simulation
/// Returns 409 while a step or play request holds the simulator
async fn get_simulation(State(state): State<AppState>) -> Result<Json<Option<SimulationView>>, StatusCode> {
    let guard = state.simulation.try_lock().map_err(|_| StatusCode::CONFLICT)?;
    Ok(Json(guard.as_ref().map(SimulationView::of)))
}

/// POST /api/simulation/run?apply=true
/// The run is capped at `max_run_steps` since nothing can pause it
async fn run_simulation(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
) -> Json<SimulationView> {
    let config = state.config.simulator.for_unattended_run();
    let mut simulator = Simulator::new(state.snapshots.load(), &config);
    simulator.play(&mut ()).await;

    if params.apply {
        let steps = simulator.steps().to_vec();
        let mut session = state.session.lock().await;
        session.commit(|document| {
            document.reset_statuses();
            fold_results(&steps, document);
        });
        tracing::info!("📝 Applied {} simulation steps to the document", steps.len());
    }

    Json(SimulationView::of(&simulator))
}

/// POST /api/simulation/reset
/// Rebinds to the latest snapshot when the document changed since the simulator was created
async fn reset_simulation(State(state): State<AppState>) -> Result<Json<SimulationView>, StatusCode> {
    let mut guard = state.simulation.try_lock().map_err(|_| StatusCode::CONFLICT)?;
    let current = state.snapshots.load();

    let same_snapshot = guard
        .as_ref()
        .is_some_and(|simulator| Arc::ptr_eq(simulator.document(), &current));
    if same_snapshot {
        if let Some(simulator) = guard.as_mut() {
            simulator.reset();
        }
    } else {
        *guard = Some(bind(&state));
    }

    let simulator = guard.as_ref().ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(SimulationView::of(simulator)))
}

/// POST /api/simulation/step
async fn step_simulation(State(state): State<AppState>) -> Result<Json<SimulationView>, StatusCode> {
    let mut guard = state.simulation.try_lock().map_err(|_| StatusCode::CONFLICT)?;
    let simulator = guard.get_or_insert_with(|| bind(&state));

    simulator.step(&mut ()).await;
    Ok(Json(SimulationView::of(simulator)))
}

/// POST /api/simulation/play
/// Responds once the run finishes or is paused
async fn play_simulation(State(state): State<AppState>) -> Result<Json<SimulationView>, StatusCode> {
    let mut guard = state.simulation.try_lock().map_err(|_| StatusCode::CONFLICT)?;
    let simulator = guard.get_or_insert_with(|| bind(&state));

    simulator.play(&mut ()).await;
    Ok(Json(SimulationView::of(simulator)))
}

/// POST /api/simulation/pause
async fn pause_simulation(State(state): State<AppState>) -> StatusCode {
    match state.pause.load_full() {
        Some(handle) => {
            handle.pause();
            tracing::info!("⏸️ Pause requested");
            StatusCode::ACCEPTED
        }
        None => StatusCode::NOT_FOUND,
    }
}
