/// Document editing REST API endpoints
///
/// Every mutating endpoint goes through the editor session, so each request is
/// one undoable history entry and re-arms the debounced autosave.

use crate::{
    api::AppState,
    history::EditorSession,
    workflow::{
        registry::{self, NodeIssue, NodeSchema},
        samples::{self, SampleError},
        types::{NodeKind, NodeStatus, Position, Viewport, WorkflowDocument, WorkflowEdge, WorkflowNode},
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current document plus editor flags
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub document: WorkflowDocument,
    pub viewport: Viewport,
    pub can_undo: bool,
    pub can_redo: bool,
    pub dirty: bool,
}

impl DocumentView {
    fn of(session: &EditorSession) -> Self {
        Self {
            document: WorkflowDocument::clone(session.document()),
            viewport: session.viewport(),
            can_undo: session.can_undo(),
            can_redo: session.can_redo(),
            dirty: session.is_dirty(),
        }
    }
}

/// Response for create operations
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

/// Request body for node creation; missing config entries come from the registry defaults
#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub kind: NodeKind,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
}

/// Partial node update; config entries are merged into the existing config
#[derive(Debug, Default, Deserialize)]
pub struct NodePatch {
    pub label: Option<String>,
    pub position: Option<Position>,
    pub config: Option<Map<String, Value>>,
    pub status: Option<NodeStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEdgeRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EdgePatch {
    pub source: Option<String>,
    pub target: Option<String>,
    pub label: Option<String>,
}

/// Create document editing routes
pub fn create_document_routes() -> Router<AppState> {
    Router::new()
        .route("/api/document", get(get_document).put(replace_document))
        .route("/api/document/undo", post(undo))
        .route("/api/document/redo", post(redo))
        .route("/api/document/save", post(save_document))
        .route("/api/document/viewport", put(set_viewport))
        .route("/api/document/validate", get(validate_document))
        .route("/api/document/samples/{name}", post(load_sample))
        .route("/api/document/nodes", post(create_node))
        .route("/api/document/nodes/{id}", patch(update_node).delete(delete_node))
        .route("/api/document/edges", post(create_edge))
        .route("/api/document/edges/{id}", patch(update_edge).delete(delete_edge))
        .route("/api/registry", get(list_schemas))
}

/// GET /api/document
async fn get_document(State(state): State<AppState>) -> Json<DocumentView> {
    let session = state.session.lock().await;
    Json(DocumentView::of(&session))
}

/// PUT /api/document
/// Body: a full WorkflowDocument; history is discarded
async fn replace_document(
    State(state): State<AppState>,
    Json(document): Json<WorkflowDocument>,
) -> Result<Json<DocumentView>, StatusCode> {
    if document.id.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let mut session = state.session.lock().await;
    session.replace(document);
    Ok(Json(DocumentView::of(&session)))
}

/// POST /api/document/undo
async fn undo(State(state): State<AppState>) -> Json<DocumentView> {
    let mut session = state.session.lock().await;
    session.undo();
    Json(DocumentView::of(&session))
}

/// POST /api/document/redo
async fn redo(State(state): State<AppState>) -> Json<DocumentView> {
    let mut session = state.session.lock().await;
    session.redo();
    Json(DocumentView::of(&session))
}

/// POST /api/document/save
async fn save_document(State(state): State<AppState>) -> Result<Json<DocumentView>, StatusCode> {
    let mut session = state.session.lock().await;
    if let Err(e) = session.save_now().await {
        tracing::error!("Failed to save document: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(DocumentView::of(&session)))
}

/// PUT /api/document/viewport
async fn set_viewport(
    State(state): State<AppState>,
    Json(viewport): Json<Viewport>,
) -> Json<DocumentView> {
    let mut session = state.session.lock().await;
    session.set_viewport(viewport);
    Json(DocumentView::of(&session))
}

/// GET /api/document/validate
/// Returns: [{ "nodeId": "...", "kind": "...", "message": "..." }]
async fn validate_document(State(state): State<AppState>) -> Json<Vec<NodeIssue>> {
    let snapshot = state.snapshots.load();
    Json(registry::validate_document(&snapshot))
}

/// POST /api/document/samples/{name}
async fn load_sample(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DocumentView>, StatusCode> {
    let document = samples::load_sample(&name).map_err(|e| {
        tracing::error!("Failed to load sample {}: {}", name, e);
        match e {
            SampleError::NotFound(_) => StatusCode::NOT_FOUND,
            SampleError::Malformed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    })?;

    let mut session = state.session.lock().await;
    session.replace(document);
    tracing::info!("📦 Loaded sample '{}'", name);
    Ok(Json(DocumentView::of(&session)))
}

/// POST /api/document/nodes
/// Body: { "kind": "action.email", "label": "...", "position": {...}, "config": {...} }
async fn create_node(
    State(state): State<AppState>,
    Json(payload): Json<CreateNodeRequest>,
) -> Result<Json<CreatedResponse>, StatusCode> {
    let mut config = registry::default_config(payload.kind);
    config.extend(payload.config.unwrap_or_default());

    let label = payload.label.unwrap_or_else(|| {
        registry::schema_for(payload.kind)
            .map(|schema| schema.title.to_string())
            .unwrap_or_else(|| payload.kind.to_string())
    });

    let mut node = WorkflowNode::new(payload.id.unwrap_or_default(), payload.kind, label)
        .with_config(Value::Object(config));
    if let Some(position) = payload.position {
        node.position = position;
    }

    let mut session = state.session.lock().await;
    if !node.id.is_empty() && session.document().node(&node.id).is_some() {
        return Err(StatusCode::CONFLICT);
    }
    let id = session.add_node(node);
    tracing::info!("➕ Added node '{}'", id);
    Ok(Json(CreatedResponse { id }))
}

/// PATCH /api/document/nodes/{id}
async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<NodePatch>,
) -> Result<Json<DocumentView>, StatusCode> {
    let mut session = state.session.lock().await;
    if session.document().node(&id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    session.update_node(&id, |node| {
        if let Some(label) = patch.label {
            node.data.label = label;
        }
        if let Some(position) = patch.position {
            node.position = position;
        }
        if let Some(config) = patch.config {
            node.data.config.extend(config);
        }
        if let Some(status) = patch.status {
            node.data.status = status;
        }
    });
    Ok(Json(DocumentView::of(&session)))
}

/// DELETE /api/document/nodes/{id}
async fn delete_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentView>, StatusCode> {
    let mut session = state.session.lock().await;
    if session.document().node(&id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    session.remove_node(&id);
    tracing::info!("🗑️ Removed node '{}'", id);
    Ok(Json(DocumentView::of(&session)))
}

/// POST /api/document/edges
/// Body: { "source": "...", "target": "...", "label": "true" }
async fn create_edge(
    State(state): State<AppState>,
    Json(payload): Json<CreateEdgeRequest>,
) -> Result<Json<CreatedResponse>, StatusCode> {
    if payload.source.is_empty() || payload.target.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut edge = WorkflowEdge::new(payload.id.unwrap_or_default(), payload.source, payload.target);
    edge.label = payload.label;
    edge.source_handle = payload.source_handle;
    edge.target_handle = payload.target_handle;

    let mut session = state.session.lock().await;
    if !edge.id.is_empty() && session.document().edge(&edge.id).is_some() {
        return Err(StatusCode::CONFLICT);
    }
    let id = session.add_edge(edge);
    tracing::info!("🔗 Added edge '{}'", id);
    Ok(Json(CreatedResponse { id }))
}

/// PATCH /api/document/edges/{id}
async fn update_edge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<EdgePatch>,
) -> Result<Json<DocumentView>, StatusCode> {
    let mut session = state.session.lock().await;
    if session.document().edge(&id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    session.update_edge(&id, |edge| {
        if let Some(source) = patch.source {
            edge.source = source;
        }
        if let Some(target) = patch.target {
            edge.target = target;
        }
        if let Some(label) = patch.label {
            edge.label = (!label.is_empty()).then_some(label);
        }
    });
    Ok(Json(DocumentView::of(&session)))
}

/// DELETE /api/document/edges/{id}
async fn delete_edge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentView>, StatusCode> {
    let mut session = state.session.lock().await;
    if session.document().edge(&id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    session.remove_edge(&id);
    Ok(Json(DocumentView::of(&session)))
}

/// GET /api/registry
async fn list_schemas() -> Json<Vec<NodeSchema>> {
    Json(registry::all_schemas())
}
