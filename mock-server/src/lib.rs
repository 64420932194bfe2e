use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Which field name records carry their identifier under.
///
/// The real service has shipped both; the client must accept either.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdField {
    #[default]
    Underscore,
    Plain,
}

impl IdField {
    pub fn key(self) -> &'static str {
        match self {
            IdField::Underscore => "_id",
            IdField::Plain => "id",
        }
    }

    /// Parses `_id` or `id`; anything else yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "_id" => Some(IdField::Underscore),
            "id" => Some(IdField::Plain),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

impl Todo {
    fn to_wire(&self, field: IdField) -> Value {
        let mut map = Map::new();
        map.insert(field.key().to_string(), Value::String(self.id.clone()));
        map.insert("text".to_string(), Value::String(self.text.clone()));
        map.insert("completed".to_string(), Value::Bool(self.completed));
        Value::Object(map)
    }
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub text: String,
}

#[derive(Deserialize)]
pub struct UpdateTodo {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

pub type Db = Arc<RwLock<Vec<Todo>>>;

#[derive(Default)]
struct StallPlan {
    remaining: usize,
    delay: Duration,
}

#[derive(Clone)]
struct AppState {
    db: Db,
    id_field: IdField,
    stall: Arc<Mutex<StallPlan>>,
}

impl AppState {
    fn take_stall(&self) -> Option<Duration> {
        let mut plan = self.stall.lock().unwrap_or_else(PoisonError::into_inner);
        if plan.remaining == 0 {
            return None;
        }
        plan.remaining -= 1;
        Some(plan.delay)
    }
}

/// In-memory stand-in for the remote todo service, served under `/api`.
#[derive(Clone)]
pub struct MockServer {
    state: AppState,
}

impl MockServer {
    pub fn new(id_field: IdField) -> Self {
        Self {
            state: AppState {
                db: Db::default(),
                id_field,
                stall: Arc::default(),
            },
        }
    }

    /// Handle to the backing store, for seeding and inspecting in tests.
    pub fn db(&self) -> Db {
        self.state.db.clone()
    }

    /// Delays the next `count` requests by `delay` before they are handled.
    pub fn stall_next(&self, count: usize, delay: Duration) {
        let mut plan = self.state.stall.lock().unwrap_or_else(PoisonError::into_inner);
        *plan = StallPlan {
            remaining: count,
            delay,
        };
    }

    pub fn router(&self) -> Router {
        let todos = Router::new()
            .route("/todos", get(list_todos).post(create_todo))
            .route("/todos/{id}", put(update_todo).delete(delete_todo))
            .route("/todos/{id}/toggle", put(toggle_todo));
        Router::new()
            .nest("/api", todos)
            .layer(middleware::from_fn_with_state(self.state.clone(), stall))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub async fn serve(self, listener: TcpListener) -> Result<(), std::io::Error> {
        axum::serve(listener, self.router()).await
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new(IdField::default())
    }
}

/// Router for a fresh server using `_id` records.
pub fn app() -> Router {
    MockServer::default().router()
}

/// Error response with the `{"message": ...}` body the client looks for.
struct ApiError(StatusCode, &'static str);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "message": self.1 }))).into_response()
    }
}

const NOT_FOUND: ApiError = ApiError(StatusCode::NOT_FOUND, "Todo not found");
const TEXT_REQUIRED: ApiError = ApiError(StatusCode::BAD_REQUEST, "Todo text is required");

async fn stall(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(delay) = state.take_stall() {
        tracing::debug!(uri = %request.uri(), ?delay, "stalling request");
        tokio::time::sleep(delay).await;
    }
    next.run(request).await
}

async fn list_todos(State(state): State<AppState>) -> Json<Vec<Value>> {
    let todos = state.db.read().await;
    Json(todos.iter().map(|t| t.to_wire(state.id_field)).collect())
}

async fn create_todo(
    State(state): State<AppState>,
    Json(input): Json<CreateTodo>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if input.text.trim().is_empty() {
        return Err(TEXT_REQUIRED);
    }
    let todo = Todo {
        id: Uuid::new_v4().to_string(),
        text: input.text,
        completed: false,
    };
    let wire = todo.to_wire(state.id_field);
    state.db.write().await.push(todo);
    Ok((StatusCode::CREATED, Json(wire)))
}

async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateTodo>,
) -> Result<Json<Value>, ApiError> {
    if input.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(TEXT_REQUIRED);
    }
    let mut todos = state.db.write().await;
    let todo = todos.iter_mut().find(|t| t.id == id).ok_or(NOT_FOUND)?;
    if let Some(text) = input.text {
        todo.text = text;
    }
    if let Some(completed) = input.completed {
        todo.completed = completed;
    }
    Ok(Json(todo.to_wire(state.id_field)))
}

async fn toggle_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut todos = state.db.write().await;
    let todo = todos.iter_mut().find(|t| t.id == id).ok_or(NOT_FOUND)?;
    todo.completed = !todo.completed;
    Ok(Json(todo.to_wire(state.id_field)))
}

async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut todos = state.db.write().await;
    let index = todos.iter().position(|t| t.id == id).ok_or(NOT_FOUND)?;
    todos.remove(index);
    Ok(Json(json!({ "message": "Todo deleted" })))
}
