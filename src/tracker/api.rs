use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::auth::{self, AuthUser};
use super::db::{DbHandle, StageSeed, TaskUpdate, task_view};
#[cfg(test)]
use super::db::TrackerDb;
use super::models::*;
use super::ws::{WsMessage, broadcast_message};
use crate::errors::{StatusError, TrackerError};
use crate::status::{Clock, TaskStatus, UnitStatus, parse_calendar_date};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub ws_tx: broadcast::Sender<String>,
    pub clock: Arc<dyn Clock>,
    pub secret: String,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub name: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct ProjectFilter {
    pub archived: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub clone_from: Option<i64>,
    pub default_stages: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
}

#[derive(Deserialize)]
pub struct ArchiveRequest {
    pub archived: bool,
}

#[derive(Deserialize)]
pub struct CreateUnitRequest {
    pub name: String,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUnitRequest {
    pub status: Option<String>,
    pub comment: Option<String>,
}

#[derive(Deserialize)]
pub struct UnitStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct UnitDatesRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub due_date: String,
    pub status: Option<String>,
    pub assigned_to: Option<AssigneeRef>,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
    // Present-but-null means "unassign"; absent means "leave as is".
    #[serde(default, deserialize_with = "deserialize_present")]
    pub assigned_to: Option<Option<AssigneeRef>>,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        let msg = err.to_string();
        match err {
            TrackerError::ProjectNotFound { .. }
            | TrackerError::UnitNotFound { .. }
            | TrackerError::StageNotFound { .. }
            | TrackerError::TaskNotFound { .. }
            | TrackerError::AssigneeNotFound(_)
            | TrackerError::UserNotFound(_) => ApiError::NotFound(msg),
            TrackerError::Unauthorized | TrackerError::InvalidCredentials => {
                ApiError::Unauthorized(msg)
            }
            TrackerError::InvalidToken | TrackerError::Forbidden(_) => ApiError::Forbidden(msg),
            TrackerError::BadRequest(_) | TrackerError::Status(_) => ApiError::BadRequest(msg),
            TrackerError::Conflict(_) => ApiError::Conflict(msg),
            TrackerError::LockPoisoned | TrackerError::Other(_) => {
                tracing::error!(error = %msg, "internal error");
                ApiError::Internal(msg)
            }
        }
    }
}

impl From<StatusError> for ApiError {
    fn from(err: StatusError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Storage errors arrive as `anyhow::Error`; typed causes keep their status.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TrackerError>() {
            Ok(tracker) => tracker.into(),
            Err(err) => match err.downcast::<StatusError>() {
                Ok(status) => status.into(),
                Err(err) => {
                    let detail = format!("{:#}", err);
                    tracing::error!(error = %detail, "internal error");
                    ApiError::Internal(err.to_string())
                }
            },
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router(state: SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .route("/api/me", get(me))
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/projects/{id}/archive", put(archive_project))
        .route("/api/projects/{id}/board", get(get_board))
        .route("/api/projects/{id}/units", post(create_unit))
        .route("/api/projects/{id}/stages", get(list_stages).post(create_stage))
        .route("/api/units/{id}", put(update_unit).delete(delete_unit))
        .route("/api/units/{id}/status", patch(update_unit_status))
        .route("/api/units/{id}/dates", put(update_unit_dates))
        .route(
            "/api/stages/{id}",
            get(get_stage).put(rename_stage).delete(delete_stage),
        )
        .route("/api/stages/{id}/tasks", get(list_stage_tasks).post(create_task))
        .route("/api/tasks", get(list_all_tasks))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/api/due-tasks", get(due_tasks))
        .route("/api/assignees", get(list_assignees).post(create_assignee))
        .route(
            "/api/assignees/{id}",
            get(get_assignee).put(rename_assignee).delete(delete_assignee),
        )
        .route("/api/admin/users", get(list_users).post(create_user))
        .route("/api/admin/users/{id}", put(update_user).delete(delete_user))
        .route_layer(middleware::from_fn_with_state(state, auth::require_auth));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(api_health))
        .route("/api/login", post(login))
        .merge(protected)
}

// ── Helpers ───────────────────────────────────────────────────────────

fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>, StatusError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_calendar_date(value).map(Some),
    }
}

fn optional_status<T>(raw: Option<&str>) -> Result<Option<T>, StatusError>
where
    T: std::str::FromStr<Err = StatusError>,
{
    raw.map(str::parse).transpose()
}

// ── Handlers: session ─────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn api_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    let lookup = username.clone();
    let found = state
        .db
        .call(move |db| db.find_user_credentials(&lookup))
        .await?;

    let verified = match found {
        Some((user, hash)) => auth::verify_password_blocking(req.password, hash)
            .await
            .then_some(user),
        None => None,
    };
    let Some(user) = verified else {
        tracing::info!(%username, "rejected login");
        return Err(TrackerError::InvalidCredentials.into());
    };

    tracing::info!(username = %user.username, role = %user.role, "user logged in");
    Ok(Json(LoginResponse {
        token: auth::issue_token(&state.secret, user.id)?,
        username: user.username,
        name: user.name,
        role: user.role,
    }))
}

async fn me(Extension(user): Extension<AuthUser>) -> impl IntoResponse {
    Json(serde_json::json!({
        "id": user.id,
        "username": user.username,
        "name": user.name,
        "role": user.role,
    }))
}

// ── Handlers: projects ────────────────────────────────────────────────

async fn list_projects(
    State(state): State<SharedState>,
    Query(filter): Query<ProjectFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let archived = filter.archived;
    let today = state.clock.today();
    let projects = state
        .db
        .call(move |db| db.list_projects_with_units(archived, today))
        .await?;
    Ok(Json(projects))
}

async fn create_project(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let name = required(&req.name, "name")?;
    let description = req.description.unwrap_or_default();
    let today = state.clock.today();
    let start_date = optional_date(req.start_date.as_deref())?.unwrap_or(today);
    let seed = match (req.clone_from, req.default_stages.unwrap_or(true)) {
        (Some(source), _) => StageSeed::CloneFrom(source),
        (None, true) => StageSeed::Defaults,
        (None, false) => StageSeed::Empty,
    };

    let project = state
        .db
        .call(move |db| {
            let project = db.create_project(&name, &description, start_date, seed)?;
            db.with_units(project, today)
        })
        .await?;
    tracing::info!(project_id = project.project.id, by = %user.username, "project created");
    broadcast_message(
        &state.ws_tx,
        &WsMessage::ProjectCreated {
            project: project.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let today = state.clock.today();
    let project = state
        .db
        .call(move |db| db.get_project_with_units(id, today))
        .await?;
    match project {
        Some(project) => Ok(Json(project)),
        None => Err(TrackerError::ProjectNotFound { id }.into()),
    }
}

async fn update_project(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let name = match req.name.as_deref() {
        Some(n) => Some(required(n, "name")?),
        None => None,
    };
    let description = req.description;
    let start_date = optional_date(req.start_date.as_deref())?;
    let today = state.clock.today();

    let project = state
        .db
        .call(move |db| {
            let project =
                db.update_project(id, name.as_deref(), description.as_deref(), start_date)?;
            db.with_units(project, today)
        })
        .await?;
    broadcast_message(
        &state.ws_tx,
        &WsMessage::ProjectUpdated {
            project: project.clone(),
        },
    );
    Ok(Json(project))
}

async fn archive_project(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<ArchiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_admin()?;
    let archived = req.archived;
    let today = state.clock.today();
    let project = state
        .db
        .call(move |db| {
            let project = db.set_project_archived(id, archived)?;
            db.with_units(project, today)
        })
        .await?;
    tracing::info!(project_id = id, archived, "project archive flag changed");
    broadcast_message(
        &state.ws_tx,
        &WsMessage::ProjectUpdated {
            project: project.clone(),
        },
    );
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let deleted = state.db.call(move |db| db.delete_project(id)).await?;
    match deleted {
        true => {
            tracing::info!(project_id = id, by = %user.username, "project deleted");
            broadcast_message(&state.ws_tx, &WsMessage::ProjectDeleted { project_id: id });
            Ok(StatusCode::NO_CONTENT)
        }
        false => Err(TrackerError::ProjectNotFound { id }.into()),
    }
}

async fn get_board(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let today = state.clock.today();
    let board = state.db.call(move |db| db.get_board(id, today)).await?;
    Ok(Json(board))
}

// ── Handlers: units ───────────────────────────────────────────────────

async fn create_unit(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<i64>,
    Json(req): Json<CreateUnitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let name = required(&req.name, "name")?;
    let status = optional_status::<UnitStatus>(req.status.as_deref())?.unwrap_or_default();
    let start_date = optional_date(req.start_date.as_deref())?;
    let end_date = optional_date(req.end_date.as_deref())?;

    let (unit, project_status) = state
        .db
        .call(move |db| {
            let unit = db.create_unit(project_id, &name, status, start_date, end_date)?;
            let project_status = db.project_status(project_id)?;
            Ok((unit, project_status))
        })
        .await?;
    broadcast_message(
        &state.ws_tx,
        &WsMessage::UnitUpdated {
            unit: unit.clone(),
            project_status,
        },
    );
    Ok((StatusCode::CREATED, Json(unit)))
}

async fn apply_unit_update(
    state: &SharedState,
    id: i64,
    status: Option<UnitStatus>,
    comment: Option<String>,
) -> Result<Unit, ApiError> {
    let (unit, project_status) = state
        .db
        .call(move |db| {
            let unit = db.update_unit(id, status, comment.as_deref())?;
            let project_status = db.project_status(unit.project_id)?;
            Ok((unit, project_status))
        })
        .await?;
    tracing::debug!(unit_id = id, %project_status, "unit updated");
    broadcast_message(
        &state.ws_tx,
        &WsMessage::UnitUpdated {
            unit: unit.clone(),
            project_status,
        },
    );
    Ok(unit)
}

async fn update_unit(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUnitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    if req.status.is_none() && req.comment.is_none() {
        return Err(ApiError::BadRequest(
            "Nothing to update: provide status or comment".to_string(),
        ));
    }
    let status = optional_status::<UnitStatus>(req.status.as_deref())?;
    let unit = apply_unit_update(&state, id, status, req.comment).await?;
    Ok(Json(unit))
}

async fn update_unit_status(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UnitStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let status: UnitStatus = req.status.parse()?;
    let unit = apply_unit_update(&state, id, Some(status), None).await?;
    Ok(Json(unit))
}

async fn update_unit_dates(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UnitDatesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let start_date = optional_date(req.start_date.as_deref())?;
    let end_date = optional_date(req.end_date.as_deref())?;
    let (unit, project_status) = state
        .db
        .call(move |db| {
            let unit = db.update_unit_dates(id, start_date, end_date)?;
            let project_status = db.project_status(unit.project_id)?;
            Ok((unit, project_status))
        })
        .await?;
    broadcast_message(
        &state.ws_tx,
        &WsMessage::UnitUpdated {
            unit: unit.clone(),
            project_status,
        },
    );
    Ok(Json(unit))
}

async fn delete_unit(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let deleted = state
        .db
        .call(move |db| match db.delete_unit(id)? {
            Some(unit) => Ok(Some((unit.project_id, db.project_status(unit.project_id)?))),
            None => Ok(None),
        })
        .await?;
    match deleted {
        Some((project_id, project_status)) => {
            broadcast_message(
                &state.ws_tx,
                &WsMessage::UnitDeleted {
                    unit_id: id,
                    project_id,
                    project_status,
                },
            );
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(TrackerError::UnitNotFound { id }.into()),
    }
}

// ── Handlers: stages ──────────────────────────────────────────────────

async fn list_stages(
    State(state): State<SharedState>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let stages = state
        .db
        .call(move |db| {
            if db.get_project(project_id)?.is_none() {
                return Err(TrackerError::ProjectNotFound { id: project_id }.into());
            }
            db.list_stages(project_id)
        })
        .await?;
    Ok(Json(stages))
}

async fn create_stage(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<i64>,
    Json(req): Json<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let name = required(&req.name, "name")?;
    let stage = state
        .db
        .call(move |db| db.create_stage(project_id, &name))
        .await?;
    broadcast_message(
        &state.ws_tx,
        &WsMessage::StageCreated {
            stage: stage.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(stage)))
}

async fn get_stage(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.call(move |db| db.get_stage(id)).await? {
        Some(stage) => Ok(Json(stage)),
        None => Err(TrackerError::StageNotFound { id }.into()),
    }
}

async fn rename_stage(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let name = required(&req.name, "name")?;
    let stage = state.db.call(move |db| db.rename_stage(id, &name)).await?;
    Ok(Json(stage))
}

async fn delete_stage(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    if state.db.call(move |db| db.delete_stage(id)).await? {
        broadcast_message(&state.ws_tx, &WsMessage::StageDeleted { stage_id: id });
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TrackerError::StageNotFound { id }.into())
    }
}

// ── Handlers: tasks ───────────────────────────────────────────────────

async fn list_stage_tasks(
    State(state): State<SharedState>,
    Path(stage_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let today = state.clock.today();
    let tasks = state
        .db
        .call(move |db| {
            if db.get_stage(stage_id)?.is_none() {
                return Err(TrackerError::StageNotFound { id: stage_id }.into());
            }
            db.list_tasks(stage_id)
        })
        .await?;
    let views: Vec<TaskView> = tasks.into_iter().map(|t| task_view(t, today)).collect();
    Ok(Json(views))
}

async fn create_task(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(stage_id): Path<i64>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let title = required(&req.title, "title")?;
    let due_date = parse_calendar_date(&req.due_date)?;
    let status = optional_status::<TaskStatus>(req.status.as_deref())?.unwrap_or(TaskStatus::Pending);
    let assignee = AssigneeSelector::from(req.assigned_to);

    let task = state
        .db
        .call(move |db| db.create_task(stage_id, &title, due_date, status, &assignee))
        .await?;
    let view = task_view(task, state.clock.today());
    broadcast_message(&state.ws_tx, &WsMessage::TaskCreated { task: view.clone() });
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_all_tasks(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let today = state.clock.today();
    let tasks = state.db.call(move |db| db.list_all_tasks()).await?;
    let views: Vec<TaskView> = tasks.into_iter().map(|t| task_view(t, today)).collect();
    Ok(Json(views))
}

async fn get_task(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.call(move |db| db.get_task(id)).await? {
        Some(task) => Ok(Json(task_view(task, state.clock.today()))),
        None => Err(TrackerError::TaskNotFound { id }.into()),
    }
}

async fn update_task(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let title = match req.title.as_deref() {
        Some(t) => Some(required(t, "title")?),
        None => None,
    };
    let update = TaskUpdate {
        title,
        due_date: optional_date(req.due_date.as_deref())?,
        status: optional_status::<TaskStatus>(req.status.as_deref())?,
        assigned_to: req.assigned_to.map(AssigneeSelector::from),
    };

    let task = state.db.call(move |db| db.update_task(id, &update)).await?;
    let view = task_view(task, state.clock.today());
    broadcast_message(&state.ws_tx, &WsMessage::TaskUpdated { task: view.clone() });
    Ok(Json(view))
}

async fn delete_task(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    if state.db.call(move |db| db.delete_task(id)).await? {
        broadcast_message(&state.ws_tx, &WsMessage::TaskDeleted { task_id: id });
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TrackerError::TaskNotFound { id }.into())
    }
}

async fn due_tasks(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let today = state.clock.today();
    let groups = state.db.call(move |db| db.due_tasks(today)).await?;
    Ok(Json(groups))
}

// ── Handlers: assignees ───────────────────────────────────────────────

async fn list_assignees(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.call(|db| db.list_assignees()).await?))
}

async fn create_assignee(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let name = required(&req.name, "name")?;
    let assignee = state.db.call(move |db| db.create_assignee(&name)).await?;
    Ok((StatusCode::CREATED, Json(assignee)))
}

async fn get_assignee(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.call(move |db| db.get_assignee(id)).await? {
        Some(assignee) => Ok(Json(assignee)),
        None => Err(TrackerError::AssigneeNotFound(id.to_string()).into()),
    }
}

async fn rename_assignee(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    let name = required(&req.name, "name")?;
    let assignee = state.db.call(move |db| db.rename_assignee(id, &name)).await?;
    Ok(Json(assignee))
}

async fn delete_assignee(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_editor()?;
    if state.db.call(move |db| db.delete_assignee(id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TrackerError::AssigneeNotFound(id.to_string()).into())
    }
}

// ── Handlers: user administration ─────────────────────────────────────

async fn list_users(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_admin()?;
    Ok(Json(state.db.call(|db| db.list_users()).await?))
}

async fn create_user(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_admin()?;
    let username = required(&req.username, "username")?;
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }
    let role = match req.role.as_deref() {
        Some(r) => r.parse::<Role>().map_err(ApiError::BadRequest)?,
        None => Role::default(),
    };
    let name = req.name.unwrap_or_else(|| username.clone());
    let hash = auth::hash_password_blocking(req.password).await?;

    let created = state
        .db
        .call(move |db| db.create_user(&username, &name, role, &hash))
        .await?;
    tracing::info!(username = %created.username, role = %created.role, by = %user.username, "user created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_user(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_admin()?;
    let role = match req.role.as_deref() {
        Some(r) => Some(r.parse::<Role>().map_err(ApiError::BadRequest)?),
        None => None,
    };
    let name = req.name;
    let hash = match req.password {
        Some(p) if p.is_empty() => {
            return Err(ApiError::BadRequest("password must not be empty".to_string()));
        }
        Some(p) => Some(auth::hash_password_blocking(p).await?),
        None => None,
    };

    let updated = state
        .db
        .call(move |db| {
            let updated = db.update_user(id, name.as_deref(), role)?;
            if let Some(hash) = hash {
                db.set_password_hash(&updated.username, &hash)?;
            }
            Ok(updated)
        })
        .await?;
    Ok(Json(updated))
}

async fn delete_user(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_admin()?;
    if id == user.id {
        return Err(ApiError::BadRequest("Cannot delete your own account".to_string()));
    }
    if state.db.call(move |db| db.delete_user(id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TrackerError::UserNotFound(id.to_string()).into())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::FixedClock;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    struct TestApp {
        router: Router,
        ws_tx: broadcast::Sender<String>,
        admin: String,
        manager: String,
        viewer: String,
    }

    fn test_app() -> TestApp {
        let db = TrackerDb::new_in_memory().unwrap();
        let admin = db
            .create_user("admin", "Admin", Role::Admin, &auth::hash_password("admin123").unwrap())
            .unwrap();
        let manager = db
            .create_user("manager", "Manager", Role::Manager, &auth::hash_password("pw").unwrap())
            .unwrap();
        let viewer = db
            .create_user("viewer", "Viewer", Role::Viewer, &auth::hash_password("pw").unwrap())
            .unwrap();
        let (ws_tx, _) = broadcast::channel(64);
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
            ws_tx: ws_tx.clone(),
            clock: Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())),
            secret: SECRET.to_string(),
        });
        TestApp {
            router: api_router(state.clone()).with_state(state),
            ws_tx,
            admin: auth::issue_token(SECRET, admin.id).unwrap(),
            manager: auth::issue_token(SECRET, manager.id).unwrap(),
            viewer: auth::issue_token(SECRET, viewer.id).unwrap(),
        }
    }

    async fn send(
        app: &TestApp,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create_project(app: &TestApp, body: Value) -> Value {
        let (status, project) = send(app, "POST", "/api/projects", Some(&app.admin), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        project
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");

        let (status, body) = send(&app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_missing_token_is_401_bad_token_is_403() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/projects", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Access token required");

        let (status, _) = send(&app, "GET", "/api/projects", Some("1.forged"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Valid signature for a user that does not exist
        let ghost = auth::issue_token(SECRET, 999).unwrap();
        let (status, _) = send(&app, "GET", "/api/projects", Some(&ghost), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_login_and_me() {
        let app = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({"username": "admin", "password": "admin123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "admin");
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(token, app.admin);

        let (status, me) = send(&app, "GET", "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "admin");

        let (status, _) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({"username": "admin", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({"username": "nobody", "password": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_project_seeds_default_stages() {
        let app = test_app();
        let project = create_project(&app, json!({"name": "Flat 4B"})).await;
        assert_eq!(project["name"], "Flat 4B");
        assert_eq!(project["status"], "Not Started");
        assert_eq!(project["start_date"], "2024-03-10");
        assert_eq!(project["days_running"], 0);
        assert_eq!(project["age"], "new");
        let id = project["id"].as_i64().unwrap();

        let (status, stages) = send(&app, "GET", &format!("/api/projects/{}/stages", id), Some(&app.viewer), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stages.as_array().unwrap().len(), DEFAULT_STAGES.len());
    }

    #[tokio::test]
    async fn test_project_age_follows_clock() {
        let app = test_app();
        let started = create_project(&app, json!({"name": "Old job", "start_date": "2024-02-09"})).await;
        assert_eq!(started["days_running"], 30);
        assert_eq!(started["age"], "month");

        let planned = create_project(&app, json!({"name": "Next job", "start_date": "2024-04-01"})).await;
        assert_eq!(planned["days_running"], 0);
        assert_eq!(planned["age"], "new");

        let (_, listed) = send(&app, "GET", "/api/projects", Some(&app.viewer), None).await;
        let ages: Vec<i64> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["days_running"].as_i64().unwrap())
            .collect();
        assert!(ages.contains(&30) && ages.contains(&0));
    }

    #[tokio::test]
    async fn test_create_project_validation() {
        let app = test_app();
        let (status, _) = send(&app, "POST", "/api/projects", Some(&app.admin), Some(json!({"name": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/api/projects",
            Some(&app.admin),
            Some(json!({"name": "x", "start_date": "2024-02-30"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("2024-02-30"));

        let (status, _) = send(
            &app,
            "POST",
            "/api/projects",
            Some(&app.admin),
            Some(json!({"name": "x", "clone_from": 77})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_viewer_cannot_write() {
        let app = test_app();
        let (status, body) = send(&app, "POST", "/api/projects", Some(&app.viewer), Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Manager or admin access required");

        let (status, _) = send(&app, "GET", "/api/projects", Some(&app.viewer), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_archive_requires_admin_and_filters() {
        let app = test_app();
        let project = create_project(&app, json!({"name": "Old job", "default_stages": false})).await;
        create_project(&app, json!({"name": "New job", "default_stages": false})).await;
        let uri = format!("/api/projects/{}/archive", project["id"]);

        let (status, _) = send(&app, "PUT", &uri, Some(&app.manager), Some(json!({"archived": true}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "PUT", &uri, Some(&app.admin), Some(json!({"archived": true}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["archived"], true);

        let (_, active) = send(&app, "GET", "/api/projects?archived=false", Some(&app.viewer), None).await;
        let names: Vec<_> = active.as_array().unwrap().iter().map(|p| p["name"].clone()).collect();
        assert_eq!(names, vec![json!("New job")]);

        let (_, archived) = send(&app, "GET", "/api/projects?archived=true", Some(&app.viewer), None).await;
        assert_eq!(archived.as_array().unwrap().len(), 1);

        let (_, all) = send(&app, "GET", "/api/projects", Some(&app.viewer), None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unit_updates_recompute_project_status() {
        let app = test_app();
        let mut rx = app.ws_tx.subscribe();
        let project = create_project(&app, json!({"name": "Rooms", "default_stages": false})).await;
        let _ = rx.recv().await.unwrap();
        let pid = project["id"].as_i64().unwrap();

        let (status, unit) = send(
            &app,
            "POST",
            &format!("/api/projects/{}/units", pid),
            Some(&app.manager),
            Some(json!({"name": "Kitchen", "status": "Blocked"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let msg: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "UnitUpdated");
        assert_eq!(msg["data"]["project_status"], "Blocked");

        let uri = format!("/api/units/{}", unit["id"]);
        let (status, _) = send(&app, "PUT", &uri, Some(&app.manager), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "PUT", &uri, Some(&app.manager), Some(json!({"status": "Paused"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, updated) = send(
            &app,
            "PUT",
            &uri,
            Some(&app.manager),
            Some(json!({"status": "In Progress", "comment": "waiting on tiles"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["comment"], "waiting on tiles");
        let msg: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["data"]["project_status"], "Running");

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("{}/status", uri),
            Some(&app.manager),
            Some(json!({"status": "Completed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, project) = send(&app, "GET", &format!("/api/projects/{}", pid), Some(&app.viewer), None).await;
        assert_eq!(project["status"], "Completed");

        let (status, _) = send(&app, "DELETE", &uri, Some(&app.manager), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &uri, Some(&app.manager), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unit_dates() {
        let app = test_app();
        let project = create_project(&app, json!({"name": "Dates", "default_stages": false})).await;
        let (_, unit) = send(
            &app,
            "POST",
            &format!("/api/projects/{}/units", project["id"]),
            Some(&app.admin),
            Some(json!({"name": "Hall"})),
        )
        .await;
        assert_eq!(unit["status"], "Not Started");

        let uri = format!("/api/units/{}/dates", unit["id"]);
        let (status, body) = send(
            &app,
            "PUT",
            &uri,
            Some(&app.admin),
            Some(json!({"start_date": "2024-03-01T00:00:00.000Z", "end_date": "2024-03-20"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["start_date"], "2024-03-01");
        assert_eq!(body["end_date"], "2024-03-20");

        let (status, _) = send(&app, "PUT", &uri, Some(&app.admin), Some(json!({"start_date": "soon"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_board_projection_end_to_end() {
        let app = test_app();
        let project = create_project(&app, json!({"name": "Board", "default_stages": false})).await;
        let pid = project["id"].as_i64().unwrap();

        let (_, prep) = send(&app, "POST", &format!("/api/projects/{}/stages", pid), Some(&app.admin), Some(json!({"name": "Prep"}))).await;
        let (_, exec) = send(&app, "POST", &format!("/api/projects/{}/stages", pid), Some(&app.admin), Some(json!({"name": "Exec"}))).await;
        let add = |stage: &Value, title: &str, due: &str, status: &str| {
            (
                format!("/api/stages/{}/tasks", stage["id"]),
                json!({"title": title, "due_date": due, "status": status}),
            )
        };
        for (uri, body) in [
            add(&prep, "A", "2024-03-09", "pending"),
            add(&prep, "B", "2024-03-11", "pending"),
            add(&exec, "C", "2024-04-01", "pending"),
            add(&exec, "D", "2024-01-01", "completed"),
        ] {
            let (status, _) = send(&app, "POST", &uri, Some(&app.admin), Some(body)).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, board) = send(&app, "GET", &format!("/api/projects/{}/board", pid), Some(&app.viewer), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board["project"]["name"], "Board");
        let labels: Vec<_> = board["stages"]
            .as_array()
            .unwrap()
            .iter()
            .flat_map(|s| s["tasks"].as_array().unwrap().iter().map(|t| t["urgency"].clone()))
            .collect();
        assert_eq!(labels, vec![json!("overdue"), json!("due-soon"), json!("normal"), json!("completed")]);

        let (_, due) = send(&app, "GET", "/api/due-tasks", Some(&app.viewer), None).await;
        let groups = due.as_array().unwrap();
        assert_eq!(groups.len(), 1);
        let titles: Vec<_> = groups[0]["tasks"].as_array().unwrap().iter().map(|t| t["title"].clone()).collect();
        assert_eq!(titles, vec![json!("A"), json!("B")]);
    }

    #[tokio::test]
    async fn test_task_validation_and_assignees() {
        let app = test_app();
        let project = create_project(&app, json!({"name": "Tasks", "default_stages": false})).await;
        let (_, stage) = send(
            &app,
            "POST",
            &format!("/api/projects/{}/stages", project["id"]),
            Some(&app.admin),
            Some(json!({"name": "S"})),
        )
        .await;
        let tasks_uri = format!("/api/stages/{}/tasks", stage["id"]);

        let (status, _) = send(&app, "POST", &tasks_uri, Some(&app.admin), Some(json!({"title": "x", "due_date": "tomorrow"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "POST", &tasks_uri, Some(&app.admin), Some(json!({"title": "x", "due_date": "2024-03-12", "status": "done"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, sam) = send(&app, "POST", "/api/assignees", Some(&app.admin), Some(json!({"name": "Sam"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(&app, "POST", "/api/assignees", Some(&app.admin), Some(json!({"name": "Sam"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, task) = send(
            &app,
            "POST",
            &tasks_uri,
            Some(&app.admin),
            Some(json!({"title": "Fit doors", "due_date": "2024-03-12", "assigned_to": "Sam"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["assigned_to"], sam["id"]);
        assert_eq!(task["urgency"], "due-soon");

        let task_uri = format!("/api/tasks/{}", task["id"]);
        let (status, updated) = send(&app, "PUT", &task_uri, Some(&app.admin), Some(json!({"status": "completed"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["urgency"], "completed");
        assert_eq!(updated["assigned_to"], sam["id"]);

        let (_, updated) = send(&app, "PUT", &task_uri, Some(&app.admin), Some(json!({"assigned_to": null}))).await;
        assert_eq!(updated["assigned_to"], Value::Null);

        let (_, updated) = send(&app, "PUT", &task_uri, Some(&app.admin), Some(json!({"assigned_to": {"id": sam["id"], "name": "Sam"}}))).await;
        assert_eq!(updated["assigned_to"], sam["id"]);

        let (status, _) = send(&app, "PUT", &task_uri, Some(&app.admin), Some(json!({"assigned_to": "Nobody"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, all) = send(&app, "GET", "/api/tasks", Some(&app.viewer), None).await;
        assert_eq!(all.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "DELETE", &task_uri, Some(&app.admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &task_uri, Some(&app.admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rename_assignee_to_taken_name_conflicts() {
        let app = test_app();
        send(&app, "POST", "/api/assignees", Some(&app.admin), Some(json!({"name": "Sam"}))).await;
        let (_, kim) = send(&app, "POST", "/api/assignees", Some(&app.admin), Some(json!({"name": "Kim"}))).await;
        let uri = format!("/api/assignees/{}", kim["id"]);

        let (status, body) = send(&app, "PUT", &uri, Some(&app.admin), Some(json!({"name": "Sam"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("Sam"));

        let (status, renamed) = send(&app, "PUT", &uri, Some(&app.admin), Some(json!({"name": "Kimberly"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["name"], "Kimberly");
    }

    #[tokio::test]
    async fn test_stage_crud() {
        let app = test_app();
        let project = create_project(&app, json!({"name": "Stages", "default_stages": false})).await;
        let (_, stage) = send(
            &app,
            "POST",
            &format!("/api/projects/{}/stages", project["id"]),
            Some(&app.admin),
            Some(json!({"name": "Survey"})),
        )
        .await;
        let uri = format!("/api/stages/{}", stage["id"]);

        let (status, renamed) = send(&app, "PUT", &uri, Some(&app.manager), Some(json!({"name": "Site survey"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["name"], "Site survey");

        let (status, _) = send(&app, "DELETE", &uri, Some(&app.manager), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &uri, Some(&app.manager), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", "/api/projects/999/stages", Some(&app.manager), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_project_broadcasts() {
        let app = test_app();
        let mut rx = app.ws_tx.subscribe();
        let project = create_project(&app, json!({"name": "Gone"})).await;
        let created: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(created["type"], "ProjectCreated");

        let uri = format!("/api/projects/{}", project["id"]);
        let (status, _) = send(&app, "DELETE", &uri, Some(&app.admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let deleted: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(deleted["type"], "ProjectDeleted");
        assert_eq!(deleted["data"]["project_id"], project["id"]);

        let (status, _) = send(&app, "GET", &uri, Some(&app.admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_user_management() {
        let app = test_app();
        let (status, _) = send(&app, "GET", "/api/admin/users", Some(&app.manager), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, users) = send(&app, "GET", "/api/admin/users", Some(&app.admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(users.as_array().unwrap().len(), 3);

        let (status, created) = send(
            &app,
            "POST",
            "/api/admin/users",
            Some(&app.admin),
            Some(json!({"username": "sam", "password": "pw1", "role": "user"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "sam");
        assert!(created.get("password_hash").is_none());

        let (status, _) = send(
            &app,
            "POST",
            "/api/admin/users",
            Some(&app.admin),
            Some(json!({"username": "sam", "password": "pw1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            "/api/admin/users",
            Some(&app.admin),
            Some(json!({"username": "x", "password": "pw", "role": "root"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/admin/users/{}", created["id"]);
        let (status, updated) = send(&app, "PUT", &uri, Some(&app.admin), Some(json!({"role": "manager", "password": "pw2"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["role"], "manager");

        let (status, _) = send(&app, "POST", "/api/login", None, Some(json!({"username": "sam", "password": "pw2"}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "DELETE", &uri, Some(&app.admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", "/api/admin/users/1", Some(&app.admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_anyhow_errors_keep_their_status() {
        let not_found: anyhow::Error = TrackerError::TaskNotFound { id: 3 }.into();
        assert!(matches!(ApiError::from(not_found), ApiError::NotFound(_)));

        let invalid: anyhow::Error = StatusError::InvalidDate { value: "x".into() }.into();
        assert!(matches!(ApiError::from(invalid), ApiError::BadRequest(_)));

        let other = anyhow::anyhow!("disk on fire");
        assert!(matches!(ApiError::from(other), ApiError::Internal(_)));
    }
}
