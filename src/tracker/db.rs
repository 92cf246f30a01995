use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::models::*;
use crate::errors::TrackerError;
use crate::status::{
    AgeBand, ProjectStatus, TaskStatus, UnitStatus, aggregate_stored_units, classify_stored_task,
    format_calendar_date, needs_attention, parse_calendar_date, stored_project_age,
};

/// Async-safe handle to the tracker database.
///
/// Wraps `TrackerDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<TrackerDb>>,
}

impl DbHandle {
    pub fn new(db: TrackerDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&TrackerDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| TrackerError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Only for startup and tests.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, TrackerDb>> {
        Ok(self.inner.lock().map_err(|_| TrackerError::LockPoisoned)?)
    }
}

/// Where the stages of a new project come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSeed {
    Empty,
    Defaults,
    CloneFrom(i64),
}

/// Partial task update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<AssigneeSelector>,
}

const PROJECT_COLUMNS: &str = "id, name, description, start_date, archived, created_at";
const UNIT_COLUMNS: &str =
    "id, project_id, name, status, comment, start_date, end_date, created_at";
const TASK_COLUMNS: &str = "id, stage_id, title, due_date, status, assigned_to, created_at";
const USER_COLUMNS: &str = "id, username, name, role, created_at";

pub struct TrackerDb {
    conn: Connection,
}

impl TrackerDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL DEFAULT '',
                    role TEXT NOT NULL DEFAULT 'viewer',
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    start_date TEXT NOT NULL,
                    archived INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS units (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'Not Started',
                    comment TEXT NOT NULL DEFAULT '',
                    start_date TEXT,
                    end_date TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS stages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    position INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS assignees (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    stage_id INTEGER NOT NULL REFERENCES stages(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    due_date TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    assigned_to INTEGER REFERENCES assignees(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_units_project ON units(project_id);
                CREATE INDEX IF NOT EXISTS idx_stages_project ON stages(project_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_stage ON tasks(stage_id);
                ",
            )
            .context("Failed to create tables")?;

        // Additive migrations (safe to re-run).
        // We only ignore "duplicate column" errors; anything else is propagated.
        self.add_column_if_missing("projects", "description TEXT NOT NULL DEFAULT ''")?;

        Ok(())
    }

    fn add_column_if_missing(&self, table: &str, column_def: &str) -> Result<()> {
        let sql = format!("ALTER TABLE {} ADD COLUMN {}", table, column_def);
        match self.conn.execute(&sql, []) {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("duplicate column") => Ok(()),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to add column to {}: {}",
                table,
                e
            )),
        }
    }

    // ── Users ─────────────────────────────────────────────────────────

    pub fn create_user(
        &self,
        username: &str,
        name: &str,
        role: Role,
        password_hash: &str,
    ) -> Result<User> {
        if self.find_user_credentials(username)?.is_some() {
            return Err(TrackerError::Conflict(format!("User {}", username)).into());
        }
        self.conn
            .execute(
                "INSERT INTO users (username, name, role, password_hash) VALUES (?1, ?2, ?3, ?4)",
                params![username, name, role.as_str(), password_hash],
            )
            .context("Failed to insert user")?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)?.context("User not found after insert")
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        self.conn
            .query_row(&sql, params![id], user_from_row)
            .optional()
            .context("Failed to query user")
    }

    /// Look up a user and their stored password hash by username.
    pub fn find_user_credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE username = ?1",
            USER_COLUMNS
        );
        self.conn
            .query_row(&sql, params![username], |row| {
                Ok((user_from_row(row)?, row.get::<_, String>(5)?))
            })
            .optional()
            .context("Failed to query user credentials")
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_users")?;
        let rows = stmt
            .query_map([], user_from_row)
            .context("Failed to query users")?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row.context("Failed to read user row")?);
        }
        Ok(users)
    }

    pub fn update_user(&self, id: i64, name: Option<&str>, role: Option<Role>) -> Result<User> {
        if self.get_user(id)?.is_none() {
            return Err(TrackerError::UserNotFound(id.to_string()).into());
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(n) = name {
            tx.execute("UPDATE users SET name = ?1 WHERE id = ?2", params![n, id])
                .context("Failed to update user name")?;
        }
        if let Some(r) = role {
            tx.execute(
                "UPDATE users SET role = ?1 WHERE id = ?2",
                params![r.as_str(), id],
            )
            .context("Failed to update user role")?;
        }
        tx.commit().context("Failed to commit user update")?;
        self.get_user(id)?.context("User not found after update")
    }

    /// Replace a user's password hash. Returns false if no such user exists.
    pub fn set_password_hash(&self, username: &str, password_hash: &str) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE username = ?2",
                params![password_hash, username],
            )
            .context("Failed to update password")?;
        Ok(count > 0)
    }

    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .context("Failed to delete user")?;
        Ok(count > 0)
    }

    // ── Projects ──────────────────────────────────────────────────────

    pub fn create_project(
        &self,
        name: &str,
        description: &str,
        start_date: NaiveDate,
        seed: StageSeed,
    ) -> Result<Project> {
        let template: Vec<String> = match seed {
            StageSeed::Empty => Vec::new(),
            StageSeed::Defaults => DEFAULT_STAGES.iter().map(|s| s.to_string()).collect(),
            StageSeed::CloneFrom(source_id) => {
                if self.get_project(source_id)?.is_none() {
                    return Err(TrackerError::ProjectNotFound { id: source_id }.into());
                }
                self.list_stages(source_id)?
                    .into_iter()
                    .map(|s| s.name)
                    .collect()
            }
        };

        // The project and its stages land together or not at all.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO projects (name, description, start_date) VALUES (?1, ?2, ?3)",
            params![name, description, format_calendar_date(start_date)],
        )
        .context("Failed to insert project")?;
        let id = tx.last_insert_rowid();
        for (position, stage_name) in template.iter().enumerate() {
            tx.execute(
                "INSERT INTO stages (project_id, name, position) VALUES (?1, ?2, ?3)",
                params![id, stage_name, position as i32],
            )
            .context("Failed to insert seeded stage")?;
        }
        tx.commit().context("Failed to commit project creation")?;

        self.get_project(id)?.context("Project not found after insert")
    }

    /// List projects, newest first. `archived` filters when given.
    pub fn list_projects(&self, archived: Option<bool>) -> Result<Vec<Project>> {
        let mut projects = Vec::new();
        match archived {
            Some(flag) => {
                let sql = format!(
                    "SELECT {} FROM projects WHERE archived = ?1 ORDER BY id DESC",
                    PROJECT_COLUMNS
                );
                let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_projects")?;
                let rows = stmt
                    .query_map(params![flag as i64], project_from_row)
                    .context("Failed to query projects")?;
                for row in rows {
                    projects.push(row.context("Failed to read project row")?);
                }
            }
            None => {
                let sql = format!("SELECT {} FROM projects ORDER BY id DESC", PROJECT_COLUMNS);
                let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_projects")?;
                let rows = stmt
                    .query_map([], project_from_row)
                    .context("Failed to query projects")?;
                for row in rows {
                    projects.push(row.context("Failed to read project row")?);
                }
            }
        }
        Ok(projects)
    }

    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let sql = format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS);
        self.conn
            .query_row(&sql, params![id], project_from_row)
            .optional()
            .context("Failed to query project")
    }

    fn require_project(&self, id: i64) -> Result<Project> {
        self.get_project(id)?
            .ok_or_else(|| TrackerError::ProjectNotFound { id }.into())
    }

    pub fn update_project(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
        start_date: Option<NaiveDate>,
    ) -> Result<Project> {
        self.require_project(id)?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(n) = name {
            tx.execute("UPDATE projects SET name = ?1 WHERE id = ?2", params![n, id])
                .context("Failed to update project name")?;
        }
        if let Some(d) = description {
            tx.execute(
                "UPDATE projects SET description = ?1 WHERE id = ?2",
                params![d, id],
            )
            .context("Failed to update project description")?;
        }
        if let Some(date) = start_date {
            tx.execute(
                "UPDATE projects SET start_date = ?1 WHERE id = ?2",
                params![format_calendar_date(date), id],
            )
            .context("Failed to update project start date")?;
        }
        tx.commit().context("Failed to commit project update")?;
        self.require_project(id)
    }

    pub fn set_project_archived(&self, id: i64, archived: bool) -> Result<Project> {
        let count = self
            .conn
            .execute(
                "UPDATE projects SET archived = ?1 WHERE id = ?2",
                params![archived as i64, id],
            )
            .context("Failed to update project archive flag")?;
        if count == 0 {
            return Err(TrackerError::ProjectNotFound { id }.into());
        }
        self.require_project(id)
    }

    /// Delete a project; units, stages and tasks go with it.
    pub fn delete_project(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])
            .context("Failed to delete project")?;
        Ok(count > 0)
    }

    /// Attach units and derive the project status from them.
    /// Attach units and the values derived from them for `today`.
    pub fn with_units(&self, project: Project, today: NaiveDate) -> Result<ProjectWithUnits> {
        let units = self.list_units(project.id)?;
        let status =
            aggregate_stored_units(&units.iter().map(|u| u.status.as_str()).collect::<Vec<_>>());
        let days_running = stored_project_age(&project.start_date, today);
        Ok(ProjectWithUnits {
            project,
            status,
            days_running,
            age: AgeBand::from_days(days_running),
            units,
        })
    }

    pub fn list_projects_with_units(
        &self,
        archived: Option<bool>,
        today: NaiveDate,
    ) -> Result<Vec<ProjectWithUnits>> {
        self.list_projects(archived)?
            .into_iter()
            .map(|p| self.with_units(p, today))
            .collect()
    }

    pub fn get_project_with_units(&self, id: i64, today: NaiveDate) -> Result<Option<ProjectWithUnits>> {
        match self.get_project(id)? {
            Some(project) => Ok(Some(self.with_units(project, today)?)),
            None => Ok(None),
        }
    }

    /// Current derived status of one project.
    pub fn project_status(&self, project_id: i64) -> Result<ProjectStatus> {
        let units = self.list_units(project_id)?;
        Ok(aggregate_stored_units(
            &units.iter().map(|u| u.status.as_str()).collect::<Vec<_>>(),
        ))
    }

    // ── Units ─────────────────────────────────────────────────────────

    pub fn create_unit(
        &self,
        project_id: i64,
        name: &str,
        status: UnitStatus,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Unit> {
        self.require_project(project_id)?;
        self.conn
            .execute(
                "INSERT INTO units (project_id, name, status, start_date, end_date) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    project_id,
                    name,
                    status.as_str(),
                    start_date.map(format_calendar_date),
                    end_date.map(format_calendar_date),
                ],
            )
            .context("Failed to insert unit")?;
        let id = self.conn.last_insert_rowid();
        self.get_unit(id)?.context("Unit not found after insert")
    }

    pub fn list_units(&self, project_id: i64) -> Result<Vec<Unit>> {
        let sql = format!(
            "SELECT {} FROM units WHERE project_id = ?1 ORDER BY created_at, id",
            UNIT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_units")?;
        let rows = stmt
            .query_map(params![project_id], unit_from_row)
            .context("Failed to query units")?;
        let mut units = Vec::new();
        for row in rows {
            units.push(row.context("Failed to read unit row")?);
        }
        Ok(units)
    }

    pub fn get_unit(&self, id: i64) -> Result<Option<Unit>> {
        let sql = format!("SELECT {} FROM units WHERE id = ?1", UNIT_COLUMNS);
        self.conn
            .query_row(&sql, params![id], unit_from_row)
            .optional()
            .context("Failed to query unit")
    }

    fn require_unit(&self, id: i64) -> Result<Unit> {
        self.get_unit(id)?
            .ok_or_else(|| TrackerError::UnitNotFound { id }.into())
    }

    pub fn update_unit(
        &self,
        id: i64,
        status: Option<UnitStatus>,
        comment: Option<&str>,
    ) -> Result<Unit> {
        self.require_unit(id)?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(s) = status {
            tx.execute(
                "UPDATE units SET status = ?1 WHERE id = ?2",
                params![s.as_str(), id],
            )
            .context("Failed to update unit status")?;
        }
        if let Some(c) = comment {
            tx.execute("UPDATE units SET comment = ?1 WHERE id = ?2", params![c, id])
                .context("Failed to update unit comment")?;
        }
        tx.commit().context("Failed to commit unit update")?;
        self.require_unit(id)
    }

    pub fn update_unit_dates(
        &self,
        id: i64,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Unit> {
        let count = self
            .conn
            .execute(
                "UPDATE units SET start_date = ?1, end_date = ?2 WHERE id = ?3",
                params![
                    start_date.map(format_calendar_date),
                    end_date.map(format_calendar_date),
                    id
                ],
            )
            .context("Failed to update unit dates")?;
        if count == 0 {
            return Err(TrackerError::UnitNotFound { id }.into());
        }
        self.require_unit(id)
    }

    /// Delete a unit, returning it so callers can recompute its project.
    pub fn delete_unit(&self, id: i64) -> Result<Option<Unit>> {
        let Some(unit) = self.get_unit(id)? else {
            return Ok(None);
        };
        self.conn
            .execute("DELETE FROM units WHERE id = ?1", params![id])
            .context("Failed to delete unit")?;
        Ok(Some(unit))
    }

    // ── Stages ────────────────────────────────────────────────────────

    pub fn create_stage(&self, project_id: i64, name: &str) -> Result<Stage> {
        self.require_project(project_id)?;
        let max_pos: i32 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(position), -1) FROM stages WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .context("Failed to get max stage position")?;
        self.conn
            .execute(
                "INSERT INTO stages (project_id, name, position) VALUES (?1, ?2, ?3)",
                params![project_id, name, max_pos + 1],
            )
            .context("Failed to insert stage")?;
        let id = self.conn.last_insert_rowid();
        self.get_stage(id)?.context("Stage not found after insert")
    }

    pub fn list_stages(&self, project_id: i64) -> Result<Vec<Stage>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, name, position FROM stages WHERE project_id = ?1 ORDER BY position, id",
            )
            .context("Failed to prepare list_stages")?;
        let rows = stmt
            .query_map(params![project_id], stage_from_row)
            .context("Failed to query stages")?;
        let mut stages = Vec::new();
        for row in rows {
            stages.push(row.context("Failed to read stage row")?);
        }
        Ok(stages)
    }

    pub fn get_stage(&self, id: i64) -> Result<Option<Stage>> {
        self.conn
            .query_row(
                "SELECT id, project_id, name, position FROM stages WHERE id = ?1",
                params![id],
                stage_from_row,
            )
            .optional()
            .context("Failed to query stage")
    }

    pub fn rename_stage(&self, id: i64, name: &str) -> Result<Stage> {
        let count = self
            .conn
            .execute("UPDATE stages SET name = ?1 WHERE id = ?2", params![name, id])
            .context("Failed to rename stage")?;
        if count == 0 {
            return Err(TrackerError::StageNotFound { id }.into());
        }
        self.get_stage(id)?.context("Stage not found after rename")
    }

    pub fn delete_stage(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM stages WHERE id = ?1", params![id])
            .context("Failed to delete stage")?;
        Ok(count > 0)
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    /// Resolve a normalised assignee reference to a stored assignee id.
    pub fn resolve_assignee(&self, selector: &AssigneeSelector) -> Result<Option<i64>> {
        match selector {
            AssigneeSelector::Unassigned => Ok(None),
            AssigneeSelector::Id(id) => match self.get_assignee(*id)? {
                Some(a) => Ok(Some(a.id)),
                None => Err(TrackerError::AssigneeNotFound(id.to_string()).into()),
            },
            AssigneeSelector::Name(name) => {
                let found: Option<i64> = self
                    .conn
                    .query_row(
                        "SELECT id FROM assignees WHERE name = ?1",
                        params![name],
                        |row| row.get(0),
                    )
                    .optional()
                    .context("Failed to query assignee by name")?;
                found
                    .map(Some)
                    .ok_or_else(|| TrackerError::AssigneeNotFound(name.clone()).into())
            }
        }
    }

    pub fn create_task(
        &self,
        stage_id: i64,
        title: &str,
        due_date: NaiveDate,
        status: TaskStatus,
        assignee: &AssigneeSelector,
    ) -> Result<Task> {
        if self.get_stage(stage_id)?.is_none() {
            return Err(TrackerError::StageNotFound { id: stage_id }.into());
        }
        let assigned_to = self.resolve_assignee(assignee)?;
        self.conn
            .execute(
                "INSERT INTO tasks (stage_id, title, due_date, status, assigned_to) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    stage_id,
                    title,
                    format_calendar_date(due_date),
                    status.as_str(),
                    assigned_to
                ],
            )
            .context("Failed to insert task")?;
        let id = self.conn.last_insert_rowid();
        self.get_task(id)?.context("Task not found after insert")
    }

    pub fn list_tasks(&self, stage_id: i64) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE stage_id = ?1 ORDER BY id",
            TASK_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_tasks")?;
        let rows = stmt
            .query_map(params![stage_id], task_from_row)
            .context("Failed to query tasks")?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.context("Failed to read task row")?);
        }
        Ok(tasks)
    }

    pub fn list_all_tasks(&self) -> Result<Vec<Task>> {
        let sql = format!("SELECT {} FROM tasks ORDER BY id", TASK_COLUMNS);
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_all_tasks")?;
        let rows = stmt
            .query_map([], task_from_row)
            .context("Failed to query tasks")?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.context("Failed to read task row")?);
        }
        Ok(tasks)
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        self.conn
            .query_row(&sql, params![id], task_from_row)
            .optional()
            .context("Failed to query task")
    }

    pub fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<Task> {
        if self.get_task(id)?.is_none() {
            return Err(TrackerError::TaskNotFound { id }.into());
        }
        let assigned_to = match &update.assigned_to {
            Some(selector) => Some(self.resolve_assignee(selector)?),
            None => None,
        };

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(t) = &update.title {
            tx.execute("UPDATE tasks SET title = ?1 WHERE id = ?2", params![t, id])
                .context("Failed to update task title")?;
        }
        if let Some(d) = update.due_date {
            tx.execute(
                "UPDATE tasks SET due_date = ?1 WHERE id = ?2",
                params![format_calendar_date(d), id],
            )
            .context("Failed to update task due date")?;
        }
        if let Some(s) = update.status {
            tx.execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2",
                params![s.as_str(), id],
            )
            .context("Failed to update task status")?;
        }
        if let Some(a) = assigned_to {
            tx.execute(
                "UPDATE tasks SET assigned_to = ?1 WHERE id = ?2",
                params![a, id],
            )
            .context("Failed to update task assignee")?;
        }
        tx.commit().context("Failed to commit task update")?;
        self.get_task(id)?.context("Task not found after update")
    }

    pub fn delete_task(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .context("Failed to delete task")?;
        Ok(count > 0)
    }

    // ── Board view ────────────────────────────────────────────────────

    /// Full projection of a project. Every derived value is computed here,
    /// for `today`, and nothing is written back.
    pub fn get_board(&self, project_id: i64, today: NaiveDate) -> Result<BoardView> {
        let project = self.with_units(self.require_project(project_id)?, today)?;
        let mut stages = Vec::new();
        for stage in self.list_stages(project_id)? {
            let tasks = self
                .list_tasks(stage.id)?
                .into_iter()
                .map(|task| task_view(task, today))
                .collect();
            stages.push(StageWithTasks { stage, tasks });
        }
        Ok(BoardView { project, stages })
    }

    /// Open tasks that are overdue or due soon, grouped by active project.
    pub fn due_tasks(&self, today: NaiveDate) -> Result<Vec<DueTaskGroup>> {
        let mut groups: Vec<DueTaskGroup> = Vec::new();
        for project in self.list_projects(Some(false))? {
            let mut tasks = Vec::new();
            for stage in self.list_stages(project.id)? {
                for task in self.list_tasks(stage.id)? {
                    let (Ok(status), Ok(due)) = (
                        task.status.parse::<TaskStatus>(),
                        parse_calendar_date(&task.due_date),
                    ) else {
                        continue;
                    };
                    if needs_attention(status, due, today) {
                        tasks.push(task_view(task, today));
                    }
                }
            }
            if !tasks.is_empty() {
                groups.push(DueTaskGroup {
                    project_id: project.id,
                    project_name: project.name,
                    tasks,
                });
            }
        }
        Ok(groups)
    }

    // ── Assignees ─────────────────────────────────────────────────────

    pub fn create_assignee(&self, name: &str) -> Result<Assignee> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM assignees WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .context("Failed to check assignee")?;
        if exists {
            return Err(TrackerError::Conflict(format!("Assignee {}", name)).into());
        }
        self.conn
            .execute("INSERT INTO assignees (name) VALUES (?1)", params![name])
            .context("Failed to insert assignee")?;
        Ok(Assignee {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn list_assignees(&self) -> Result<Vec<Assignee>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM assignees ORDER BY name")
            .context("Failed to prepare list_assignees")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Assignee {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .context("Failed to query assignees")?;
        let mut assignees = Vec::new();
        for row in rows {
            assignees.push(row.context("Failed to read assignee row")?);
        }
        Ok(assignees)
    }

    pub fn get_assignee(&self, id: i64) -> Result<Option<Assignee>> {
        self.conn
            .query_row(
                "SELECT id, name FROM assignees WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Assignee {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to query assignee")
    }

    pub fn rename_assignee(&self, id: i64, name: &str) -> Result<Assignee> {
        let taken: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM assignees WHERE name = ?1 AND id != ?2",
                params![name, id],
                |row| row.get(0),
            )
            .context("Failed to check assignee")?;
        if taken {
            return Err(TrackerError::Conflict(format!("Assignee {}", name)).into());
        }
        let count = self
            .conn
            .execute("UPDATE assignees SET name = ?1 WHERE id = ?2", params![name, id])
            .context("Failed to rename assignee")?;
        if count == 0 {
            return Err(TrackerError::AssigneeNotFound(id.to_string()).into());
        }
        self.get_assignee(id)?
            .context("Assignee not found after rename")
    }

    /// Delete an assignee; their tasks become unassigned.
    pub fn delete_assignee(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM assignees WHERE id = ?1", params![id])
            .context("Failed to delete assignee")?;
        Ok(count > 0)
    }
}

// ── Row helpers ───────────────────────────────────────────────────────

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        start_date: row.get(3)?,
        archived: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
    })
}

fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<Unit> {
    Ok(Unit {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        status: row.get(3)?,
        comment: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn stage_from_row(row: &Row<'_>) -> rusqlite::Result<Stage> {
    Ok(Stage {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        position: row.get(3)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        stage_id: row.get(1)?,
        title: row.get(2)?,
        due_date: row.get(3)?,
        status: row.get(4)?,
        assigned_to: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Roles outside the known set read back as `Viewer`, the least privileged.
fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        role: role.parse().unwrap_or_default(),
        created_at: row.get(4)?,
    })
}

/// Pair a task with its urgency for `today`.
pub fn task_view(task: Task, today: NaiveDate) -> TaskView {
    let urgency = classify_stored_task(&task.status, &task.due_date, today);
    TaskView { task, urgency }
}

// ── Tests ─────────────────────────────────────────────────────────────
