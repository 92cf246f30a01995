//! Job tracker back-end: projects, units, stages and tasks over REST.
//!
//! ## Overview
//!
//! Projects are broken into units (rooms, floors, work packages) and into
//! stages holding dated tasks. Nothing derived is stored: each read asks the
//! `status` engine for the project status and every task's urgency, using
//! "today" from the server's `Clock`. Every mutation is pushed to connected
//! clients over a WebSocket change feed.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig, CORS)    │
//! │          │ <─────── │    ├─ auth.rs  (bearer middleware, AuthUser)     │
//! └──────────┘ WebSocket│    └─ api.rs   (route handlers, AppState)        │
//!                       │         │                                        │
//!                       │         │ DbHandle::call()                       │
//!                       │         v                                        │
//!                       │  db.rs  (TrackerDb over rusqlite)                │
//!                       │         │                                        │
//!                       │         │ aggregate_stored_units()               │
//!                       │         │ classify_stored_task()                 │
//!                       │         v                                        │
//!                       │  crate::status  (pure derived-status engine)     │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module   | Responsibility                                            |
//! |----------|-----------------------------------------------------------|
//! | `models` | Shared types: `Project`, `Unit`, `Task`, `Role`, views    |
//! | `db`     | SQLite access via `DbHandle` (thin `Arc<Mutex<_>>`)       |
//! | `ws`     | `WsMessage` enum + `broadcast_message()` helper           |
//! | `auth`   | bcrypt password hashes, HMAC tokens, role guards          |
//!
//! ## Typical Request Flow (unit marked "In Progress")
//!
//! 1. `PATCH /api/units/{id}/status` passes `auth::require_auth`, which
//!    resolves the bearer token to an `AuthUser`.
//! 2. The handler checks `AuthUser::require_editor()` and parses the status
//!    string into `UnitStatus`; unknown values are a 400.
//! 3. `TrackerDb::update_unit()` writes the row, then `project_status()`
//!    re-aggregates the project's units.
//! 4. `WsMessage::UnitUpdated` with the fresh project status is broadcast.

pub mod api;
pub mod auth;
pub mod db;
pub mod models;
pub mod server;
pub mod ws;
