//! jobstatus: projects, units, stages and dated tasks, with project health
//! and task urgency derived on every read.
//!
//! | Module    | Responsibility                                          |
//! |-----------|---------------------------------------------------------|
//! | `status`  | Pure derived-status engine (urgency, aggregation)       |
//! | `tracker` | SQLite storage, REST API, auth and WebSocket feed       |
//! | `config`  | `jobstatus.toml` + environment overrides                |
//! | `logging` | `tracing` subscriber setup                              |
//! | `errors`  | `StatusError` and `TrackerError`                        |
//! | `client`  | HTTP client used by the CLI's remote commands           |
//! | `session` | Saved CLI login                                         |

pub mod client;
pub mod config;
pub mod errors;
pub mod logging;
pub mod session;
pub mod status;
pub mod tracker;
