//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                              |
//! |-----------|-----------------------------------------------|
//! | `serve`   | `Serve`                                       |
//! | `init`    | `Init`                                        |
//! | `user`    | `User`                                        |
//! | `config`  | `Config`                                      |
//! | `client`  | `Login`, `Logout`, `Projects`, `Due`          |

pub mod client;
pub mod config;
pub mod init;
pub mod serve;
pub mod user;

pub use client::{cmd_due, cmd_login, cmd_logout, cmd_projects, session_path};
pub use config::cmd_config;
pub use init::cmd_init;
pub use serve::cmd_serve;
pub use user::cmd_user;
