//! Local user administration: `jobstatus user`.

use anyhow::{Result, anyhow};
use console::style;

use super::super::UserCommands;
use jobstatus::config::Config;
use jobstatus::tracker::auth::hash_password;
use jobstatus::tracker::models::Role;
use jobstatus::tracker::server::{ServerConfig, open_database};

pub fn cmd_user(config: &Config, command: UserCommands) -> Result<()> {
    let db = open_database(&ServerConfig::from(config))?;

    match command {
        UserCommands::Add {
            username,
            role,
            name,
            password,
        } => {
            let role: Role = role.parse().map_err(|e: String| anyhow!(e))?;
            if password.is_empty() {
                anyhow::bail!("Password must not be empty");
            }
            let name = name.unwrap_or_else(|| username.clone());
            let user = db.create_user(&username, &name, role, &hash_password(&password)?)?;
            println!("Created user {} ({})", user.username, user.role);
        }
        UserCommands::Passwd { username, password } => {
            if password.is_empty() {
                anyhow::bail!("Password must not be empty");
            }
            if !db.set_password_hash(&username, &hash_password(&password)?)? {
                anyhow::bail!("User '{}' not found", username);
            }
            println!("Password updated for {}", username);
        }
        UserCommands::List => {
            let users = db.list_users()?;
            if users.is_empty() {
                println!("No users. Create one with 'jobstatus user add'.");
                return Ok(());
            }
            for user in users {
                println!(
                    "{:>4}  {:<16} {:<8} {}",
                    user.id,
                    style(&user.username).bold(),
                    user.role,
                    user.name
                );
            }
        }
    }

    Ok(())
}
