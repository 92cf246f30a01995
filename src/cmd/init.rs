//! Database setup command: `jobstatus init`.

use anyhow::Result;

use jobstatus::config::Config;
use jobstatus::errors::TrackerError;
use jobstatus::tracker::auth::hash_password;
use jobstatus::tracker::models::Role;
use jobstatus::tracker::server::{ServerConfig, open_database};

const DEMO_PASSWORD: &str = "admin123";

const DEMO_USERS: [(&str, &str, Role); 3] = [
    ("admin", "Admin User", Role::Admin),
    ("manager", "Project Manager", Role::Manager),
    ("user", "Regular User", Role::User),
];

const DEMO_ASSIGNEES: [&str; 3] = ["Site Supervisor", "Design Team", "Factory"];

pub fn cmd_init(config: &Config, seed: bool) -> Result<()> {
    let db = open_database(&ServerConfig::from(config))?;
    println!("Database initialized at {}", config.server.db_path.display());

    if !seed {
        return Ok(());
    }

    for (username, name, role) in DEMO_USERS {
        match db.create_user(username, name, role, &hash_password(DEMO_PASSWORD)?) {
            Ok(user) => println!("  created user {} ({})", user.username, user.role),
            Err(e) if matches!(e.downcast_ref::<TrackerError>(), Some(TrackerError::Conflict(_))) => {
                println!("  user {} already exists, skipped", username);
            }
            Err(e) => return Err(e),
        }
    }
    for name in DEMO_ASSIGNEES {
        match db.create_assignee(name) {
            Ok(assignee) => println!("  created assignee {}", assignee.name),
            Err(e) if matches!(e.downcast_ref::<TrackerError>(), Some(TrackerError::Conflict(_))) => {
                println!("  assignee {} already exists, skipped", name);
            }
            Err(e) => return Err(e),
        }
    }
    println!("Demo accounts use password '{}'. Change them before going live.", DEMO_PASSWORD);

    Ok(())
}
