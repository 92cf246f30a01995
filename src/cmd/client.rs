//! Client commands against a running server: `jobstatus login|logout|projects|due`.

use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};

use jobstatus::client::TrackerClient;
use jobstatus::session::Session;
use jobstatus::status::{ProjectStatus, UrgencyLabel};

pub fn session_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Session::default_path(),
    }
}

fn require_session(path: &Path) -> Result<Session> {
    Session::load(path)?.context("Not logged in. Run 'jobstatus login' first.")
}

pub async fn cmd_login(session_path: &Path, server: &str, username: &str, password: &str) -> Result<()> {
    let login = TrackerClient::new(server).login(username, password).await?;
    let session = Session {
        server: server.trim_end_matches('/').to_string(),
        token: login.token,
        username: login.username,
        role: login.role,
    };
    session.save(session_path)?;
    println!(
        "Logged in to {} as {} ({})",
        session.server,
        style(&session.username).bold(),
        session.role
    );
    Ok(())
}

pub fn cmd_logout(session_path: &Path) -> Result<()> {
    if Session::clear(session_path)? {
        println!("Logged out.");
    } else {
        println!("No saved session.");
    }
    Ok(())
}

fn styled_status(status: ProjectStatus) -> console::StyledObject<&'static str> {
    let text = status.as_str();
    match status {
        ProjectStatus::Running => style(text).cyan(),
        ProjectStatus::Completed => style(text).green(),
        ProjectStatus::Blocked => style(text).red().bold(),
        ProjectStatus::NotStarted => style(text).dim(),
    }
}

fn styled_urgency(urgency: UrgencyLabel) -> console::StyledObject<&'static str> {
    let text = urgency.as_str();
    match urgency {
        UrgencyLabel::Overdue => style(text).red().bold(),
        UrgencyLabel::DueSoon => style(text).yellow(),
        UrgencyLabel::Completed => style(text).green(),
        UrgencyLabel::Normal => style(text),
    }
}

pub async fn cmd_projects(session_path: &Path, archived: bool) -> Result<()> {
    let session = require_session(session_path)?;
    let client = TrackerClient::new(&session.server).with_token(&session.token);
    let projects = client.projects(Some(archived)).await?;

    if projects.is_empty() {
        println!("No {} projects.", if archived { "archived" } else { "active" });
        return Ok(());
    }
    for view in projects {
        println!(
            "{:>4}  {:<32} {:<12} {:>5}  {} unit(s)",
            view.project.id,
            view.project.name,
            styled_status(view.status),
            format!("{}d", view.days_running),
            view.units.len()
        );
    }
    Ok(())
}

pub async fn cmd_due(session_path: &Path) -> Result<()> {
    let session = require_session(session_path)?;
    let client = TrackerClient::new(&session.server).with_token(&session.token);
    let groups = client.due_tasks().await?;

    if groups.is_empty() {
        println!("Nothing overdue or due soon.");
        return Ok(());
    }
    for group in groups {
        println!("{}", style(&group.project_name).bold());
        for view in group.tasks {
            println!(
                "  {:<10} {:<10} {}",
                view.task.due_date,
                styled_urgency(view.urgency),
                view.task.title
            );
        }
    }
    Ok(())
}
