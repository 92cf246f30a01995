use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::status::{AgeBand, ProjectStatus, UrgencyLabel};

/// Stage names seeded into a new project when no template is cloned.
pub const DEFAULT_STAGES: [&str; 8] = [
    "Stage 1 Initiation",
    "Stage 2 Preparation",
    "Stage 3 Vendor Works",
    "Stage 4 Final Order",
    "Stage 5 Cutlist to Factory",
    "Stage 6 Factory Delivery",
    "Stage 7 Execution",
    "Stage 8 Handover",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
    #[default]
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::User => "user",
            Self::Viewer => "viewer",
        }
    }

    /// Admins and managers may change board content.
    pub fn can_edit(&self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "user" => Ok(Self::User),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub start_date: String,
    pub archived: bool,
    pub created_at: String,
}

/// A project unit. `status` holds the stored string; it is validated on
/// write but read back verbatim so one bad row cannot fail a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub status: String,
    pub comment: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub created_at: String,
}

/// A project together with its units and the status derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectWithUnits {
    #[serde(flatten)]
    pub project: Project,
    pub status: ProjectStatus,
    /// Whole days since `start_date` as of the read, never negative.
    pub days_running: i64,
    pub age: AgeBand,
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub stage_id: i64,
    pub title: String,
    pub due_date: String,
    pub status: String,
    pub assigned_to: Option<i64>,
    pub created_at: String,
}

/// A task with its urgency computed for the current day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub urgency: UrgencyLabel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageWithTasks {
    #[serde(flatten)]
    pub stage: Stage,
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub project: ProjectWithUnits,
    pub stages: Vec<StageWithTasks>,
}

/// Tasks needing attention within one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueTaskGroup {
    pub project_id: i64,
    pub project_name: String,
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub id: i64,
    pub name: String,
}

/// Any of the shapes clients send for a task assignee: a numeric id, a
/// plain name (or the `"unassigned"` sentinel), or a full `{id, name}`
/// record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssigneeRef {
    Id(i64),
    Record { id: i64, name: String },
    Name(String),
}

/// Normalised assignee reference, resolved against storage by the db layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeSelector {
    Unassigned,
    Id(i64),
    Name(String),
}

impl AssigneeRef {
    pub fn normalize(self) -> AssigneeSelector {
        match self {
            AssigneeRef::Id(id) | AssigneeRef::Record { id, .. } => AssigneeSelector::Id(id),
            AssigneeRef::Name(raw) => {
                let name = raw.trim();
                if name.is_empty() || name.eq_ignore_ascii_case("unassigned") {
                    AssigneeSelector::Unassigned
                } else if let Ok(id) = name.parse::<i64>() {
                    AssigneeSelector::Id(id)
                } else {
                    AssigneeSelector::Name(name.to_string())
                }
            }
        }
    }
}

impl From<Option<AssigneeRef>> for AssigneeSelector {
    fn from(value: Option<AssigneeRef>) -> Self {
        value.map(AssigneeRef::normalize).unwrap_or(AssigneeSelector::Unassigned)
    }
}
