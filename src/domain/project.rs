use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{DomainError, DomainResult};
use super::notes::{NoteEntry, StoredNotes};
use super::tags::normalize_tag_list;
use super::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        ProjectId(s)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        ProjectId(s.to_string())
    }
}

/// Project lifecycle. Any status may move to any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Concept,
    Started,
    Completed,
    Abandoned,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 4] = [
        ProjectStatus::Concept,
        ProjectStatus::Started,
        ProjectStatus::Completed,
        ProjectStatus::Abandoned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Concept => "concept",
            ProjectStatus::Started => "started",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Abandoned => "abandoned",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProjectStatus::Concept => "Idea",
            ProjectStatus::Started => "In progress",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Abandoned => "Abandoned",
        }
    }

    /// Position in the lifecycle, used for sorting.
    pub fn rank(&self) -> u8 {
        match self {
            ProjectStatus::Concept => 0,
            ProjectStatus::Started => 1,
            ProjectStatus::Completed => 2,
            ProjectStatus::Abandoned => 3,
        }
    }

    pub fn next(&self) -> Self {
        let index = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concept" | "idea" => Ok(ProjectStatus::Concept),
            "started" | "in-progress" | "in_progress" => Ok(ProjectStatus::Started),
            "completed" | "done" => Ok(ProjectStatus::Completed),
            "abandoned" | "archived" => Ok(ProjectStatus::Abandoned),
            _ => Err(DomainError::InvalidStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(DomainError::InvalidPriority(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub link: Option<String>,
    pub comments: StoredNotes,
    pub share_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn notes(&self) -> Vec<NoteEntry> {
        self.comments.resolve(self.created_at)
    }

    pub fn latest_note(&self) -> Option<NoteEntry> {
        self.notes().pop()
    }

    pub fn is_archived(&self) -> bool {
        self.status == ProjectStatus::Abandoned
    }

    pub fn is_shared(&self) -> bool {
        self.share_token.is_some()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub link: Option<String>,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyName);
        }
        Ok(())
    }

    /// Trimmed name, normalized tags, blank optionals dropped.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.tags = normalize_tag_list(&self.tags);
        self.description = non_blank(self.description);
        self.category = non_blank(self.category);
        self.link = non_blank(self.link);
        self
    }
}

/// Field-set patch; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<Option<Priority>>,
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub link: Option<Option<String>>,
    pub comments: Option<StoredNotes>,
    pub share_token: Option<Option<String>>,
}

impl ProjectUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::EmptyName);
            }
        }
        Ok(())
    }

    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.tags = self.tags.map(|tags| normalize_tag_list(&tags));
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &ProjectUpdate::default()
    }

    pub fn status(status: ProjectStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn comments(notes: Vec<NoteEntry>) -> Self {
        Self {
            comments: Some(StoredNotes::NoteList(notes)),
            ..Default::default()
        }
    }

    pub fn share_token(token: String) -> Self {
        Self {
            share_token: Some(Some(token)),
            ..Default::default()
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
