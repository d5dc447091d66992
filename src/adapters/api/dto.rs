use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::*;
use crate::ports::{RepositoryError, RepositoryResult};

/// `created_at` for rows whose column is missing or unreadable.
fn fallback_created_at(id: &str, raw: Option<&str>) -> DateTime<Utc> {
    tracing::warn!("Unreadable created_at {:?} on project {}, using the epoch", raw, id);
    DateTime::UNIX_EPOCH
}

// Table rows

/// A `projects` row as the table API returns it. Everything except the
/// identity columns is optional so one odd row cannot fail a whole list.
#[derive(Debug, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Comma-joined text; older rows may hold a JSON array.
    #[serde(default)]
    pub tags: Option<serde_json::Value>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub comments: Option<serde_json::Value>,
    #[serde(default)]
    pub share_token: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn decode_tags(value: Option<serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::String(raw)) => normalize_tags(&raw),
        Some(serde_json::Value::Array(items)) => {
            normalize_tag_list(items.iter().filter_map(|v| v.as_str()))
        }
        _ => Vec::new(),
    }
}

fn decode_comments(value: Option<serde_json::Value>) -> StoredNotes {
    match value {
        None | Some(serde_json::Value::Null) => StoredNotes::Empty,
        Some(serde_json::Value::String(raw)) => StoredNotes::decode(Some(&raw)),
        Some(other) => StoredNotes::decode(Some(&other.to_string())),
    }
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        let status = match row.status.as_deref() {
            None => ProjectStatus::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Unknown status {:?} on project {}, using concept", raw, row.id);
                ProjectStatus::default()
            }),
        };

        let priority = match row.priority.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse() {
                Ok(priority) => Some(priority),
                Err(_) => {
                    tracing::warn!("Unknown priority {:?} on project {}, ignoring", raw, row.id);
                    None
                }
            },
        };

        let created_at = row
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(|| fallback_created_at(&row.id, row.created_at.as_deref()));
        let updated_at = row.updated_at.as_deref().and_then(parse_timestamp).unwrap_or(created_at);

        Self {
            id: ProjectId(row.id),
            user_id: UserId(row.user_id),
            name: row.name,
            description: row.description,
            status,
            priority,
            category: row.category.filter(|c| !c.trim().is_empty()),
            tags: decode_tags(row.tags),
            link: row.link,
            comments: decode_comments(row.comments),
            share_token: row.share_token,
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewProjectRow {
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: &'static str,
    pub priority: Option<&'static str>,
    pub category: Option<String>,
    pub tags: String,
    pub link: Option<String>,
}

impl NewProjectRow {
    pub fn new(owner: &UserId, project: &NewProject) -> Self {
        Self {
            user_id: owner.0.clone(),
            name: project.name.clone(),
            description: project.description.clone(),
            status: project.status.as_str(),
            priority: project.priority.map(|p| p.as_str()),
            category: project.category.clone(),
            tags: join_tags(&project.tags),
            link: project.link.clone(),
        }
    }
}

/// PATCH body. Absent fields are left alone; `Some(None)` writes null.
#[derive(Debug, Default, Serialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Option<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_token: Option<Option<String>>,
    pub updated_at: String,
}

impl ProjectPatch {
    pub fn new(update: &ProjectUpdate, now: DateTime<Utc>) -> RepositoryResult<Self> {
        let comments = match &update.comments {
            Some(notes) => Some(
                notes
                    .encode()
                    .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            name: update.name.clone(),
            description: update.description.clone(),
            status: update.status.map(|s| s.as_str()),
            priority: update.priority.map(|p| p.map(|p| p.as_str())),
            category: update.category.clone(),
            tags: update.tags.as_ref().map(|t| join_tags(t)),
            link: update.link.clone(),
            comments,
            share_token: update.share_token.clone(),
            updated_at: now.to_rfc3339(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryRow {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl CategoryRow {
    pub fn new(owner: &UserId, category: &NewCategory) -> Self {
        Self {
            id: category.id().0,
            user_id: Some(owner.0.clone()),
            label: category.label.trim().to_string(),
            icon: Some(category.icon.clone()),
            color: Some(category.color.clone()),
        }
    }
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId(row.id),
            label: row.label,
            icon: row.icon.unwrap_or_else(|| "folder".to_string()),
            color: row.color.unwrap_or_else(|| "#6b7280".to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub github_username: Option<String>,
    #[serde(default)]
    pub gitlab_username: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: UserId(row.id),
            username: row.username,
            full_name: row.full_name,
            avatar_url: row.avatar_url,
            github_username: row.github_username,
            gitlab_username: row.gitlab_username,
            updated_at: row.updated_at.as_deref().and_then(parse_timestamp),
        }
    }
}

impl From<&Profile> for ProfileRow {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.0.clone(),
            username: profile.username.clone(),
            full_name: profile.full_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            github_username: profile.github_username.clone(),
            gitlab_username: profile.gitlab_username.clone(),
            updated_at: profile.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

// Auth API

#[derive(Debug, Deserialize)]
pub struct AuthUserDto {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<AuthUserDto> for User {
    fn from(dto: AuthUserDto) -> Self {
        Self {
            id: UserId(dto.id),
            email: dto.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUserDto,
}

impl TokenResponse {
    pub fn into_session(self, now: DateTime<Utc>) -> Session {
        Session {
            user: self.user.into(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| now + chrono::Duration::seconds(secs)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PasswordCredentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshTokenGrant<'a> {
    pub refresh_token: &'a str,
}
