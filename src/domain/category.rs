use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{DomainError, DomainResult};

/// Filter sentinel meaning "every category".
pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub String);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        CategoryId(s.to_string())
    }
}

impl From<String> for CategoryId {
    fn from(s: String) -> Self {
        CategoryId(s)
    }
}

/// A user-scoped label. Projects reference it by id without any
/// foreign-key enforcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub label: String,
    pub icon: String,
    pub color: String,
}

impl Category {
    fn builtin(id: &str, label: &str, icon: &str, color: &str) -> Self {
        Self {
            id: CategoryId(id.to_string()),
            label: label.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
        }
    }
}

/// Categories every user has without storing anything.
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::builtin("web", "Web", "globe", "#3b82f6"),
        Category::builtin("mobile", "Mobile", "smartphone", "#10b981"),
        Category::builtin("desktop", "Desktop", "monitor", "#8b5cf6"),
        Category::builtin("game", "Game", "gamepad-2", "#f59e0b"),
        Category::builtin("other", "Other", "folder", "#6b7280"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub label: String,
    pub icon: String,
    pub color: String,
}

impl NewCategory {
    pub fn validate(&self) -> DomainResult<()> {
        if self.label.trim().is_empty() {
            return Err(DomainError::EmptyCategoryLabel);
        }
        Ok(())
    }

    pub fn id(&self) -> CategoryId {
        CategoryId(slugify(&self.label))
    }
}

/// Lowercase, alphanumeric runs joined by `-`.
pub fn slugify(label: &str) -> String {
    label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
