use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeHost {
    GitHub,
    GitLab,
}

impl CodeHost {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeHost::GitHub => "github",
            CodeHost::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for CodeHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeHost {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(CodeHost::GitHub),
            "gitlab" => Ok(CodeHost::GitLab),
            other => Err(format!("Unknown code host: {other}")),
        }
    }
}

/// A repository listed from a code host, used to fill a project's link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub host: CodeHost,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub url: String,
    pub language: Option<String>,
    pub stars: u64,
    pub updated_at: Option<DateTime<Utc>>,
}
