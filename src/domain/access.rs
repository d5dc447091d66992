//! Ownership and share-link policy.
//!
//! Every read and write of a project goes through [`can_access`]; read-only
//! share links go through [`validate_share_token`]. Neither is re-derived at
//! call sites.

use rand::Rng;

use super::project::{Project, ProjectId};
use super::user::User;

pub const SHARE_TOKEN_LENGTH: usize = 32;

const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub fn can_access(user: &User, project: &Project) -> bool {
    user.id == project.user_id
}

/// Exact match against the single stored token. No expiry.
pub fn validate_share_token(project: &Project, token: &str) -> bool {
    match project.share_token.as_deref() {
        Some(stored) => !token.is_empty() && stored == token,
        None => false,
    }
}

pub fn generate_share_token() -> String {
    let mut rng = rand::thread_rng();
    (0..SHARE_TOKEN_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}

/// Read-only link for a shared project.
pub fn share_url(base_url: &str, project_id: &ProjectId, token: &str) -> String {
    format!(
        "{}/share/{}?token={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(&project_id.0),
        urlencoding::encode(token)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectStatus, StoredNotes, UserId};
    use chrono::Utc;

    fn project(owner: &str, token: Option<&str>) -> Project {
        Project {
            id: ProjectId("p1".into()),
            user_id: UserId(owner.into()),
            name: "X".into(),
            description: None,
            status: ProjectStatus::Concept,
            priority: None,
            category: None,
            tags: Vec::new(),
            link: None,
            comments: StoredNotes::Empty,
            share_token: token.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_only_access() {
        let owner = User {
            id: UserId("u1".into()),
            email: None,
        };
        let stranger = User {
            id: UserId("u2".into()),
            email: None,
        };
        let p = project("u1", None);
        assert!(can_access(&owner, &p));
        assert!(!can_access(&stranger, &p));
    }

    #[test]
    fn test_share_token_exact_match() {
        let p = project("u1", Some("abc123"));
        assert!(validate_share_token(&p, "abc123"));
        assert!(!validate_share_token(&p, "ABC123"));
        assert!(!validate_share_token(&p, "abc1234"));
        assert!(!validate_share_token(&p, ""));
        assert!(!validate_share_token(&project("u1", None), ""));
    }

    #[test]
    fn test_regenerated_token_invalidates_previous() {
        let first = generate_share_token();
        let second = generate_share_token();
        assert_eq!(first.len(), SHARE_TOKEN_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);

        let p = project("u1", Some(&second));
        assert!(validate_share_token(&p, &second));
        assert!(!validate_share_token(&p, &first));
    }

    #[test]
    fn test_share_url() {
        assert_eq!(
            share_url("https://tfm.example/", &ProjectId("p1".into()), "tok"),
            "https://tfm.example/share/p1?token=tok"
        );
    }
}
