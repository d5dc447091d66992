use thiserror::Error;

/// Validation failures caught before any network call is made.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Project name is required")]
    EmptyName,

    #[error("Note text is required")]
    EmptyNote,

    #[error("Category label is required")]
    EmptyCategoryLabel,

    #[error("Category already exists: {0}")]
    DuplicateCategory(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    #[error("Invalid sort key: {0}")]
    InvalidSortKey(String),

    #[error("Required field missing: {0}")]
    MissingField(String),

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
