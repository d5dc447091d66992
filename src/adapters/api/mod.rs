pub mod auth;
pub mod client;
pub mod dto;
pub mod project_repo;
pub mod storage;

pub use auth::BackendAuth;
pub use client::BackendClient;
pub use project_repo::BackendRepository;
pub use storage::BackendStorage;
