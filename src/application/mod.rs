pub mod admin;
pub mod auth_service;
pub mod category_service;
pub mod error;
pub mod profile_service;
pub mod project_service;
pub mod repo_browser;
pub mod state_manager;

#[cfg(test)]
pub mod testing;

pub use admin::*;
pub use auth_service::*;
pub use category_service::*;
pub use error::*;
pub use profile_service::*;
pub use project_service::*;
pub use repo_browser::*;
pub use state_manager::*;
