pub mod auth_provider;
pub mod cache;
pub mod code_host;
pub mod config_store;
pub mod object_storage;
pub mod project_repository;

pub use auth_provider::*;
pub use cache::*;
pub use code_host::*;
pub use config_store::*;
pub use object_storage::*;
pub use project_repository::*;
