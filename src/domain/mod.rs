pub mod access;
pub mod category;
pub mod code_repo;
pub mod error;
pub mod notes;
pub mod project;
pub mod tags;
pub mod user;
pub mod view;

pub use access::*;
pub use category::*;
pub use code_repo::*;
pub use error::*;
pub use notes::*;
pub use project::*;
pub use tags::*;
pub use user::*;
pub use view::*;
