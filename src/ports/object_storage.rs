use async_trait::async_trait;

use super::RepositoryResult;
use crate::domain::UserId;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload an avatar image and return its public URL.
    async fn upload_avatar(
        &self,
        owner: &UserId,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RepositoryResult<String>;
}
