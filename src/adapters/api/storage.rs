use async_trait::async_trait;
use std::sync::Arc;

use super::BackendClient;
use crate::domain::UserId;
use crate::ports::{ObjectStorage, RepositoryResult};

pub const AVATAR_BUCKET: &str = "avatars";

/// Object storage for profile pictures, one folder per user.
pub struct BackendStorage {
    client: Arc<BackendClient>,
    bucket: String,
}

impl BackendStorage {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self {
            client,
            bucket: AVATAR_BUCKET.to_string(),
        }
    }

    fn object_path(owner: &UserId, file_name: &str) -> String {
        let name = file_name
            .rsplit(['/', '\\'])
            .next()
            .filter(|n| !n.is_empty())
            .unwrap_or("avatar");
        format!("{}/{}", urlencoding::encode(&owner.0), urlencoding::encode(name))
    }
}

#[async_trait]
impl ObjectStorage for BackendStorage {
    async fn upload_avatar(
        &self,
        owner: &UserId,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RepositoryResult<String> {
        let path = Self::object_path(owner, file_name);
        tracing::debug!("Uploading {} bytes to {}/{}", bytes.len(), self.bucket, path);

        self.client
            .upload_object(&self.bucket, &path, bytes, content_type)
            .await?;
        Ok(self.client.public_object_url(&self.bucket, &path))
    }
}
