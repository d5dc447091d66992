use super::AppResult;
use crate::domain::{Profile, User};
use crate::ports::{ObjectStorage, ProfileRepository};
use chrono::Utc;
use std::sync::Arc;

pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository>,
    storage: Arc<dyn ObjectStorage>,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileRepository>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { profiles, storage }
    }

    pub async fn get(&self, user: &User) -> AppResult<Profile> {
        Ok(self
            .profiles
            .get_profile(&user.id)
            .await?
            .unwrap_or_else(|| Profile::empty(user.id.clone())))
    }

    pub async fn save(&self, user: &User, mut profile: Profile) -> AppResult<Profile> {
        // A user can only ever write their own row.
        profile.id = user.id.clone();
        profile.updated_at = Some(Utc::now());
        Ok(self.profiles.upsert_profile(&profile).await?)
    }

    pub async fn upload_avatar(
        &self,
        user: &User,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> AppResult<Profile> {
        let url = self
            .storage
            .upload_avatar(&user.id, file_name, bytes, content_type)
            .await?;
        tracing::info!("Uploaded avatar for {}", user.id);

        let mut profile = self.get(user).await?;
        profile.avatar_url = Some(url);
        self.save(user, profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::user;
    use crate::ports::{MockObjectStorage, MockProfileRepository};

    #[tokio::test]
    async fn test_upload_avatar_records_public_url() {
        let mut storage = MockObjectStorage::new();
        storage
            .expect_upload_avatar()
            .withf(|owner, name, bytes, content_type| {
                owner.0 == "u1" && name == "me.png" && bytes.len() == 3 && content_type == "image/png"
            })
            .returning(|_, _, _, _| Ok("https://cdn.example/avatars/u1/me.png".into()));

        let mut profiles = MockProfileRepository::new();
        profiles.expect_get_profile().returning(|_| Ok(None));
        profiles
            .expect_upsert_profile()
            .withf(|p| p.id.0 == "u1" && p.avatar_url.as_deref() == Some("https://cdn.example/avatars/u1/me.png"))
            .returning(|p| Ok(p.clone()));

        let service = ProfileService::new(Arc::new(profiles), Arc::new(storage));
        let profile = service
            .upload_avatar(&user("u1"), "me.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert!(profile.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_save_forces_own_id() {
        let mut profiles = MockProfileRepository::new();
        profiles
            .expect_upsert_profile()
            .withf(|p| p.id.0 == "u1")
            .returning(|p| Ok(p.clone()));

        let service = ProfileService::new(Arc::new(profiles), Arc::new(MockObjectStorage::new()));
        let foreign = Profile::empty("u2".into());
        let saved = service.save(&user("u1"), foreign).await.unwrap();
        assert_eq!(saved.id.0, "u1");
    }
}
