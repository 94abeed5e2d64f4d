//! The local user's profile.

use civic_common::{AppError, AppResult, FieldErrors};
use civic_db::{Saved, SharedStore};
use civic_db::entities::{Profile, ProfilePatch, Role};
use civic_db::repositories::ProfileRepository;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Profile fields a user can change.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(min = 2, max = 50, message = "Name must be 2 to 50 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Email format is invalid"))]
    pub email: Option<String>,
    /// `Some(None)` removes the avatar.
    #[serde(default)]
    pub avatar_data: Option<Option<String>>,
}

/// Profile service.
#[derive(Clone)]
pub struct ProfileService {
    store: SharedStore,
}

impl ProfileService {
    #[must_use]
    pub const fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self) -> Profile {
        self.store.lock().await.profile()
    }

    /// Update name, email or avatar. The avatar must be an image `data:` URL.
    pub async fn update(&self, input: UpdateProfileInput) -> AppResult<Saved<Profile>> {
        let input = UpdateProfileInput {
            name: input.name.map(|n| n.trim().to_string()),
            email: input.email.map(|e| e.trim().to_string()),
            ..input
        };
        input.validate()?;

        if let Some(Some(avatar)) = &input.avatar_data {
            if !avatar.starts_with("data:image/") {
                let mut errors = FieldErrors::default();
                errors.insert_first("avatarData", "Avatar must be an image".to_string());
                return Err(AppError::Validation(errors));
            }
        }

        let mut store = self.store.lock().await;
        let profile = store.update_profile(ProfilePatch {
            name: input.name,
            email: input.email,
            avatar_data: input.avatar_data,
            role: None,
        });
        info!("Profile updated");
        Ok(store.saved(profile))
    }

    /// Switch between citizen and officer.
    pub async fn set_role(&self, role: Role) -> Saved<Profile> {
        let mut store = self.store.lock().await;
        let profile = store.update_profile(ProfilePatch {
            role: Some(role),
            ..ProfilePatch::default()
        });
        info!(%role, "Profile role changed");
        store.saved(profile)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use civic_db::test_utils::TestStore;

    fn service() -> ProfileService {
        let (store, _, _) = TestStore::new().into_shared();
        ProfileService::new(store)
    }

    #[tokio::test]
    async fn test_update_profile() {
        let service = service();
        let profile = service
            .update(UpdateProfileInput {
                name: Some("  Ayu Lestari ".to_string()),
                email: Some("ayu@example.com".to_string()),
                avatar_data: Some(Some("data:image/png;base64,AAAA".to_string())),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(profile.name, "Ayu Lestari");
        assert_eq!(profile.role, Role::Citizen);
        assert!(profile.avatar_data.is_some());

        let cleared = service
            .update(UpdateProfileInput {
                avatar_data: Some(None),
                ..UpdateProfileInput::default()
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(cleared.avatar_data, None);
        assert_eq!(cleared.name, "Ayu Lestari");
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_input() {
        let service = service();

        let err = service
            .update(UpdateProfileInput {
                name: Some("A".to_string()),
                email: Some("not-an-email".to_string()),
                ..UpdateProfileInput::default()
            })
            .await
            .unwrap_err();
        let errors = err.field_errors().unwrap();
        assert_eq!(errors.get("name"), Some("Name must be 2 to 50 characters"));
        assert_eq!(errors.get("email"), Some("Email format is invalid"));

        let err = service
            .update(UpdateProfileInput {
                avatar_data: Some(Some("data:text/plain;base64,AAAA".to_string())),
                ..UpdateProfileInput::default()
            })
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().get("avatarData").is_some());
        assert_eq!(service.get().await.name, "Citizen");
    }

    #[tokio::test]
    async fn test_set_role() {
        let service = service();
        assert_eq!(service.set_role(Role::Officer).await.value.role, Role::Officer);
        assert_eq!(service.get().await.role, Role::Officer);
    }
}
