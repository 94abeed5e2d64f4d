//! Profile repository.

use tracing::info;

use crate::entities::{Profile, ProfilePatch};
use crate::store::{Collection, DataStore};

/// Profile persistence.
pub trait ProfileRepository {
    /// Current profile.
    fn profile(&self) -> Profile;

    /// Merge a patch into the profile.
    fn update_profile(&mut self, patch: ProfilePatch) -> Profile;
}

impl ProfileRepository for DataStore {
    fn profile(&self) -> Profile {
        self.profile.clone()
    }

    fn update_profile(&mut self, patch: ProfilePatch) -> Profile {
        patch.apply(&mut self.profile);
        self.persist(&[Collection::Profile]);
        info!(role = %self.profile.role, "Profile updated");
        self.profile.clone()
    }
}
