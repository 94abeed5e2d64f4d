//! Profile entity.

use std::fmt;
use std::str::FromStr;

use civic_common::AppError;
use civic_common::config::ProfileDefaults;
use serde::{Deserialize, Serialize};

/// Role of the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Citizen,
    Officer,
}

impl Role {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Officer => "officer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "citizen" => Ok(Self::Citizen),
            "officer" => Ok(Self::Officer),
            other => Err(AppError::BadRequest(format!("Unknown role: {other}"))),
        }
    }
}

/// The single local user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub email: String,
    /// Avatar image as a `data:` URL.
    #[serde(default)]
    pub avatar_data: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl Profile {
    /// Profile used when none is stored. An unknown configured role falls back to citizen.
    #[must_use]
    pub fn from_defaults(defaults: &ProfileDefaults) -> Self {
        Self {
            name: defaults.name.clone(),
            email: defaults.email.clone(),
            avatar_data: None,
            role: defaults.role.parse().unwrap_or_default(),
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::from_defaults(&ProfileDefaults::default())
    }
}

/// Partial profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    /// `Some(None)` removes the avatar.
    pub avatar_data: Option<Option<String>>,
    pub role: Option<Role>,
}

impl ProfilePatch {
    /// Merge into `profile`.
    pub fn apply(self, profile: &mut Profile) {
        if let Some(name) = self.name {
            profile.name = name;
        }
        if let Some(email) = self.email {
            profile.email = email;
        }
        if let Some(avatar) = self.avatar_data {
            profile.avatar_data = avatar;
        }
        if let Some(role) = self.role {
            profile.role = role;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_with_unknown_role() {
        let defaults = ProfileDefaults {
            role: "mayor".to_string(),
            ..ProfileDefaults::default()
        };
        let profile = Profile::from_defaults(&defaults);
        assert_eq!(profile.role, Role::Citizen);
        assert_eq!(profile.name, "Citizen");
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let mut profile = Profile::default();
        ProfilePatch {
            name: Some("Budi".to_string()),
            avatar_data: Some(Some("data:image/png;base64,AA==".to_string())),
            ..ProfilePatch::default()
        }
        .apply(&mut profile);

        assert_eq!(profile.name, "Budi");
        assert_eq!(profile.email, "citizen@example.com");
        assert!(profile.avatar_data.is_some());
    }
}
