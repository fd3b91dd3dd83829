//! Participant profile summaries.

use serde::{Deserialize, Serialize};

/// Public profile summary of a conversation participant.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub avatar: String,
    /// Whether this profile belongs to the signed-in viewer.
    #[serde(default)]
    pub mine: bool,
}

impl Profile {
    pub fn new(id: String) -> Self {
        Self {
            id,
            name: String::new(),
            avatar: String::new(),
            mine: false,
        }
    }

    /// Best display name available: the profile name, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_id() {
        let profile = Profile::new("u-42".to_string());
        assert_eq!(profile.display_name(), "u-42");

        let named = Profile {
            name: "Ada".to_string(),
            ..profile
        };
        assert_eq!(named.display_name(), "Ada");
    }
}
