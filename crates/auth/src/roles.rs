use serde::{Deserialize, Serialize};

use warden_core::{require_non_blank, DomainResult, Entity, RoleId};

/// Named bundle of permissions assigned to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
}

impl Role {
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> RoleId {
        self.id
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Fields for creating or replacing a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl NewRole {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_non_blank("role name", &self.name)
    }

    pub fn into_role(self, id: RoleId) -> Role {
        Role {
            id,
            name: self.name,
            description: self.description,
        }
    }
}
