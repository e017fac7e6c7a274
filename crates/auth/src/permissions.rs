use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use warden_core::{require_non_blank, DomainError, DomainResult, Entity, PermissionId};

/// Kind of access a permission guards.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionType {
    /// Navigating to a page.
    #[default]
    Page,
    /// Reading or writing a data set.
    Data,
    /// Invoking an operation inside a page.
    Function,
    /// Calling an API endpoint.
    Api,
}

impl PermissionType {
    pub const ALL: [PermissionType; 4] = [
        PermissionType::Page,
        PermissionType::Data,
        PermissionType::Function,
        PermissionType::Api,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionType::Page => "Page",
            PermissionType::Data => "Data",
            PermissionType::Function => "Function",
            PermissionType::Api => "Api",
        }
    }
}

impl core::fmt::Display for PermissionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for PermissionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" => Ok(PermissionType::Page),
            "data" => Ok(PermissionType::Data),
            "function" => Ok(PermissionType::Function),
            "api" => Ok(PermissionType::Api),
            _ => Err(DomainError::unknown_variant("permission type", s)),
        }
    }
}

/// A grant on one resource URI for one kind of access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub resource_uri: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: PermissionType,
}

impl Permission {
    /// Whether this permission covers `resource_uri` for `kind` access.
    ///
    /// URIs compare case-insensitively; the type must match exactly.
    pub fn covers(&self, resource_uri: &str, kind: PermissionType) -> bool {
        self.kind == kind && uri_eq(&self.resource_uri, resource_uri)
    }
}

impl Entity for Permission {
    type Id = PermissionId;

    fn id(&self) -> PermissionId {
        self.id
    }
}

/// Case-insensitive resource URI comparison on uppercase forms. Symmetric.
pub fn uri_eq(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.to_uppercase() == b.to_uppercase()
}

/// Fields for creating or replacing a permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermission {
    pub name: String,
    pub resource_uri: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: PermissionType,
}

impl NewPermission {
    pub fn new(name: impl Into<String>, resource_uri: impl Into<String>, kind: PermissionType) -> Self {
        Self {
            name: name.into(),
            resource_uri: resource_uri.into(),
            description: String::new(),
            kind,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_non_blank("permission name", &self.name)?;
        require_non_blank("resource uri", &self.resource_uri)
    }

    pub fn into_permission(self, id: PermissionId) -> Permission {
        Permission {
            id,
            name: self.name,
            resource_uri: self.resource_uri,
            description: self.description,
            kind: self.kind,
        }
    }
}

/// Link changes needed to move a role from its current permission set to a
/// desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDiff {
    pub to_remove: Vec<PermissionId>,
    pub to_add: Vec<PermissionId>,
}

impl PermissionDiff {
    /// Set difference in both directions. Duplicates in either input are ignored
    /// and the output is sorted.
    pub fn compute(current: &[PermissionId], desired: &[PermissionId]) -> Self {
        let current: BTreeSet<PermissionId> = current.iter().copied().collect();
        let desired: BTreeSet<PermissionId> = desired.iter().copied().collect();

        Self {
            to_remove: current.difference(&desired).copied().collect(),
            to_add: desired.difference(&current).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}
