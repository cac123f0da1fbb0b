//! Error types shared by provisioning steps and admin backends.

use std::fmt;

use thiserror::Error;

/// Kind of object a provisioning step creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Collection,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::User => f.write_str("user"),
            EntityKind::Collection => f.write_str("collection"),
        }
    }
}

/// Failures surfaced by an admin backend.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: EntityKind, name: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl ProvisionError {
    /// Create a duplicate-object error
    pub fn already_exists(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Whether the failure only reports an object that is already there
    pub fn is_conflict(&self) -> bool {
        matches!(self, ProvisionError::AlreadyExists { .. })
    }
}
