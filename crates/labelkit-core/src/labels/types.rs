//! Label record types, label targets, and store error definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::error::DbError;
use crate::validate::{self, ValidationError};

// ==============================================================================
// Targets
// ==============================================================================

/// The kind of entity a label is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Service,
    User,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::User => write!(f, "user"),
        }
    }
}

impl FromStr for TargetKind {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "service" => Ok(Self::Service),
            "user" => Ok(Self::User),
            _ => Err(LabelError::UnsupportedTarget(s.to_string())),
        }
    }
}

/// The entity a label belongs to. Each variant carries a parsed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "TargetRef", into = "TargetRef")]
pub enum Target {
    Service(Uuid),
    User(Uuid),
}

impl Target {
    /// Build a target from its wire parts: a type name and a raw identifier.
    pub fn from_parts(target_type: &str, id: &str) -> Result<Self, LabelError> {
        let kind: TargetKind = target_type.parse()?;
        let id = validate::parse_uuid("TargetID", id)?;
        Ok(match kind {
            TargetKind::Service => Self::Service(id),
            TargetKind::User => Self::User(id),
        })
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Service(_) => TargetKind::Service,
            Self::User(_) => TargetKind::User,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Service(id) | Self::User(id) => *id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.id())
    }
}

/// Unvalidated wire form of a [`Target`]: `{"type": "...", "id": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    #[serde(rename = "type")]
    pub target_type: String,
    pub id: String,
}

impl TryFrom<TargetRef> for Target {
    type Error = LabelError;

    fn try_from(raw: TargetRef) -> Result<Self, Self::Error> {
        Self::from_parts(&raw.target_type, &raw.id)
    }
}

impl From<Target> for TargetRef {
    fn from(target: Target) -> Self {
        Self {
            target_type: target.kind().to_string(),
            id: target.id().to_string(),
        }
    }
}

// ==============================================================================
// Labels
// ==============================================================================

/// A key/value pair bound to exactly one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    pub value: String,
    pub target: Target,
}

impl Label {
    pub fn new(key: impl Into<String>, value: impl Into<String>, target: Target) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            target,
        }
    }

    /// Return a trimmed, validated copy of this label. An empty value
    /// survives normalization; it marks the label for deletion.
    pub fn normalize(&self) -> Result<Label, ValidationError> {
        let key = self.key.trim();
        let value = self.value.trim();
        validate::label_key("Key", key)?;
        validate::label_value("Value", value)?;
        Ok(Label {
            key: key.to_string(),
            value: value.to_string(),
            target: self.target,
        })
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }
}

// ==============================================================================
// Errors
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unsupported target type for label: {0}")]
    UnsupportedTarget(String),

    /// A data store failure, prefixed with the operation that issued it.
    #[error("{op}: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: DbError,
    },

    #[error("request cancelled")]
    Cancelled,
}

impl LabelError {
    pub(crate) fn store(op: &'static str) -> impl FnOnce(DbError) -> Self {
        move |source| Self::Store { op, source }
    }
}
