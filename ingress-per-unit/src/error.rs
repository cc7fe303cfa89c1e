//! Error types for the ingress-per-unit protocol.

use {
    crate::relation::{Relation, RelationId},
    std::fmt,
    thiserror::Error,
};

/// The two wire schemas a partition can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// A single requirer unit's `{model, name, host, port}` record.
    RequirerUnit,
    /// The provider application's wrapped `{ingress: {...}}` document.
    ProviderApp,
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequirerUnit => f.write_str("requirer unit"),
            Self::ProviderApp => f.write_str("provider application"),
        }
    }
}

/// `name:id` handle for a relation, carried by errors that outlive the
/// relation snapshot that raised them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRef {
    pub name: String,
    pub id: RelationId,
}

impl From<&Relation> for RelationRef {
    fn from(relation: &Relation) -> Self {
        Self {
            name: relation.name.clone(),
            id: relation.id,
        }
    }
}

impl fmt::Display for RelationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.id)
    }
}

/// Failures reported by the partition store itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The local peer does not own, or may not read, the partition.
    #[error("permission denied on {0}")]
    PermissionDenied(String),

    /// The relation id is not (or no longer) known to the store.
    #[error("unknown relation {0}")]
    UnknownRelation(RelationId),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the ingress-per-unit endpoints.
#[derive(Error, Debug)]
pub enum IngressError {
    /// Partition content does not match its schema.
    #[error("invalid {schema} data: {reason}")]
    DataValidation {
        /// Which schema was violated.
        schema: Schema,
        /// First violation found.
        reason: String,
    },

    /// Partition content is not a structured-text document at all.
    #[error("malformed relation data: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Requirer units disagree on a field that must be identical.
    #[error("There is an error with the relation {relation} with {entity}")]
    RelationDataMismatch {
        /// Relation the units belong to.
        relation: RelationRef,
        /// The first unit whose data disagreed.
        entity: String,
    },

    /// A non-leader attempted a leader-only write.
    #[error("Unable to write data to relation '{relation}' with {entity}: {message}")]
    RelationPermission {
        relation: RelationRef,
        entity: String,
        message: String,
    },

    /// The unit passed to an API call does not belong to the relation.
    #[error("unit {unit} does not belong to relation {relation}")]
    UnknownUnit { relation: RelationRef, unit: String },

    /// A publish was requested while no relation is established.
    #[error("no relation established on endpoint {endpoint}")]
    NoRelation { endpoint: String },

    /// The network binding for the endpoint has no address.
    #[error("no bind address for endpoint {endpoint}")]
    BindAddress { endpoint: String },

    /// Transport-level failure from the partition store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The endpoint configuration is unusable.
    #[error("invalid ingress configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl IngressError {
    pub(crate) fn validation(schema: Schema, reason: impl Into<String>) -> Self {
        Self::DataValidation {
            schema,
            reason: reason.into(),
        }
    }

    /// Whether this error means the data itself is bad, as opposed to the
    /// store or the caller.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::DataValidation { .. } | Self::Yaml(_) | Self::RelationDataMismatch { .. }
        )
    }
}

/// Convenience result type for ingress operations.
pub type Result<T> = std::result::Result<T, IngressError>;
