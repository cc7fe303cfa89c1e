//! Notifications flowing into and out of the endpoints.

use crate::relation::{Relation, RelationId};

/// Raw notifications delivered by the host about the relation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    /// The relation was established.
    RelationCreated(Relation),
    /// A remote unit joined the relation.
    RelationJoined { relation: Relation, unit: String },
    /// A databag on the relation changed.
    RelationChanged(Relation),
    /// The relation is being torn down. The remote app is no longer
    /// resolvable.
    RelationBroken(Relation),
    /// Leadership of the local application moved.
    LeaderElected,
    /// The local unit was upgraded.
    UpgradeCharm,
}

impl HookEvent {
    pub fn relation(&self) -> Option<&Relation> {
        match self {
            Self::RelationCreated(relation)
            | Self::RelationJoined { relation, .. }
            | Self::RelationChanged(relation)
            | Self::RelationBroken(relation) => Some(relation),
            Self::LeaderElected | Self::UpgradeCharm => None,
        }
    }

    /// Tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RelationCreated(_) => "relation_created",
            Self::RelationJoined { .. } => "relation_joined",
            Self::RelationChanged(_) => "relation_changed",
            Self::RelationBroken(_) => "relation_broken",
            Self::LeaderElected => "leader_elected",
            Self::UpgradeCharm => "upgrade_charm",
        }
    }
}

/// Transitions raised by the endpoints for the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressEvent {
    /// The relation can be used to make requests.
    Available(RelationId),
    /// The remote side has published the data this side waits for.
    Ready(RelationId),
    /// The relation data is invalid or inconsistent.
    Failed(RelationId),
    /// The relation is being torn down.
    Broken(RelationId),
    /// Provider only: requirer units are waiting for urls.
    Request(RelationId),
    /// Requirer only: the urls published for this application may have
    /// changed.
    IngressChanged(RelationId),
}

impl IngressEvent {
    pub fn relation_id(&self) -> RelationId {
        match self {
            Self::Available(id)
            | Self::Ready(id)
            | Self::Failed(id)
            | Self::Broken(id)
            | Self::Request(id)
            | Self::IngressChanged(id) => *id,
        }
    }
}
