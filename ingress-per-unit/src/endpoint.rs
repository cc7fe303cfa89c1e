//! Behaviour shared by both sides of the relation.
//!
//! [`IngressEndpoint`] tracks the relations of one endpoint, classifies each
//! one as available, ready or failed, and turns raw [`HookEvent`]s into
//! [`IngressEvent`]s. Nothing is cached: every predicate re-reads the
//! databags, so a predicate followed by a fetch is best-effort, not
//! transactional.
//!
//! Predicates never fail. Store and data errors are logged and folded into
//! the boolean answer.

use {
    crate::{
        config::IngressConfig,
        error::Result,
        event::{HookEvent, IngressEvent},
        relation::Relation,
    },
    log::{debug, warn},
};

/// Suggested workload status for a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationStatus {
    /// The relation failed; operator action is needed.
    Blocked(String),
    /// The relation is not available or not ready yet.
    Waiting(String),
    Active,
}

impl RelationStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Base monitor for an ingress-per-unit endpoint.
pub trait IngressEndpoint {
    fn config(&self) -> &IngressConfig;

    /// Relations currently established on this endpoint.
    fn relations(&self) -> Vec<Relation>;

    /// Role-specific readiness. Only consulted for available relations.
    fn relation_ready(&self, relation: &Relation) -> bool;

    /// Role-specific failure check: `Err` carries the reason the relation
    /// is failed.
    fn check_relation(&self, relation: &Relation) -> Result<()>;

    /// Whether the relation can be used, or any relation if none is given.
    fn is_available(&self, relation: Option<&Relation>) -> bool {
        match relation {
            None => self
                .relations()
                .iter()
                .any(|relation| self.is_available(Some(relation))),
            // The remote app is not resolvable while the relation is
            // breaking; such a relation cannot be available.
            Some(relation) => relation.remote_app().is_some(),
        }
    }

    /// Whether the remote side has published what this side waits for.
    fn is_ready(&self, relation: Option<&Relation>) -> bool {
        match relation {
            None => self
                .relations()
                .iter()
                .any(|relation| self.is_ready(Some(relation))),
            Some(relation) => {
                self.is_available(Some(relation))
                    && relation.remote_app().is_some()
                    && self.relation_ready(relation)
            }
        }
    }

    fn is_failed(&self, relation: Option<&Relation>) -> bool {
        match relation {
            None => self
                .relations()
                .iter()
                .any(|relation| self.is_failed(Some(relation))),
            Some(relation) => match self.check_relation(relation) {
                Ok(()) => false,
                Err(err) => {
                    warn!("relation {relation} failed: {err}");
                    true
                }
            },
        }
    }

    /// Derived status. Failure wins over everything else.
    fn get_status(&self, relation: &Relation) -> RelationStatus {
        if self.is_failed(Some(relation)) {
            RelationStatus::Blocked(format!("Error handling relation {relation}"))
        } else if !self.is_available(Some(relation)) || !self.is_ready(Some(relation)) {
            RelationStatus::Waiting(format!("Waiting on relation {relation}"))
        } else {
            RelationStatus::Active
        }
    }

    /// Classify a relation into at most one transition, in the order
    /// ready, available, failed.
    fn classify(&self, relation: &Relation) -> Option<IngressEvent> {
        if self.is_ready(Some(relation)) {
            Some(IngressEvent::Ready(relation.id))
        } else if self.is_available(Some(relation)) {
            Some(IngressEvent::Available(relation.id))
        } else if self.is_failed(Some(relation)) {
            Some(IngressEvent::Failed(relation.id))
        } else {
            debug!("relation {relation} is neither ready, nor available, nor failed");
            None
        }
    }

    /// Process one raw notification and return the transitions it raised.
    fn handle(&mut self, event: &HookEvent) -> Result<Vec<IngressEvent>> {
        if let Some(relation) = event.relation() {
            if relation.name != self.config().endpoint {
                return Ok(Vec::new());
            }
        }
        debug!("{}: handling {}", self.config().endpoint, event.kind());
        match event {
            HookEvent::RelationCreated(relation)
            | HookEvent::RelationJoined { relation, .. }
            | HookEvent::RelationChanged(relation) => self.on_relation(event, relation),
            HookEvent::RelationBroken(relation) => self.on_relation_broken(relation),
            HookEvent::LeaderElected | HookEvent::UpgradeCharm => self.on_upgrade_or_leader(),
        }
    }

    /// Created, joined and changed notifications.
    fn on_relation(
        &mut self,
        _event: &HookEvent,
        relation: &Relation,
    ) -> Result<Vec<IngressEvent>> {
        Ok(self.classify(relation).into_iter().collect())
    }

    fn on_relation_broken(&mut self, relation: &Relation) -> Result<Vec<IngressEvent>> {
        Ok(vec![IngressEvent::Broken(relation.id)])
    }

    /// Leader-elected and upgrade notifications. Nothing by default.
    fn on_upgrade_or_leader(&mut self) -> Result<Vec<IngressEvent>> {
        Ok(Vec::new())
    }
}
