//! Relation snapshots and the collaborator traits the endpoints run against.
//!
//! The shared databag bus, the leader predicate and the network binding
//! lookup all live outside this crate. The endpoints only see them through
//! [`PartitionStore`] and [`LocalPeer`].

use {
    crate::error::StoreError,
    std::fmt,
};

/// Stable identity of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationId(pub u32);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The owner of a databag: a single unit, or a whole application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Participant {
    Unit(String),
    App(String),
}

impl Participant {
    pub fn name(&self) -> &str {
        match self {
            Self::Unit(name) | Self::App(name) => name,
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(name) => write!(f, "unit {name}"),
            Self::App(name) => write!(f, "app {name}"),
        }
    }
}

/// A relation as seen from the local unit at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub id: RelationId,
    /// Endpoint name the relation was established on.
    pub name: String,
    /// Remote application name. Absent, or empty, while the relation is
    /// being torn down.
    pub app: Option<String>,
    /// Remote units visible on this relation.
    pub units: Vec<String>,
}

impl Relation {
    /// The remote application, if it can still be resolved.
    ///
    /// The bus hands back an empty name rather than none during teardown,
    /// so both cases count as unresolved.
    pub fn remote_app(&self) -> Option<&str> {
        self.app.as_deref().filter(|name| !name.is_empty())
    }

    pub fn has_unit(&self, unit: &str) -> bool {
        self.units.iter().any(|u| u == unit)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.id)
    }
}

/// Per-participant read/write access to the relation databags.
pub trait PartitionStore {
    /// All relations currently established on `endpoint`.
    fn relations(&self, endpoint: &str) -> Vec<Relation>;

    /// Raw contents of a participant's databag, `None` if never written.
    fn read(
        &self,
        relation: RelationId,
        participant: &Participant,
    ) -> Result<Option<String>, StoreError>;

    /// Replace a participant's databag. Must fail if the local unit does
    /// not own the partition.
    fn write(
        &mut self,
        relation: RelationId,
        participant: &Participant,
        data: &str,
    ) -> Result<(), StoreError>;

    /// Whether the local unit currently owns (may write) the partition.
    fn owner(&self, participant: &Participant) -> bool;
}

/// Identity and environment of the local unit.
pub trait LocalPeer {
    fn unit_name(&self) -> &str;
    fn app_name(&self) -> &str;
    fn model_name(&self) -> &str;
    /// Whether this unit is the writer for its application.
    fn is_leader(&self) -> bool;
    /// Address the unit is reachable on over `endpoint`.
    fn bind_address(&self, endpoint: &str) -> Option<String>;
}

/// Everything an endpoint needs from its host.
pub trait Environment: PartitionStore + LocalPeer {}

impl<T: PartitionStore + LocalPeer> Environment for T {}
