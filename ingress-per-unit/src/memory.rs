//! In-memory databag bus for tests and local simulation.
//!
//! A [`MemoryBus`] holds every application, unit, relation and databag of a
//! simulated model. Each unit gets a [`MemoryPeer`] view that implements
//! [`PartitionStore`] and [`LocalPeer`] with the same permission rules as a
//! real deployment:
//!
//! - a unit may write only its own unit databag;
//! - the application databag may be read and written only by the leader;
//! - remote unit and remote application databags are readable.
//!
//! A relation marked as breaking keeps its data but reports an empty remote
//! application name.

use {
    crate::{
        error::StoreError,
        relation::{LocalPeer, Participant, PartitionStore, Relation, RelationId},
    },
    log::debug,
    std::{
        collections::{BTreeMap, HashMap},
        sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    },
};

#[derive(Debug)]
struct RelationState {
    endpoint: String,
    apps: [String; 2],
    breaking: bool,
    databags: HashMap<Participant, String>,
}

impl RelationState {
    fn remote_app(&self, local_app: &str) -> Option<&str> {
        match &self.apps {
            [a, b] if a == local_app => Some(b.as_str()),
            [a, b] if b == local_app => Some(a.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct BusState {
    model: String,
    next_relation_id: u32,
    /// app → units, in join order.
    units: BTreeMap<String, Vec<String>>,
    leaders: HashMap<String, String>,
    bind_addresses: HashMap<String, String>,
    relations: BTreeMap<RelationId, RelationState>,
    unavailable: bool,
}

/// Shared state of a simulated model.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    state: Arc<RwLock<BusState>>,
}

/// Application part of a `app/N` unit name.
pub fn app_of(unit: &str) -> &str {
    unit.split_once('/').map_or(unit, |(app, _)| app)
}

impl MemoryBus {
    pub fn new(model: impl Into<String>) -> Self {
        let bus = Self::default();
        bus.write_state().model = model.into();
        bus
    }

    fn read_state(&self) -> RwLockReadGuard<'_, BusState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, BusState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a unit and return its view of the bus. The first unit of an
    /// application becomes its leader.
    pub fn add_unit(&self, unit: &str) -> MemoryPeer {
        let app = app_of(unit).to_string();
        let mut state = self.write_state();
        let address = format!(
            "10.0.0.{}",
            state.units.values().map(Vec::len).sum::<usize>().saturating_add(1)
        );
        let units = state.units.entry(app.clone()).or_default();
        if !units.iter().any(|u| u == unit) {
            units.push(unit.to_string());
        }
        state
            .leaders
            .entry(app.clone())
            .or_insert_with(|| unit.to_string());
        state
            .bind_addresses
            .entry(unit.to_string())
            .or_insert(address);
        MemoryPeer {
            bus: self.clone(),
            unit: unit.to_string(),
            app,
            model: state.model.clone(),
        }
    }

    /// Remove a unit from its application; leadership is not reassigned.
    pub fn remove_unit(&self, unit: &str) {
        let mut state = self.write_state();
        if let Some(units) = state.units.get_mut(app_of(unit)) {
            units.retain(|u| u != unit);
        }
    }

    pub fn set_leader(&self, unit: &str) {
        debug!("{unit} is now leader");
        self.write_state()
            .leaders
            .insert(app_of(unit).to_string(), unit.to_string());
    }

    pub fn set_bind_address(&self, unit: &str, address: Option<&str>) {
        let mut state = self.write_state();
        match address {
            Some(address) => {
                state
                    .bind_addresses
                    .insert(unit.to_string(), address.to_string());
            }
            None => {
                state.bind_addresses.remove(unit);
            }
        }
    }

    /// Establish a relation between two applications on `endpoint`.
    pub fn relate(&self, endpoint: &str, app_a: &str, app_b: &str) -> RelationId {
        let mut state = self.write_state();
        let id = RelationId(state.next_relation_id);
        state.next_relation_id = state.next_relation_id.saturating_add(1);
        state.relations.insert(
            id,
            RelationState {
                endpoint: endpoint.to_string(),
                apps: [app_a.to_string(), app_b.to_string()],
                breaking: false,
                databags: HashMap::new(),
            },
        );
        id
    }

    /// Start tearing a relation down: data stays, remote app names go.
    pub fn break_relation(&self, id: RelationId) {
        if let Some(relation) = self.write_state().relations.get_mut(&id) {
            relation.breaking = true;
        }
    }

    pub fn remove_relation(&self, id: RelationId) {
        self.write_state().relations.remove(&id);
    }

    /// Make every store call fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write_state().unavailable = unavailable;
    }

    /// Databag contents, bypassing permissions.
    pub fn raw(&self, id: RelationId, participant: &Participant) -> Option<String> {
        self.read_state()
            .relations
            .get(&id)
            .and_then(|relation| relation.databags.get(participant).cloned())
    }

    /// Overwrite a databag, bypassing permissions.
    pub fn set_raw(&self, id: RelationId, participant: Participant, data: &str) {
        if let Some(relation) = self.write_state().relations.get_mut(&id) {
            relation.databags.insert(participant, data.to_string());
        }
    }

    fn snapshot(state: &BusState, id: RelationId, local_app: &str) -> Option<Relation> {
        let relation = state.relations.get(&id)?;
        let remote = relation.remote_app(local_app)?;
        Some(Relation {
            id,
            name: relation.endpoint.clone(),
            app: Some(if relation.breaking {
                String::new()
            } else {
                remote.to_string()
            }),
            units: state.units.get(remote).cloned().unwrap_or_default(),
        })
    }
}

/// One unit's view of a [`MemoryBus`].
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    bus: MemoryBus,
    unit: String,
    app: String,
    model: String,
}

impl MemoryPeer {
    /// Snapshot of a relation as this unit sees it.
    pub fn relation(&self, id: RelationId) -> Option<Relation> {
        MemoryBus::snapshot(&self.bus.read_state(), id, &self.app)
    }

    fn check_readable(
        &self,
        state: &BusState,
        participant: &Participant,
    ) -> Result<(), StoreError> {
        let allowed = match participant {
            Participant::Unit(unit) => unit == &self.unit || app_of(unit) != self.app,
            Participant::App(app) => {
                app != &self.app || state.leaders.get(app) == Some(&self.unit)
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(StoreError::PermissionDenied(participant.to_string()))
        }
    }
}

impl PartitionStore for MemoryPeer {
    fn relations(&self, endpoint: &str) -> Vec<Relation> {
        let state = self.bus.read_state();
        state
            .relations
            .iter()
            .filter(|(_, relation)| relation.endpoint == endpoint)
            .filter_map(|(id, _)| MemoryBus::snapshot(&state, *id, &self.app))
            .collect()
    }

    fn read(
        &self,
        relation: RelationId,
        participant: &Participant,
    ) -> Result<Option<String>, StoreError> {
        let state = self.bus.read_state();
        if state.unavailable {
            return Err(StoreError::Unavailable("bus is down".to_string()));
        }
        let relation = state
            .relations
            .get(&relation)
            .ok_or(StoreError::UnknownRelation(relation))?;
        self.check_readable(&state, participant)?;
        Ok(relation.databags.get(participant).cloned())
    }

    fn write(
        &mut self,
        relation: RelationId,
        participant: &Participant,
        data: &str,
    ) -> Result<(), StoreError> {
        if !self.owner(participant) {
            return Err(StoreError::PermissionDenied(participant.to_string()));
        }
        let mut state = self.bus.write_state();
        if state.unavailable {
            return Err(StoreError::Unavailable("bus is down".to_string()));
        }
        let relation = state
            .relations
            .get_mut(&relation)
            .ok_or(StoreError::UnknownRelation(relation))?;
        relation.databags.insert(participant.clone(), data.to_string());
        Ok(())
    }

    fn owner(&self, participant: &Participant) -> bool {
        match participant {
            Participant::Unit(unit) => unit == &self.unit,
            Participant::App(app) => app == &self.app && self.is_leader(),
        }
    }
}

impl LocalPeer for MemoryPeer {
    fn unit_name(&self) -> &str {
        &self.unit
    }

    fn app_name(&self) -> &str {
        &self.app
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn is_leader(&self) -> bool {
        self.bus.read_state().leaders.get(&self.app) == Some(&self.unit)
    }

    fn bind_address(&self, _endpoint: &str) -> Option<String> {
        self.bus.read_state().bind_addresses.get(&self.unit).cloned()
    }
}
