//! Provider side of the relation.
//!
//! The provider aggregates the records published by every requirer unit,
//! checks them for consistency, and lets the application publish back one
//! url per unit. Only the leader unit of the provider application writes the
//! application databag; every write path checks leadership first and raises
//! [`IngressError::RelationPermission`] otherwise.
//!
//! Reads and writes deliberately treat a corrupt application databag
//! differently: [`IngressPerUnitProvider::fetch`] with validation fails the
//! whole read, while [`IngressPerUnitProvider::publish_url`] starts over from
//! an empty document so that new units can still get a url.

use {
    crate::{
        config::IngressConfig,
        endpoint::IngressEndpoint,
        error::{IngressError, Result},
        event::{HookEvent, IngressEvent},
        relation::{Environment, Participant, Relation},
        schema::{
            self, validate_provider, validate_requirer, IngressMap, ProviderIngressData,
            RequirerUnitData, UnitIngress,
        },
    },
    log::{error, info, warn},
    std::collections::BTreeMap,
};

/// Requirer unit name → what that unit published.
pub type RequirerUnits = BTreeMap<String, RequirerUnitData>;

/// The providing end of an `ingress_per_unit` relation.
pub struct IngressPerUnitProvider<E> {
    env: E,
    config: IngressConfig,
}

impl<E: Environment> IngressPerUnitProvider<E> {
    pub fn new(env: E, config: IngressConfig) -> Self {
        Self { env, config }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    fn app(&self) -> Participant {
        Participant::App(self.env.app_name().to_string())
    }

    /// Read the provider application data and every requirer unit's data.
    ///
    /// Only the leader can read its own application databag; other units get
    /// an empty map in its place. Units that have not published anything yet
    /// map to empty data. With `validate`, any non-empty databag that does not
    /// match its schema fails the whole read.
    pub fn fetch(
        &self,
        relation: &Relation,
        validate: bool,
    ) -> Result<(IngressMap, RequirerUnits)> {
        if relation.remote_app().is_none() {
            // Relation is breaking; there is nothing left to read.
            return Ok((IngressMap::new(), RequirerUnits::new()));
        }

        let mut provider_data = IngressMap::new();
        if self.env.is_leader() {
            let raw = self.env.read(relation.id, &self.app())?;
            if let Some(value) = schema::parse_databag(raw.as_deref())? {
                provider_data = if validate {
                    validate_provider(&value)?.ingress
                } else {
                    ProviderIngressData::from_value_lenient(&value).ingress
                };
            }
        }

        let mut requirer_data = RequirerUnits::new();
        for unit in &relation.units {
            let data = self.read_unit(relation, unit, validate)?;
            requirer_data.insert(unit.clone(), data);
        }

        Ok((provider_data, requirer_data))
    }

    fn read_unit(
        &self,
        relation: &Relation,
        unit: &str,
        validate: bool,
    ) -> Result<RequirerUnitData> {
        let raw = self
            .env
            .read(relation.id, &Participant::Unit(unit.to_string()))?;
        match schema::parse_databag(raw.as_deref())? {
            None => Ok(RequirerUnitData::default()),
            Some(value) => {
                if validate {
                    validate_requirer(&value)?;
                }
                Ok(RequirerUnitData::from_value(value))
            }
        }
    }

    fn check_unit(&self, relation: &Relation, unit: &str) -> Result<()> {
        if relation.has_unit(unit) {
            Ok(())
        } else {
            Err(IngressError::UnknownUnit {
                relation: relation.into(),
                unit: unit.to_string(),
            })
        }
    }

    /// Whether the given requirer unit has published its side of the data.
    pub fn is_unit_ready(&self, relation: &Relation, unit: &str) -> Result<bool> {
        self.check_unit(relation, unit)?;
        let raw = self
            .env
            .read(relation.id, &Participant::Unit(unit.to_string()))?;
        Ok(raw.is_some_and(|raw| !raw.trim().is_empty()))
    }

    /// The data published by one requirer unit.
    pub fn get_data(
        &self,
        relation: &Relation,
        unit: &str,
        validate: bool,
    ) -> Result<RequirerUnitData> {
        self.check_unit(relation, unit)?;
        self.read_unit(relation, unit, validate)
    }

    fn ensure_leader(&self, relation: &Relation) -> Result<()> {
        if self.env.is_leader() {
            Ok(())
        } else {
            Err(IngressError::RelationPermission {
                relation: relation.into(),
                entity: self.env.unit_name().to_string(),
                message: "This unit is not the leader".to_string(),
            })
        }
    }

    /// Current application document; anything unreadable as a valid
    /// document is replaced by an empty one.
    fn current_or_empty(&self, relation: &Relation) -> Result<ProviderIngressData> {
        let raw = self.env.read(relation.id, &self.app())?;
        let parsed = schema::parse_databag(raw.as_deref())
            .and_then(|value| value.as_ref().map(validate_provider).transpose());
        match parsed {
            Ok(data) => Ok(data.unwrap_or_default()),
            Err(err) => {
                error!("corrupted application databag on relation {relation}, resetting: {err}");
                Ok(ProviderIngressData::default())
            }
        }
    }

    fn write_app_data(&mut self, relation: &Relation, data: &ProviderIngressData) -> Result<()> {
        let text = schema::serialize(data)?;
        let app = self.app();
        self.env.write(relation.id, &app, &text)?;
        Ok(())
    }

    /// Publish the url of a single requirer unit, keeping the others.
    pub fn publish_url(&mut self, relation: &Relation, unit_name: &str, url: &str) -> Result<()> {
        self.ensure_leader(relation)?;
        let mut data = self.current_or_empty(relation)?;
        data.ingress
            .insert(unit_name.to_string(), UnitIngress::new(url));
        self.write_app_data(relation, &data)?;
        info!("published ingress url for {unit_name} on relation {relation}");
        Ok(())
    }

    /// Replace every published url with `ingress` in a single write.
    pub fn publish_all(&mut self, relation: &Relation, ingress: IngressMap) -> Result<()> {
        self.ensure_leader(relation)?;
        let supported_versions = self.current_or_empty(relation)?.supported_versions;
        let data = ProviderIngressData {
            ingress,
            supported_versions,
        };
        validate_provider(&serde_yaml::to_value(&data)?)?;
        self.write_app_data(relation, &data)?;
        info!(
            "published {} ingress urls on relation {relation}",
            data.ingress.len()
        );
        Ok(())
    }

    /// Remove everything this application published on the relation.
    pub fn wipe(&mut self, relation: &Relation) -> Result<()> {
        self.ensure_leader(relation)?;
        let app = self.app();
        self.env.write(relation.id, &app, "")?;
        info!("wiped ingress data on relation {relation}");
        Ok(())
    }

    /// Shim for requirers that still negotiate versions through
    /// `_supported_versions`. Non-leaders skip it.
    pub fn share_version_info(&mut self, relation: &Relation) -> Result<()> {
        if !self.config.share_supported_versions || !self.env.is_leader() {
            return Ok(());
        }
        let mut data = self.current_or_empty(relation)?;
        data.supported_versions = Some(self.config.supported_versions.clone());
        self.write_app_data(relation, &data)?;
        info!("shared supported_versions shim information on relation {relation}");
        Ok(())
    }

    /// Urls published on every relation, merged into one map.
    pub fn proxied_endpoints(&self) -> IngressMap {
        let mut results = IngressMap::new();
        for relation in self.relations() {
            match self.fetch(&relation, false) {
                Ok((provider_data, _)) => results.extend(provider_data),
                Err(err) => warn!("cannot fetch ingress data for relation {relation}: {err}"),
            }
        }
        results
    }
}

impl<E: Environment> IngressEndpoint for IngressPerUnitProvider<E> {
    fn config(&self) -> &IngressConfig {
        &self.config
    }

    fn relations(&self) -> Vec<Relation> {
        self.env.relations(&self.config.endpoint)
    }

    /// Ready as soon as some requirer unit published something.
    fn relation_ready(&self, relation: &Relation) -> bool {
        match self.fetch(relation, false) {
            Ok((_, requirer_data)) => requirer_data.values().any(|data| !data.is_empty()),
            Err(err) => {
                warn!("cannot fetch ingress data for relation {relation}: {err}");
                false
            }
        }
    }

    fn check_relation(&self, relation: &Relation) -> Result<()> {
        if relation.remote_app().is_none() || relation.units.is_empty() {
            // A relation without requirer units cannot be failed.
            return Ok(());
        }

        let (_, requirer_data) = self.fetch(relation, true)?;

        // All requirer units must agree on the model. The port may differ
        // while the requirer rolls out a config change or an upgrade.
        let mut expected_model: Option<&str> = None;
        for unit in &relation.units {
            let Some(model) = requirer_data.get(unit).and_then(RequirerUnitData::model) else {
                continue;
            };
            match expected_model.filter(|expected| !expected.is_empty()) {
                Some(expected) if expected != model => {
                    return Err(IngressError::RelationDataMismatch {
                        relation: relation.into(),
                        entity: unit.clone(),
                    })
                }
                Some(_) => {}
                None => expected_model = Some(model),
            }
        }
        Ok(())
    }

    fn on_relation(&mut self, event: &HookEvent, relation: &Relation) -> Result<Vec<IngressEvent>> {
        let mut events: Vec<IngressEvent> = self.classify(relation).into_iter().collect();
        if events.contains(&IngressEvent::Ready(relation.id)) {
            events.push(IngressEvent::Request(relation.id));
        }
        if matches!(event, HookEvent::RelationJoined { .. }) {
            if let Err(err) = self.share_version_info(relation) {
                warn!("failed to share supported versions on relation {relation}: {err}");
            }
        }
        Ok(events)
    }
}
