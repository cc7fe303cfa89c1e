//! Requirer side of the relation.
//!
//! Every requirer unit publishes its own `model`, `name`, `host` and `port`
//! and reads back the url the provider assigned to it. The endpoint is
//! limited to a single relation.

use {
    crate::{
        config::IngressConfig,
        endpoint::IngressEndpoint,
        error::{IngressError, Result},
        event::{HookEvent, IngressEvent},
        relation::{Environment, Participant, Relation},
        schema::{self, validate_provider, validate_requirer, RequirerData},
    },
    log::{debug, info, warn},
    std::collections::BTreeMap,
};

/// The requiring end of an `ingress_per_unit` relation.
pub struct IngressPerUnitRequirer<E> {
    env: E,
    config: IngressConfig,
    /// Host (resolved lazily when `None`) and port to publish whenever the
    /// relation becomes available.
    auto_data: Option<(Option<String>, u16)>,
    is_relation_broken: bool,
}

impl<E: Environment> IngressPerUnitRequirer<E> {
    pub fn new(env: E, config: IngressConfig) -> Self {
        Self {
            env,
            config,
            auto_data: None,
            is_relation_broken: false,
        }
    }

    /// Publish `host` and `port` automatically. A zero port disables it.
    pub fn with_auto_publish(mut self, host: Option<&str>, port: u16) -> Self {
        if port != 0 {
            self.auto_data = Some((host.map(str::to_string), port));
        }
        self
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// The relation of this endpoint, if established.
    pub fn relation(&self) -> Option<Relation> {
        self.relations().into_iter().next()
    }

    pub fn is_relation_broken(&self) -> bool {
        self.is_relation_broken
    }

    /// Publish this unit's address to the provider.
    ///
    /// Without a host, the address bound to the endpoint is looked up now,
    /// so it follows changes between calls.
    pub fn request(&mut self, host: Option<&str>, port: u16) -> Result<()> {
        let relation = self.relation().ok_or_else(|| IngressError::NoRelation {
            endpoint: self.config.endpoint.clone(),
        })?;
        self.publish_to(&relation, host, port)
    }

    fn publish_to(&mut self, relation: &Relation, host: Option<&str>, port: u16) -> Result<()> {
        let host = match host.filter(|host| !host.is_empty()) {
            Some(host) => host.to_string(),
            None => self
                .env
                .bind_address(&self.config.endpoint)
                .ok_or_else(|| IngressError::BindAddress {
                    endpoint: self.config.endpoint.clone(),
                })?,
        };
        let data = RequirerData {
            model: self.env.model_name().to_string(),
            name: self.env.unit_name().to_string(),
            host,
            port: i64::from(port),
        };
        let text = schema::serialize(&data)?;
        let unit = Participant::Unit(data.name.clone());
        self.env.write(relation.id, &unit, &text)?;
        info!(
            "published {}:{} for {} on relation {relation}",
            data.host, data.port, data.name
        );
        Ok(())
    }

    fn publish_auto_data(&mut self, relation: &Relation) -> Result<()> {
        let Some((host, port)) = self.auto_data.clone() else {
            return Ok(());
        };
        if !self.is_available(Some(relation)) {
            debug!("relation {relation} not available, skipping auto-publish");
            return Ok(());
        }
        self.publish_to(relation, host.as_deref(), port)
    }

    fn urls_for(&self, relation: &Relation) -> Result<BTreeMap<String, String>> {
        if self.is_relation_broken {
            return Ok(BTreeMap::new());
        }
        let Some(remote_app) = relation.remote_app() else {
            return Ok(BTreeMap::new());
        };
        let raw = self
            .env
            .read(relation.id, &Participant::App(remote_app.to_string()))?;
        let Some(value) = schema::parse_databag(raw.as_deref())? else {
            return Ok(BTreeMap::new());
        };
        Ok(validate_provider(&value)?
            .ingress
            .into_iter()
            .map(|(unit, ingress)| (unit, ingress.url))
            .collect())
    }

    /// Unit name → url for every unit of this application the provider
    /// has published a url for.
    pub fn urls(&self) -> Result<BTreeMap<String, String>> {
        match self.relation() {
            Some(relation) => self.urls_for(&relation),
            None => Ok(BTreeMap::new()),
        }
    }

    /// The url published for this unit.
    pub fn url(&self) -> Result<Option<String>> {
        Ok(self.urls()?.remove(self.env.unit_name()))
    }
}

impl<E: Environment> IngressEndpoint for IngressPerUnitRequirer<E> {
    fn config(&self) -> &IngressConfig {
        &self.config
    }

    fn relations(&self) -> Vec<Relation> {
        self.env.relations(&self.config.endpoint)
    }

    fn relation_ready(&self, relation: &Relation) -> bool {
        match self.urls_for(relation) {
            Ok(mut urls) => urls
                .remove(self.env.unit_name())
                .is_some_and(|url| !url.is_empty()),
            Err(err) => {
                warn!("cannot read ingress urls on relation {relation}: {err}");
                false
            }
        }
    }

    fn check_relation(&self, relation: &Relation) -> Result<()> {
        if self.relations().is_empty() {
            return Ok(());
        }
        if relation.remote_app().is_none() || relation.units.is_empty() {
            // Breaking, or no provider unit to talk to yet.
            return Ok(());
        }
        let unit = Participant::Unit(self.env.unit_name().to_string());
        let raw = self.env.read(relation.id, &unit)?;
        if let Some(value) = schema::parse_databag(raw.as_deref())? {
            validate_requirer(&value)?;
        }
        Ok(())
    }

    fn on_relation(&mut self, event: &HookEvent, relation: &Relation) -> Result<Vec<IngressEvent>> {
        if matches!(event, HookEvent::RelationCreated(_)) {
            self.is_relation_broken = false;
        }
        self.publish_auto_data(relation)?;
        let mut events: Vec<IngressEvent> = self.classify(relation).into_iter().collect();
        if matches!(event, HookEvent::RelationChanged(_)) {
            events.push(IngressEvent::IngressChanged(relation.id));
        }
        Ok(events)
    }

    fn on_relation_broken(&mut self, relation: &Relation) -> Result<Vec<IngressEvent>> {
        self.is_relation_broken = true;
        Ok(vec![
            IngressEvent::Broken(relation.id),
            IngressEvent::IngressChanged(relation.id),
        ])
    }

    /// A config reload may have changed the address to publish.
    fn on_upgrade_or_leader(&mut self) -> Result<Vec<IngressEvent>> {
        for relation in self.relations() {
            self.publish_auto_data(&relation)?;
        }
        Ok(Vec::new())
    }
}
