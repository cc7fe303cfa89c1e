//! Wire types, YAML ser/de and structural validation.
//!
//! Every databag on the relation carries a single YAML document. Requirer
//! units write a [`RequirerData`] record to their own unit databag; the
//! provider leader writes a [`ProviderIngressData`] document to its
//! application databag.
//!
//! Reads go through a loosely-typed [`serde_yaml::Value`] first so that the
//! validated and unvalidated paths see the same document. Validation is
//! structural only: required fields must be present with the right YAML
//! type, and nothing is coerced.

use {
    crate::error::{IngressError, Result, Schema},
    serde::{Deserialize, Serialize},
    serde_yaml::{Mapping, Value},
    std::collections::BTreeMap,
};

const LEGACY_VERSIONS_KEY: &str = "_supported_versions";

// ── Requirer side ───────────────────────────────────────────────────────────

/// What a requirer unit publishes about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirerData {
    /// Model the requirer unit lives in.
    pub model: String,
    /// Unit name, e.g. `app/0`.
    pub name: String,
    /// Host the provider should route to.
    pub host: String,
    /// Port the provider should route to. Any integer is accepted here;
    /// whether it is routable is up to the provider.
    pub port: i64,
}

/// A requirer databag as read, before validation.
///
/// Units may not have written yet, or may have written only part of their
/// record; the accessors return `None` for anything absent or of the wrong
/// type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequirerUnitData(Value);

impl RequirerUnitData {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Whether the unit has published anything at all.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Mapping(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.0.get("model").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn host(&self) -> Option<&str> {
        self.0.get("host").and_then(Value::as_str)
    }

    pub fn port(&self) -> Option<i64> {
        self.0.get("port").and_then(Value::as_i64)
    }

    /// Check the document against the requirer schema and return the
    /// typed record.
    pub fn validate(&self) -> Result<RequirerData> {
        validate_requirer(&self.0)
    }
}

impl From<RequirerData> for RequirerUnitData {
    fn from(data: RequirerData) -> Self {
        let mut map = Mapping::new();
        map.insert("model".into(), data.model.into());
        map.insert("name".into(), data.name.into());
        map.insert("host".into(), data.host.into());
        map.insert("port".into(), Value::Number(data.port.into()));
        Self(Value::Mapping(map))
    }
}

/// Validate a requirer unit document.
pub fn validate_requirer(value: &Value) -> Result<RequirerData> {
    let map = value
        .as_mapping()
        .ok_or_else(|| IngressError::validation(Schema::RequirerUnit, "expected a mapping"))?;
    let port = match map.get("port") {
        None => return Err(missing(Schema::RequirerUnit, "port")),
        // Integers past i64::MAX are the only ones not representable.
        Some(Value::Number(n)) if n.is_u64() || n.is_i64() => n.as_i64().ok_or_else(|| {
            IngressError::validation(Schema::RequirerUnit, format!("port {n} is out of range"))
        })?,
        Some(other) => {
            return Err(IngressError::validation(
                Schema::RequirerUnit,
                format!("port must be an integer, got {}", type_name(other)),
            ))
        }
    };
    Ok(RequirerData {
        model: required_str(map, "model", Schema::RequirerUnit)?,
        name: required_str(map, "name", Schema::RequirerUnit)?,
        host: required_str(map, "host", Schema::RequirerUnit)?,
        port,
    })
}

// ── Provider side ───────────────────────────────────────────────────────────

/// The url handed to one requirer unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitIngress {
    pub url: String,
}

impl UnitIngress {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Unit name → url, as published by the provider.
pub type IngressMap = BTreeMap<String, UnitIngress>;

/// The provider application databag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderIngressData {
    pub ingress: IngressMap,
    /// Legacy marker for requirers that negotiate versions. Never required.
    #[serde(
        rename = "_supported_versions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub supported_versions: Option<String>,
}

impl ProviderIngressData {
    pub fn new(ingress: IngressMap) -> Self {
        Self {
            ingress,
            supported_versions: None,
        }
    }

    /// Best-effort read used where the document is not validated: keeps the
    /// entries that carry a string url and drops everything else.
    pub fn from_value_lenient(value: &Value) -> Self {
        let mut ingress = IngressMap::new();
        if let Some(entries) = value.get("ingress").and_then(Value::as_mapping) {
            for (unit, entry) in entries {
                let url = entry.get("url").and_then(Value::as_str);
                match (unit.as_str(), url) {
                    (Some(unit), Some(url)) => {
                        ingress.insert(unit.to_string(), UnitIngress::new(url));
                    }
                    _ => log::debug!("skipping malformed ingress entry {:?}", unit),
                }
            }
        }
        Self {
            ingress,
            supported_versions: value
                .get(LEGACY_VERSIONS_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Validate a provider application document.
pub fn validate_provider(value: &Value) -> Result<ProviderIngressData> {
    let map = value
        .as_mapping()
        .ok_or_else(|| IngressError::validation(Schema::ProviderApp, "expected a mapping"))?;
    let entries = match map.get("ingress") {
        None => return Err(missing(Schema::ProviderApp, "ingress")),
        Some(Value::Mapping(entries)) => entries,
        Some(other) => {
            return Err(IngressError::validation(
                Schema::ProviderApp,
                format!("ingress must be a mapping, got {}", type_name(other)),
            ))
        }
    };

    let mut ingress = IngressMap::new();
    for (unit, entry) in entries {
        let unit = unit.as_str().ok_or_else(|| {
            IngressError::validation(Schema::ProviderApp, "ingress keys must be strings")
        })?;
        let entry = entry.as_mapping().ok_or_else(|| {
            IngressError::validation(
                Schema::ProviderApp,
                format!("ingress entry for {unit} must be a mapping"),
            )
        })?;
        let url = required_str(entry, "url", Schema::ProviderApp)?;
        optional_str(entry, LEGACY_VERSIONS_KEY, Schema::ProviderApp)?;
        ingress.insert(unit.to_string(), UnitIngress { url });
    }

    Ok(ProviderIngressData {
        ingress,
        // Readers ignore the top-level marker, whatever its type.
        supported_versions: map
            .get(LEGACY_VERSIONS_KEY)
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

// ── Serialisation helpers ───────────────────────────────────────────────────

/// Parse a databag, `None` if nothing was ever published to it (absent,
/// blank or `null`).
pub fn parse_databag(raw: Option<&str>) -> Result<Option<Value>> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(None);
    };
    match serde_yaml::from_str::<Value>(raw)? {
        Value::Null => Ok(None),
        value => Ok(Some(value)),
    }
}

/// Parse a databag. Absent, blank and `null` documents are an empty
/// mapping.
pub fn deserialize(raw: Option<&str>) -> Result<Value> {
    Ok(parse_databag(raw)?.unwrap_or_else(|| Value::Mapping(Mapping::new())))
}

/// Render a databag. Nested mappings are indented by two spaces.
pub fn serialize<T: Serialize>(data: &T) -> Result<String> {
    Ok(serde_yaml::to_string(data)?)
}

// ── Internals ───────────────────────────────────────────────────────────────

fn missing(schema: Schema, field: &str) -> IngressError {
    IngressError::validation(schema, format!("missing required field '{field}'"))
}

fn required_str(map: &Mapping, field: &str, schema: Schema) -> Result<String> {
    optional_str(map, field, schema)?.ok_or_else(|| missing(schema, field))
}

fn optional_str(map: &Mapping, field: &str, schema: Schema) -> Result<Option<String>> {
    match map.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(IngressError::validation(
            schema,
            format!("{field} must be a string, got {}", type_name(other)),
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "array",
        Value::Mapping(_) => "object",
        Value::Tagged(_) => "tagged value",
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
