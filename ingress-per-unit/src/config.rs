//! Configuration for the ingress-per-unit endpoints.

use {
    crate::error::{IngressError, Result},
    serde::{Deserialize, Serialize},
};

/// Interface contract name both sides of the relation declare.
pub const RELATION_INTERFACE: &str = "ingress_per_unit";

/// Endpoint name used when none is configured.
pub const DEFAULT_RELATION_NAME: &str = "ingress-per-unit";

/// Marker older requirers look for in the provider's application data.
pub const LEGACY_SUPPORTED_VERSIONS: &str = "- v1";

/// Settings shared by the provider and requirer endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Endpoint (relation) name to bind to.
    /// Default: `ingress-per-unit`
    pub endpoint: String,

    /// Whether the provider leader shares the legacy `_supported_versions`
    /// marker when a requirer unit joins.
    pub share_supported_versions: bool,

    /// Value of the legacy marker.
    pub supported_versions: String,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RELATION_NAME.to_string(),
            share_supported_versions: true,
            supported_versions: LEGACY_SUPPORTED_VERSIONS.to_string(),
        }
    }
}

impl IngressConfig {
    /// Same defaults, bound to a different endpoint name.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Parse a YAML document; omitted fields keep their defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(IngressError::InvalidConfig {
                reason: "endpoint name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Create a config suitable for local testing.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default() -> Self {
        Self::with_endpoint("ingress")
    }
}
