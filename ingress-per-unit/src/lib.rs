//! # Ingress per unit
//!
//! Negotiation of one routable url per unit between a group of **requirer**
//! units and a **provider** application (typically a reverse proxy).
//!
//! Each requirer unit publishes its own `model`, `name`, `host` and `port`
//! into its unit databag. The leader of the provider application aggregates
//! those records, checks that all units agree on the model, and publishes a
//! url per unit into its application databag. Both sides watch the relation
//! and raise `Available`, `Ready` or `Failed` transitions as the data
//! settles.
//!
//! ## Quick start
//!
//! ```rust
//! use ingress_per_unit::{
//!     memory::MemoryBus, HookEvent, IngressConfig, IngressEndpoint, IngressEvent,
//!     IngressPerUnitProvider, IngressPerUnitRequirer,
//! };
//!
//! let bus = MemoryBus::new("my-model");
//! let proxy = bus.add_unit("traefik/0");
//! let app = bus.add_unit("app/0");
//! bus.set_bind_address("app/0", Some("10.1.1.5"));
//! let id = bus.relate("ingress", "traefik", "app");
//!
//! let mut requirer = IngressPerUnitRequirer::new(app, IngressConfig::dev_default())
//!     .with_auto_publish(None, 8080);
//! let mut provider = IngressPerUnitProvider::new(proxy, IngressConfig::dev_default());
//!
//! // The requirer publishes its address as soon as the relation exists.
//! let relation = requirer.env().relation(id).unwrap();
//! requirer.handle(&HookEvent::RelationCreated(relation.clone())).unwrap();
//!
//! // The provider sees a ready requirer and answers with a url.
//! let seen = provider.env().relation(id).unwrap();
//! let events = provider.handle(&HookEvent::RelationChanged(seen.clone())).unwrap();
//! assert!(events.contains(&IngressEvent::Request(id)));
//! provider.publish_url(&seen, "app/0", "http://proxy/app-0").unwrap();
//!
//! requirer.handle(&HookEvent::RelationChanged(relation)).unwrap();
//! assert_eq!(requirer.url().unwrap().as_deref(), Some("http://proxy/app-0"));
//! ```
//!
//! ## Crate modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`]   | `IngressConfig` defaults and YAML loading |
//! | [`relation`] | Relation snapshots and the store/peer collaborator traits |
//! | [`schema`]   | Databag schemas, validation, YAML (de)serialisation |
//! | [`endpoint`] | Shared readiness predicates and event classification |
//! | [`provider`] | The provider role |
//! | [`requirer`] | The requirer role |
//! | [`event`]    | Incoming hook events and outgoing transitions |
//! | [`error`]    | Crate-wide error enum |

pub mod config;
pub mod endpoint;
pub mod error;
pub mod event;
#[cfg(any(test, feature = "dev-context-only-utils"))]
pub mod memory;
pub mod provider;
pub mod relation;
pub mod requirer;
pub mod schema;

// Re-exports for convenience.
pub use config::IngressConfig;
pub use endpoint::{IngressEndpoint, RelationStatus};
pub use error::{IngressError, Result, StoreError};
pub use event::{HookEvent, IngressEvent};
pub use provider::IngressPerUnitProvider;
pub use relation::{Environment, LocalPeer, Participant, PartitionStore, Relation, RelationId};
pub use requirer::IngressPerUnitRequirer;
pub use schema::{ProviderIngressData, RequirerData, RequirerUnitData, UnitIngress};
