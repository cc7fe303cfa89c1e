//! E2E Test: Data Consistency
//!
//! Verifies how both sides react to bad data on the bus:
//! - Requirer units disagreeing on the model
//! - Requirer records that do not match their schema
//! - A corrupt provider application databag
//! - The store itself going away

use {
    assert_matches::assert_matches,
    ingress_per_unit::{
        HookEvent, IngressEndpoint, IngressError, IngressEvent, Participant, RelationStatus,
        StoreError,
    },
    ingress_per_unit_e2e_tests::helpers::*,
};

fn set_unit_data(dep: &SimDeployment, index: usize, data: &str) {
    dep.bus.set_raw(
        dep.relation_id,
        Participant::Unit(requirer_unit(index)),
        data,
    );
}

#[test]
fn test_model_mismatch_blocks_provider() {
    init_logging();
    let mut dep = SimDeployment::new(1, 3, 8080);
    let id = dep.relation_id;
    dep.create();
    set_unit_data(
        &dep,
        2,
        "model: other-model\nname: app/2\nhost: 10.20.0.2\nport: 8080\n",
    );

    let rel = dep.provider_relation(0);
    let provider = &dep.providers[0];
    let err = provider.check_relation(&rel).unwrap_err();
    assert_matches!(
        &err,
        IngressError::RelationDataMismatch { entity, .. } if entity == "app/2"
    );
    assert_eq!(
        err.to_string(),
        format!("There is an error with the relation {ENDPOINT}:{id} with app/2")
    );
    assert!(provider.is_failed(Some(&rel)));
    assert_eq!(
        provider.get_status(&rel),
        RelationStatus::Blocked(format!("Error handling relation {ENDPOINT}:{id}"))
    );
    // Readiness still takes precedence when classifying.
    assert_eq!(provider.classify(&rel), Some(IngressEvent::Ready(id)));
}

#[test]
fn test_ports_may_differ() {
    init_logging();
    let mut dep = SimDeployment::new(1, 2, 8080);
    dep.create();
    dep.requirers[1].request(None, 9090).unwrap();

    let rel = dep.provider_relation(0);
    let (_, requirer_data) = dep.providers[0].fetch(&rel, true).unwrap();
    assert_eq!(requirer_data["app/0"].port(), Some(8080));
    assert_eq!(requirer_data["app/1"].port(), Some(9090));
    assert!(!dep.providers[0].is_failed(Some(&rel)));
}

#[test]
fn test_unusual_integer_port_is_accepted() {
    init_logging();
    let mut dep = SimDeployment::new(1, 1, 8080);
    dep.create();
    set_unit_data(
        &dep,
        0,
        "model: sim-model\nname: app/0\nhost: 10.20.0.0\nport: 70000\n",
    );

    let rel = dep.provider_relation(0);
    assert!(!dep.providers[0].is_failed(Some(&rel)));
    assert_eq!(dep.providers[0].get_status(&rel), RelationStatus::Active);
    assert!(!dep.requirers[0].is_failed(None));
}

#[test]
fn test_invalid_requirer_data() {
    init_logging();
    let mut dep = SimDeployment::new(1, 2, 8080);
    dep.create();
    set_unit_data(
        &dep,
        1,
        "model: sim-model\nname: app/1\nhost: 10.20.0.1\nport: eighty\n",
    );

    let rel = dep.provider_relation(0);
    let provider = &dep.providers[0];
    assert_matches!(
        provider.fetch(&rel, true),
        Err(IngressError::DataValidation { .. })
    );
    let (_, requirer_data) = provider.fetch(&rel, false).unwrap();
    assert_eq!(requirer_data.len(), 2);
    assert_eq!(requirer_data["app/1"].port(), None);
    assert!(provider.is_failed(Some(&rel)));

    assert!(dep.requirers[1].is_failed(Some(&dep.requirer_relation(1))));
    assert!(!dep.requirers[0].is_failed(Some(&dep.requirer_relation(0))));
}

#[test]
fn test_corrupt_provider_data_is_reset_on_publish() {
    init_logging();
    let mut dep = SimDeployment::new(1, 2, 8080);
    dep.create();
    dep.publish_urls();
    dep.bus.set_raw(
        dep.relation_id,
        Participant::App(PROVIDER_APP.to_string()),
        "ingress: [not, a, mapping]\n",
    );

    assert_matches!(
        dep.requirers[0].urls(),
        Err(IngressError::DataValidation { .. })
    );
    assert!(!dep.requirers[0].is_ready(None));

    let rel = dep.provider_relation(0);
    assert!(dep.leader().fetch(&rel, true).is_err());
    dep.leader()
        .publish_url(&rel, "app/0", &url_for("app/0"))
        .unwrap();

    dep.change();
    let urls = dep.requirers[0].urls().unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(dep.requirers[0].url().unwrap(), Some(url_for("app/0")));
    assert_eq!(dep.requirers[1].url().unwrap(), None);
}

#[test]
fn test_store_outage() {
    init_logging();
    let mut dep = SimDeployment::new(1, 1, 8080);
    let id = dep.relation_id;
    dep.create();
    dep.publish_urls();
    dep.change();

    let requirer_rel = dep.requirer_relation(0);
    let provider_rel = dep.provider_relation(0);
    dep.bus.set_unavailable(true);

    assert!(!dep.providers[0].is_ready(None));
    assert!(dep.providers[0].is_failed(None));
    assert!(dep.requirers[0].is_failed(None));
    assert!(!dep.requirers[0].is_ready(None));
    assert_eq!(
        dep.providers[0]
            .handle(&HookEvent::RelationChanged(provider_rel))
            .unwrap(),
        vec![IngressEvent::Available(id)]
    );
    assert_matches!(
        dep.requirers[0].handle(&HookEvent::RelationChanged(requirer_rel)),
        Err(IngressError::Store(StoreError::Unavailable(_)))
    );

    dep.bus.set_unavailable(false);
    let observed = dep.change();
    assert_eq!(
        events_of(&observed, &requirer_unit(0)),
        vec![
            IngressEvent::Ready(id),
            IngressEvent::IngressChanged(id)
        ]
    );
}
