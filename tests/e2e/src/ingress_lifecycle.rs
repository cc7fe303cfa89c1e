//! E2E Test: Ingress Lifecycle
//!
//! Verifies the happy path end to end:
//! - Requirer units publish their address as soon as the relation exists
//! - Provider units see the requests and become ready
//! - The provider leader publishes one url per unit
//! - Every requirer unit reads back exactly its own url

use {
    assert_matches::assert_matches,
    ingress_per_unit::{
        schema, HookEvent, IngressEndpoint, IngressError, IngressEvent, RelationStatus,
    },
    ingress_per_unit_e2e_tests::helpers::*,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test: Auto-published requests get urls back
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_full_ingress_lifecycle() {
    init_logging();
    let mut dep = SimDeployment::new(2, 3, 8080);
    let id = dep.relation_id;

    let observed = dep.create();
    for i in 0..3 {
        assert_eq!(
            events_of(&observed, &requirer_unit(i)),
            vec![IngressEvent::Available(id)]
        );
        let published = schema::validate_requirer(
            &schema::deserialize(dep.requirer_databag(i).as_deref()).unwrap(),
        )
        .unwrap();
        assert_eq!(published.model, MODEL);
        assert_eq!(published.name, requirer_unit(i));
        assert_eq!(published.host, requirer_address(i));
        assert_eq!(published.port, 8080);
    }
    // Followers can read requirer data too, only the leader can write.
    for i in 0..2 {
        assert_eq!(
            events_of(&observed, &provider_unit(i)),
            vec![IngressEvent::Ready(id), IngressEvent::Request(id)]
        );
    }

    dep.join_all();
    assert!(dep
        .provider_databag()
        .unwrap()
        .contains("_supported_versions"));

    dep.publish_urls();
    let observed = dep.change();
    for i in 0..3 {
        let unit = requirer_unit(i);
        assert_eq!(
            events_of(&observed, &unit),
            vec![
                IngressEvent::Ready(id),
                IngressEvent::IngressChanged(id)
            ]
        );
        let requirer = &dep.requirers[i];
        assert_eq!(requirer.url().unwrap(), Some(url_for(&unit)));
        assert_eq!(requirer.urls().unwrap().len(), 3);
        assert_eq!(
            requirer.get_status(&dep.requirer_relation(i)),
            RelationStatus::Active
        );
    }

    let rel = dep.provider_relation(0);
    assert_eq!(dep.providers[0].get_status(&rel), RelationStatus::Active);
    assert_eq!(dep.providers[0].proxied_endpoints().len(), 3);
    // The follower cannot read its own application databag.
    assert!(dep.providers[1].proxied_endpoints().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: Explicit requests without auto-publishing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_explicit_request() {
    init_logging();
    let mut dep = SimDeployment::new(1, 2, 0);
    let id = dep.relation_id;

    let observed = dep.create();
    assert_eq!(
        events_of(&observed, &provider_unit(0)),
        vec![IngressEvent::Available(id)]
    );
    assert_eq!(dep.requirer_databag(0), None);

    dep.requirers[0]
        .request(Some("app-0.internal"), 9000)
        .unwrap();
    let observed = dep.change();
    assert_eq!(
        events_of(&observed, &provider_unit(0)),
        vec![IngressEvent::Ready(id), IngressEvent::Request(id)]
    );

    let rel = dep.provider_relation(0);
    let provider = &dep.providers[0];
    let data = provider.get_data(&rel, "app/0", true).unwrap();
    assert_eq!(data.host(), Some("app-0.internal"));
    assert_eq!(data.port(), Some(9000));
    assert!(provider.get_data(&rel, "app/1", true).unwrap().is_empty());
    assert_matches!(
        provider.get_data(&rel, "other/0", true),
        Err(IngressError::UnknownUnit { unit, .. }) if unit == "other/0"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: Scaling the requirer up keeps the urls already handed out
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_scale_up_requirer() {
    init_logging();
    let mut dep = SimDeployment::new(1, 2, 8080);
    dep.create();
    dep.publish_urls();
    dep.change();

    let index = dep.add_requirer(0);
    let unit = requirer_unit(index);
    let rel = dep.provider_relation(0);
    assert!(rel.has_unit(&unit));
    assert!(!dep.providers[0].is_unit_ready(&rel, &unit).unwrap());

    dep.requirers[index].request(None, 8080).unwrap();
    assert!(dep.providers[0].is_unit_ready(&rel, &unit).unwrap());
    assert!(!dep.providers[0].is_failed(Some(&rel)));

    dep.leader()
        .publish_url(&rel, &unit, &url_for(&unit))
        .unwrap();
    dep.change();
    assert_eq!(dep.requirers[index].url().unwrap(), Some(url_for(&unit)));
    assert_eq!(dep.requirers[0].urls().unwrap().len(), 3);
    assert_eq!(
        dep.requirers[0].url().unwrap(),
        Some(url_for(&requirer_unit(0)))
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: A departed requirer unit is no longer part of the relation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_scale_down_requirer() {
    init_logging();
    let mut dep = SimDeployment::new(1, 2, 8080);
    dep.create();

    let unit = requirer_unit(1);
    dep.bus.remove_unit(&unit);
    let rel = dep.provider_relation(0);
    assert!(!rel.has_unit(&unit));
    assert_matches!(
        dep.providers[0].is_unit_ready(&rel, &unit),
        Err(IngressError::UnknownUnit { .. })
    );
    let (_, requirer_data) = dep.providers[0].fetch(&rel, true).unwrap();
    assert_eq!(requirer_data.len(), 1);

    dep.publish_urls();
    assert_eq!(dep.requirers[0].urls().unwrap().len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: Events for other endpoints are ignored
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_foreign_endpoint_is_ignored() {
    init_logging();
    let mut dep = SimDeployment::new(1, 1, 8080);
    let observed = dep.deliver(|mut relation| {
        relation.name = "metrics-endpoint".to_string();
        HookEvent::RelationCreated(relation)
    });
    assert!(observed.is_empty());
    assert_eq!(dep.requirer_databag(0), None);
}
