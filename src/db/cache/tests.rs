use std::collections::BTreeSet;

use crate::db::GrantSet;
use crate::types::{Application, Component, Grant, ScopeSet};

use super::Cache;

pub fn run_all_cache_tests(cache: &dyn Cache) {
    test_client_applications(cache);
    test_grant_sets(cache);
}

fn mock_app(uuid: &str, client_id: &str) -> Application {
    Application {
        uuid: uuid.to_string(),
        label: format!("app {uuid}"),
        client_ids: BTreeSet::from([client_id.to_string()]),
        has_all_permissions: false,
    }
}

fn mock_set(application: &str, scope: &str) -> GrantSet {
    GrantSet {
        grants: vec![Grant {
            id: 1,
            application: application.to_string(),
            component: Component::Zrc,
            scopes: ScopeSet::single(scope),
            type_ref: None,
            max_confidentiality: None,
        }],
        catalog_grants: vec![],
    }
}

fn test_client_applications(cache: &dyn Cache) {
    assert_eq!(cache.get_client_applications("alice").unwrap(), None);

    let apps = vec![mock_app("a1", "alice")];
    cache.save_client_applications("alice", apps.clone()).unwrap();
    cache.save_client_applications("bob", vec![]).unwrap();

    assert_eq!(cache.get_client_applications("alice").unwrap(), Some(apps));
    // An empty result is cached too.
    assert_eq!(cache.get_client_applications("bob").unwrap(), Some(vec![]));

    // Any application change drops client lookups.
    cache.invalidate_application("other").unwrap();
    assert_eq!(cache.get_client_applications("alice").unwrap(), None);
    assert_eq!(cache.get_client_applications("bob").unwrap(), None);
}

fn test_grant_sets(cache: &dyn Cache) {
    assert_eq!(cache.get_grant_set("a1", Component::Zrc).unwrap(), None);

    let a1 = mock_set("a1", "zaken.lezen");
    let a2 = mock_set("a2", "zaken.bijwerken");
    cache.save_grant_set("a1", Component::Zrc, a1.clone()).unwrap();
    cache
        .save_grant_set("a1", Component::Drc, GrantSet::default())
        .unwrap();
    cache.save_grant_set("a2", Component::Zrc, a2.clone()).unwrap();

    assert_eq!(
        cache.get_grant_set("a1", Component::Zrc).unwrap(),
        Some(a1)
    );
    assert_eq!(
        cache.get_grant_set("a1", Component::Drc).unwrap(),
        Some(GrantSet::default())
    );
    assert_eq!(cache.get_grant_set("a1", Component::Brc).unwrap(), None);

    cache.invalidate_application("a1").unwrap();
    assert_eq!(cache.get_grant_set("a1", Component::Zrc).unwrap(), None);
    assert_eq!(cache.get_grant_set("a1", Component::Drc).unwrap(), None);
    assert_eq!(
        cache.get_grant_set("a2", Component::Zrc).unwrap(),
        Some(a2)
    );

    cache.clear().unwrap();
    assert_eq!(cache.get_grant_set("a2", Component::Zrc).unwrap(), None);
}
