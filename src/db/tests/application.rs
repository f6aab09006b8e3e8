use std::collections::BTreeSet;

use crate::db::Database;
use crate::types::{Application, Component, Confidentiality, Grant, ScopeSet, TypeRef};

fn mock_app(uuid: &str, label: &str, client_ids: &[&str]) -> Application {
    Application {
        uuid: uuid.to_string(),
        label: label.to_string(),
        client_ids: client_ids.iter().map(|s| s.to_string()).collect(),
        has_all_permissions: false,
    }
}

pub fn run_secret_tests(db: &Database) {
    db.with_transaction(|tx, _cache| {
        assert_eq!(tx.get_secret("client-a").unwrap(), None);

        tx.save_secret("client-a", "first").unwrap();
        assert_eq!(tx.get_secret("client-a").unwrap(), Some("first".to_string()));

        // Saving again replaces.
        tx.save_secret("client-a", "second").unwrap();
        assert_eq!(
            tx.get_secret("client-a").unwrap(),
            Some("second".to_string())
        );
        Ok(())
    })
    .unwrap();
}

pub fn run_application_tests(db: &Database) {
    let alpha = mock_app("app-alpha", "Alpha", &["alpha-1", "alpha-2"]);
    let beta = mock_app("app-beta", "Beta", &["beta-1"]);

    db.with_transaction(|tx, _cache| {
        tx.create_application(&beta)?;
        tx.create_application(&alpha)?;
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx, _cache| {
        let found = tx.get_application("app-alpha").unwrap().unwrap();
        assert_eq!(found, alpha);

        // Ordered by label.
        let apps = tx.list_applications().unwrap();
        let labels: Vec<_> = apps.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["Alpha", "Beta"]);

        assert_eq!(
            tx.find_client_owner("alpha-2").unwrap(),
            Some("app-alpha".to_string())
        );
        assert_eq!(tx.find_client_owner("unknown").unwrap(), None);

        let apps = tx.list_client_applications("beta-1").unwrap();
        assert_eq!(apps, vec![beta.clone()]);
        assert!(tx.list_client_applications("unknown").unwrap().is_empty());
        Ok(())
    })
    .unwrap();

    // Update replaces the client ids.
    let mut updated = alpha.clone();
    updated.label = "Alpha v2".to_string();
    updated.client_ids = BTreeSet::from(["alpha-3".to_string()]);
    updated.has_all_permissions = true;
    db.with_transaction(|tx, _cache| tx.update_application(&updated))
        .unwrap();

    db.with_transaction(|tx, _cache| {
        let found = tx.get_application("app-alpha").unwrap().unwrap();
        assert_eq!(found, updated);
        assert_eq!(tx.find_client_owner("alpha-1").unwrap(), None);
        assert_eq!(
            tx.find_client_owner("alpha-3").unwrap(),
            Some("app-alpha".to_string())
        );
        Ok(())
    })
    .unwrap();

    // A client id is owned by at most one application.
    let clash = mock_app("app-clash", "Clash", &["beta-1"]);
    let result = db.with_transaction(|tx, _cache| tx.create_application(&clash));
    assert!(result.is_err());
    db.with_transaction(|tx, _cache| {
        assert_eq!(tx.get_application("app-clash").unwrap(), None);
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx, _cache| {
        tx.delete_application("app-alpha")?;
        tx.delete_application("app-beta")?;
        Ok(())
    })
    .unwrap();
    db.with_transaction(|tx, _cache| {
        assert!(tx.list_applications().unwrap().is_empty());
        assert_eq!(tx.find_client_owner("beta-1").unwrap(), None);
        Ok(())
    })
    .unwrap();
}

pub fn run_grant_tests(db: &Database) {
    let app = mock_app("app-grants", "Grants", &["grants-1"]);
    db.with_transaction(|tx, _cache| tx.create_application(&app))
        .unwrap();

    let grants = [
        Grant {
            id: 0,
            application: app.uuid.clone(),
            component: Component::Zrc,
            scopes: ScopeSet::from_iter(["zaken.lezen", "zaken.bijwerken"]),
            type_ref: Some(TypeRef::local("zt-1")),
            max_confidentiality: Some(Confidentiality::Vertrouwelijk),
        },
        Grant {
            id: 0,
            application: app.uuid.clone(),
            component: Component::Zrc,
            scopes: ScopeSet::single("zaken.aanmaken"),
            type_ref: Some(TypeRef::remote("https://other.example.com/catalogi/api/v1/zaaktypen/9")),
            max_confidentiality: None,
        },
        Grant {
            id: 0,
            application: app.uuid.clone(),
            component: Component::Ac,
            scopes: ScopeSet::single("autorisaties.lezen"),
            type_ref: None,
            max_confidentiality: None,
        },
    ];

    let created = db
        .with_transaction(|tx, _cache| {
            let mut created = vec![];
            for grant in grants.iter() {
                created.push(tx.create_grant(grant)?);
            }
            Ok(created)
        })
        .unwrap();
    assert!(created.iter().all(|g| g.id > 0));

    db.with_transaction(|tx, _cache| {
        let all = tx.list_grants(&app.uuid, None).unwrap();
        assert_eq!(all, created);

        let zrc = tx.list_grants(&app.uuid, Some(Component::Zrc)).unwrap();
        assert_eq!(zrc.len(), 2);
        assert!(zrc[1].type_ref.as_ref().unwrap().is_remote());

        assert!(tx
            .list_grants(&app.uuid, Some(Component::Drc))
            .unwrap()
            .is_empty());
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx, _cache| {
        let deleted = tx.delete_grant(created[0].id).unwrap();
        assert_eq!(deleted, Some(created[0].clone()));
        assert_eq!(tx.delete_grant(created[0].id).unwrap(), None);

        assert_eq!(tx.delete_application_grants(&app.uuid).unwrap(), 2);
        assert!(tx.list_grants(&app.uuid, None).unwrap().is_empty());

        tx.delete_application(&app.uuid)
    })
    .unwrap();
}
