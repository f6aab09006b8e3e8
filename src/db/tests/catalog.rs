use std::collections::BTreeSet;

use crate::catalog::{
    ArchiveDerivation, DerivationMethod, ResultType, StatusType, TypeDefinition, TypeRelations,
};
use crate::db::Database;
use crate::types::{Application, CatalogGrant, Component, Confidentiality, ScopeSet, TypeRef};

fn mock_catalog_grant(app: &str, component: Component, catalog: &str) -> CatalogGrant {
    CatalogGrant {
        id: 0,
        application: app.to_string(),
        component,
        catalog: TypeRef::local(catalog),
        scopes: ScopeSet::single("zaken.lezen"),
        max_confidentiality: Some(Confidentiality::Openbaar),
    }
}

pub fn run_catalog_grant_tests(db: &Database) {
    for uuid in ["cat-app-1", "cat-app-2"] {
        let app = Application {
            uuid: uuid.to_string(),
            label: uuid.to_string(),
            client_ids: BTreeSet::new(),
            has_all_permissions: false,
        };
        db.with_transaction(|tx, _cache| tx.create_application(&app))
            .unwrap();
    }

    let created = db
        .with_transaction(|tx, _cache| {
            let a = tx.create_catalog_grant(&mock_catalog_grant(
                "cat-app-1",
                Component::Zrc,
                "catalog-1",
            ))?;
            let b = tx.create_catalog_grant(&mock_catalog_grant(
                "cat-app-1",
                Component::Drc,
                "catalog-1",
            ))?;
            let c = tx.create_catalog_grant(&mock_catalog_grant(
                "cat-app-2",
                Component::Zrc,
                "catalog-1",
            ))?;
            Ok(vec![a, b, c])
        })
        .unwrap();

    // At most one catalog grant per (application, component, catalog).
    let result = db.with_transaction(|tx, _cache| {
        tx.create_catalog_grant(&mock_catalog_grant(
            "cat-app-1",
            Component::Zrc,
            "catalog-1",
        ))
    });
    assert!(result.is_err());

    db.with_transaction(|tx, _cache| {
        let grants = tx.list_catalog_grants("cat-app-1", None).unwrap();
        assert_eq!(grants, created[..2].to_vec());

        let grants = tx
            .list_catalog_grants("cat-app-1", Some(Component::Drc))
            .unwrap();
        assert_eq!(grants, vec![created[1].clone()]);

        let holders = tx
            .list_catalog_grant_holders(&TypeRef::local("catalog-1"), Component::Zrc)
            .unwrap();
        assert_eq!(holders, vec!["cat-app-1", "cat-app-2"]);

        let holders = tx
            .list_catalog_grant_holders(&TypeRef::local("catalog-1"), Component::Brc)
            .unwrap();
        assert!(holders.is_empty());
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx, _cache| {
        let deleted = tx.delete_catalog_grant(created[2].id).unwrap();
        assert_eq!(deleted, Some(created[2].clone()));
        assert_eq!(tx.delete_catalog_grant(created[2].id).unwrap(), None);

        // Deleting the application takes its catalog grants with it.
        tx.delete_application("cat-app-1")?;
        assert!(tx.list_catalog_grants("cat-app-1", None).unwrap().is_empty());
        tx.delete_application("cat-app-2")
    })
    .unwrap();
}

pub fn run_type_tests(db: &Database) {
    let case_type = TypeDefinition {
        reference: TypeRef::local("zt-db"),
        component: Component::Zrc,
        catalog: Some(TypeRef::local("catalog-db")),
        relations: TypeRelations {
            document_types: BTreeSet::from([TypeRef::local("iot-db")]),
            decision_types: BTreeSet::new(),
            status_types: vec![
                StatusType {
                    reference: TypeRef::local("st-1"),
                    order: 1,
                    is_final: false,
                },
                StatusType {
                    reference: TypeRef::local("st-2"),
                    order: 2,
                    is_final: true,
                },
            ],
            result_types: vec![ResultType {
                reference: TypeRef::local("rt-1"),
                archive_nomination: Some("vernietigen".to_string()),
                archive_action_period: Some("P10Y".parse().unwrap()),
                derivation: ArchiveDerivation::new(DerivationMethod::Afgehandeld),
            }],
        },
    };
    let document_type = TypeDefinition {
        reference: TypeRef::local("iot-db"),
        component: Component::Drc,
        catalog: Some(TypeRef::local("catalog-db")),
        relations: TypeRelations::default(),
    };

    db.with_transaction(|tx, _cache| {
        tx.create_type(&case_type)?;
        tx.create_type(&document_type)
    })
    .unwrap();

    db.with_transaction(|tx, _cache| {
        let found = tx.get_type(&TypeRef::local("zt-db")).unwrap();
        assert_eq!(found, Some(case_type.clone()));
        assert_eq!(tx.get_type(&TypeRef::local("missing")).unwrap(), None);

        let types = tx
            .list_catalog_types(&TypeRef::local("catalog-db"), Component::Zrc)
            .unwrap();
        assert_eq!(types, vec![TypeRef::local("zt-db")]);

        let types = tx
            .list_catalog_types(&TypeRef::local("catalog-db"), Component::Brc)
            .unwrap();
        assert!(types.is_empty());
        Ok(())
    })
    .unwrap();

    // Reference is the primary key.
    let result = db.with_transaction(|tx, _cache| tx.create_type(&case_type));
    assert!(result.is_err());
}
