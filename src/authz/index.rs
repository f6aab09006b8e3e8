use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;

use crate::catalog::TypeDefinition;
use crate::db::cache::Cache;
use crate::db::{Database, GrantSet, Transaction};
use crate::types::{Application, CatalogGrant, Component, Grant, TypeRef};

/// Grants indexed by (application, component), read through the grant cache.
pub struct GrantIndex {
    db: Arc<Database>,
}

/// Everything the evaluator reads for one decision, taken in one transaction.
#[derive(Debug, Clone, Default)]
pub struct GrantSnapshot {
    pub grants: Vec<Grant>,
    pub catalog_grants: Vec<CatalogGrant>,
    /// Catalogs of `catalog_grants` that hold at least one type of the
    /// component. Remote catalogs cannot be listed and always count.
    pub populated_catalogs: BTreeSet<TypeRef>,
    /// The stored definition of the object's type, when it is local.
    pub local_type: Option<TypeDefinition>,
}

impl GrantIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn explicit_grants(&self, application: &str, component: Component) -> Result<Vec<Grant>> {
        self.db.with_transaction(|tx, cache| {
            let set = load_grant_set(tx, cache, application, component)?;
            Ok(set.grants)
        })
    }

    pub fn catalog_grants(
        &self,
        application: &str,
        component: Component,
    ) -> Result<Vec<CatalogGrant>> {
        self.db.with_transaction(|tx, cache| {
            let set = load_grant_set(tx, cache, application, component)?;
            Ok(set.catalog_grants)
        })
    }

    /// Pools the grants of all `applications` for `component`, together with
    /// the definition of a local `object_type`.
    pub fn snapshot(
        &self,
        applications: &[Application],
        component: Component,
        object_type: Option<&TypeRef>,
    ) -> Result<GrantSnapshot> {
        self.db.with_transaction(|tx, cache| {
            let mut snapshot = GrantSnapshot::default();
            for app in applications {
                let set = load_grant_set(tx, cache, &app.uuid, component)?;
                snapshot.grants.extend(set.grants);
                snapshot.catalog_grants.extend(set.catalog_grants);
            }

            let catalogs: BTreeSet<&TypeRef> =
                snapshot.catalog_grants.iter().map(|g| &g.catalog).collect();
            let mut populated = BTreeSet::new();
            for catalog in catalogs {
                if catalog.is_remote() || !tx.list_catalog_types(catalog, component)?.is_empty() {
                    populated.insert(catalog.clone());
                }
            }
            snapshot.populated_catalogs = populated;

            if let Some(reference) = object_type.filter(|r| !r.is_remote()) {
                snapshot.local_type = tx.get_type(reference)?;
            }
            Ok(snapshot)
        })
    }
}

fn load_grant_set(
    tx: &dyn Transaction,
    cache: &dyn Cache,
    application: &str,
    component: Component,
) -> Result<GrantSet> {
    if let Some(set) = cache.get_grant_set(application, component)? {
        return Ok(set);
    }

    let set = GrantSet {
        grants: tx.list_grants(application, Some(component))?,
        catalog_grants: tx.list_catalog_grants(application, Some(component))?,
    };
    cache.save_grant_set(application, component, set.clone())?;
    Ok(set)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::catalog::{TypeDefinition, TypeRelations};
    use crate::types::{Confidentiality, ScopeSet};

    use super::*;

    fn mock_app(uuid: &str) -> Application {
        Application {
            uuid: uuid.to_string(),
            label: uuid.to_string(),
            client_ids: BTreeSet::new(),
            has_all_permissions: false,
        }
    }

    #[test]
    fn test_snapshot() {
        let db = Arc::new(Database::new_test());
        let apps = [mock_app("a1"), mock_app("a2")];

        db.with_transaction(|tx, _cache| {
            for app in apps.iter() {
                tx.create_application(app)?;
            }
            tx.create_grant(&Grant {
                id: 0,
                application: "a1".to_string(),
                component: Component::Zrc,
                scopes: ScopeSet::single("zaken.lezen"),
                type_ref: Some(TypeRef::local("zt-1")),
                max_confidentiality: Some(Confidentiality::Geheim),
            })?;
            tx.create_grant(&Grant {
                id: 0,
                application: "a2".to_string(),
                component: Component::Drc,
                scopes: ScopeSet::single("documenten.lezen"),
                type_ref: Some(TypeRef::local("iot-1")),
                max_confidentiality: Some(Confidentiality::Geheim),
            })?;
            for catalog in ["full", "empty"] {
                tx.create_catalog_grant(&CatalogGrant {
                    id: 0,
                    application: "a2".to_string(),
                    component: Component::Zrc,
                    catalog: TypeRef::local(catalog),
                    scopes: ScopeSet::single("zaken.bijwerken"),
                    max_confidentiality: Some(Confidentiality::Openbaar),
                })?;
            }
            tx.create_type(&TypeDefinition {
                reference: TypeRef::local("zt-9"),
                component: Component::Zrc,
                catalog: Some(TypeRef::local("full")),
                relations: TypeRelations::default(),
            })
        })
        .unwrap();

        let index = GrantIndex::new(db.clone());
        let snapshot = index.snapshot(&apps, Component::Zrc, None).unwrap();
        assert_eq!(snapshot.grants.len(), 1);
        assert!(snapshot.local_type.is_none());
        assert_eq!(snapshot.catalog_grants.len(), 2);
        assert_eq!(
            snapshot.populated_catalogs,
            BTreeSet::from([TypeRef::local("full")])
        );

        assert_eq!(index.explicit_grants("a2", Component::Drc).unwrap().len(), 1);
        assert!(index.explicit_grants("a2", Component::Zrc).unwrap().is_empty());
        assert_eq!(index.catalog_grants("a2", Component::Zrc).unwrap().len(), 2);

        // A revoked grant disappears once the cache is invalidated.
        let grant_id = snapshot.grants[0].id;
        db.with_transaction(|tx, cache| {
            tx.delete_grant(grant_id)?;
            cache.invalidate_application("a1")
        })
        .unwrap();
        assert!(index.explicit_grants("a1", Component::Zrc).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_object_type() {
        let db = Arc::new(Database::new_test());
        let app = mock_app("a1");
        db.with_transaction(|tx, _cache| {
            tx.create_application(&app)?;
            tx.create_type(&TypeDefinition {
                reference: TypeRef::local("zt-1"),
                component: Component::Zrc,
                catalog: Some(TypeRef::local("c1")),
                relations: TypeRelations::default(),
            })
        })
        .unwrap();
        let index = GrantIndex::new(db.clone());
        let apps = [app];

        // Test case 1: local type read with the grants
        let snapshot = index
            .snapshot(&apps, Component::Zrc, Some(&TypeRef::local("zt-1")))
            .unwrap();
        let def = snapshot.local_type.unwrap();
        assert_eq!(def.catalog, Some(TypeRef::local("c1")));

        // Test case 2: unknown local type
        let snapshot = index
            .snapshot(&apps, Component::Zrc, Some(&TypeRef::local("zt-2")))
            .unwrap();
        assert!(snapshot.local_type.is_none());

        // Test case 3: remote types are never read from storage
        let remote = TypeRef::remote("https://ztc.example.com/api/zaaktypen/zt-1");
        let snapshot = index
            .snapshot(&apps, Component::Zrc, Some(&remote))
            .unwrap();
        assert!(snapshot.local_type.is_none());

        // Test case 4: a type registered later shows up in the next snapshot
        db.with_transaction(|tx, _cache| {
            tx.create_type(&TypeDefinition {
                reference: TypeRef::local("zt-2"),
                component: Component::Drc,
                catalog: None,
                relations: TypeRelations::default(),
            })
        })
        .unwrap();
        let snapshot = index
            .snapshot(&apps, Component::Zrc, Some(&TypeRef::local("zt-2")))
            .unwrap();
        assert_eq!(snapshot.local_type.unwrap().component, Component::Drc);
    }
}
