use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::component::Component;
use super::confidentiality::Confidentiality;
use super::reference::TypeRef;
use super::scope::ScopeSet;

/// A registered consumer of the API. One application can be reached through
/// several client identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub uuid: String,
    pub label: String,
    pub client_ids: BTreeSet<String>,
    /// Superuser flag, bypasses every grant check.
    pub has_all_permissions: bool,
}

/// An explicit permission record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Storage id, `0` until the grant is persisted.
    pub id: u64,
    pub application: String,
    pub component: Component,
    pub scopes: ScopeSet,
    /// Empty for grants that only cover component-wide actions.
    pub type_ref: Option<TypeRef>,
    pub max_confidentiality: Option<Confidentiality>,
}

/// A wildcard grant covering every current and future type of one component
/// within one catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogGrant {
    pub id: u64,
    pub application: String,
    pub component: Component,
    pub catalog: TypeRef,
    pub scopes: ScopeSet,
    pub max_confidentiality: Option<Confidentiality>,
}

/// Confidentiality filter shared by both grant kinds. A grant without a
/// ceiling never satisfies a request that names a level.
pub fn satisfies_confidentiality(
    ceiling: Option<Confidentiality>,
    requested: Option<Confidentiality>,
) -> bool {
    match (requested, ceiling) {
        (None, _) => true,
        (Some(level), Some(ceiling)) => ceiling.permits(level),
        (Some(_), None) => false,
    }
}

impl Grant {
    pub fn satisfies_confidentiality(&self, requested: Option<Confidentiality>) -> bool {
        satisfies_confidentiality(self.max_confidentiality, requested)
    }
}

impl CatalogGrant {
    pub fn satisfies_confidentiality(&self, requested: Option<Confidentiality>) -> bool {
        satisfies_confidentiality(self.max_confidentiality, requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfies_confidentiality() {
        use Confidentiality::*;

        assert!(satisfies_confidentiality(None, None));
        assert!(satisfies_confidentiality(Some(Openbaar), None));
        assert!(satisfies_confidentiality(Some(Geheim), Some(Vertrouwelijk)));
        assert!(satisfies_confidentiality(Some(Intern), Some(Intern)));
        assert!(!satisfies_confidentiality(Some(Openbaar), Some(Intern)));
        assert!(!satisfies_confidentiality(None, Some(Openbaar)));
    }
}
