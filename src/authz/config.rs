use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};
use crate::types::{Component, ScopeSet};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthzConfig {
    /// Scope required to create objects in a component, keyed by component
    /// (`zrc`, `drc`, `brc`, `ztc`, `ac`). Writes to the Authorizations API
    /// itself require the `ac` entry.
    #[serde(default = "AuthzConfig::default_create_scope_per_component")]
    pub create_scope_per_component: BTreeMap<String, String>,

    /// Scope required to read the Authorizations API.
    #[serde(default = "AuthzConfig::default_read_scope")]
    pub read_scope: String,
}

impl CommonConfig for AuthzConfig {
    fn default() -> Self {
        Self {
            create_scope_per_component: Self::default_create_scope_per_component(),
            read_scope: Self::default_read_scope(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        for (component, scope) in self.create_scope_per_component.iter() {
            component
                .parse::<Component>()
                .context("create_scope_per_component")?;
            if scope.is_empty() {
                bail!("create scope for component '{component}' cannot be empty");
            }
        }
        if !self.create_scope_per_component.contains_key(Component::Ac.as_str()) {
            bail!("create_scope_per_component should configure the 'ac' component");
        }
        if self.read_scope.is_empty() {
            bail!("read_scope cannot be empty");
        }
        Ok(())
    }
}

impl AuthzConfig {
    fn default_create_scope_per_component() -> BTreeMap<String, String> {
        [
            (Component::Zrc, "zaken.aanmaken"),
            (Component::Drc, "documenten.aanmaken"),
            (Component::Brc, "besluiten.aanmaken"),
            (Component::Ztc, "catalogi.schrijven"),
            (Component::Ac, "autorisaties.bijwerken"),
        ]
        .into_iter()
        .map(|(component, scope)| (component.as_str().to_string(), scope.to_string()))
        .collect()
    }

    fn default_read_scope() -> String {
        String::from("autorisaties.lezen")
    }

    /// The create scope of `component`, empty when none is configured so the
    /// evaluator denies.
    pub fn create_scope(&self, component: Component) -> ScopeSet {
        match self.create_scope_per_component.get(component.as_str()) {
            Some(scope) => ScopeSet::single(scope.as_str()),
            None => ScopeSet::new(),
        }
    }

    pub fn read_scopes(&self) -> ScopeSet {
        ScopeSet::single(self.read_scope.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_scope() {
        let ps = PathSet::new_test();
        let mut cfg = AuthzConfig::default();
        cfg.complete(&ps).unwrap();

        assert_eq!(
            cfg.create_scope(Component::Zrc),
            ScopeSet::single("zaken.aanmaken")
        );
        assert!(cfg.create_scope(Component::Nrc).is_empty());

        cfg.create_scope_per_component
            .insert("unknown".to_string(), "x".to_string());
        assert!(cfg.complete(&ps).is_err());

        let mut cfg = AuthzConfig::default();
        cfg.create_scope_per_component.remove("ac");
        assert!(cfg.complete(&ps).is_err());
    }
}
