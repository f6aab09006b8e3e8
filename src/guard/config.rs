use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};
use crate::types::ScopeSet;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GuardConfig {
    /// Scope that lets a write through on a closed case.
    #[serde(default = "GuardConfig::default_force_write_scope")]
    pub force_write_scope: String,

    /// Scope that allows recording a non-final status on a closed case.
    #[serde(default = "GuardConfig::default_reopen_scope")]
    pub reopen_scope: String,

    /// When set, a case that already has a status only accepts new statuses
    /// from holders of this scope or of `reopen_scope`.
    #[serde(default)]
    pub status_scope: Option<String>,

    /// Per required scope, the scope that bypasses the closed-case block
    /// instead of `force_write_scope`.
    #[serde(default)]
    pub closed_case_bypass: BTreeMap<String, String>,
}

impl CommonConfig for GuardConfig {
    fn default() -> Self {
        Self {
            force_write_scope: Self::default_force_write_scope(),
            reopen_scope: Self::default_reopen_scope(),
            status_scope: None,
            closed_case_bypass: BTreeMap::new(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.force_write_scope.is_empty() {
            bail!("force_write_scope cannot be empty");
        }
        if self.reopen_scope.is_empty() {
            bail!("reopen_scope cannot be empty");
        }
        if let Some(ref scope) = self.status_scope {
            if scope.is_empty() {
                bail!("status_scope cannot be empty, remove it to disable");
            }
        }
        for (required, bypass) in self.closed_case_bypass.iter() {
            if required.is_empty() || bypass.is_empty() {
                bail!("closed_case_bypass cannot contain empty scopes");
            }
        }
        Ok(())
    }
}

impl GuardConfig {
    fn default_force_write_scope() -> String {
        String::from("zaken.geforceerd-bijwerken")
    }

    fn default_reopen_scope() -> String {
        String::from("zaken.heropenen")
    }

    /// Scopes any of which lets a write requiring `required` through on a
    /// closed case.
    pub fn bypass_scopes(&self, required: &ScopeSet) -> Vec<&str> {
        let mut scopes: Vec<&str> = required
            .iter()
            .filter_map(|scope| self.closed_case_bypass.get(scope))
            .map(|s| s.as_str())
            .collect();
        if scopes.is_empty() {
            scopes.push(self.force_write_scope.as_str());
        }
        scopes.sort_unstable();
        scopes.dedup();
        scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete() {
        let ps = PathSet::new_test();

        let mut cfg: GuardConfig = toml::from_str("").unwrap();
        cfg.complete(&ps).unwrap();
        assert_eq!(cfg.force_write_scope, "zaken.geforceerd-bijwerken");
        assert_eq!(cfg.reopen_scope, "zaken.heropenen");
        assert!(cfg.status_scope.is_none());

        let mut cfg: GuardConfig = toml::from_str("status_scope = ''").unwrap();
        assert!(cfg.complete(&ps).is_err());

        let mut cfg: GuardConfig = toml::from_str("force_write_scope = ''").unwrap();
        assert!(cfg.complete(&ps).is_err());
    }

    #[test]
    fn test_bypass_scopes() {
        let cfg: GuardConfig = toml::from_str(
            r#"
            [closed_case_bypass]
            "zaken.bijwerken" = "zaken.geforceerd-bijwerken"
            "zaken.statussen.toevoegen" = "zaken.heropenen"
            "#,
        )
        .unwrap();

        let scopes = cfg.bypass_scopes(&ScopeSet::single("zaken.statussen.toevoegen"));
        assert_eq!(scopes, vec!["zaken.heropenen"]);

        // Unlisted scopes fall back to the force-write scope.
        let scopes = cfg.bypass_scopes(&ScopeSet::single("documenten.aanmaken"));
        assert_eq!(scopes, vec!["zaken.geforceerd-bijwerken"]);

        let scopes = cfg.bypass_scopes(&ScopeSet::from_iter([
            "zaken.bijwerken",
            "zaken.statussen.toevoegen",
        ]));
        assert_eq!(scopes, vec!["zaken.geforceerd-bijwerken", "zaken.heropenen"]);
    }
}
