use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SqliteConfig {
    /// Keep everything in memory. Grants and case state are lost on restart.
    #[serde(default = "SqliteConfig::default_memory")]
    pub memory: bool,

    /// Database file, defaults to `<data_path>/zgw-authz.db`.
    #[serde(default = "SqliteConfig::default_path")]
    pub path: String,
}

impl CommonConfig for SqliteConfig {
    fn default() -> Self {
        Self {
            memory: Self::default_memory(),
            path: Self::default_path(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.memory {
            return Ok(());
        }

        self.path = expandenv("path", &self.path)?;
        if self.path.is_empty() {
            let path = ps.data_path.join("zgw-authz.db");
            self.path = format!("{}", path.display());
        }

        Ok(())
    }
}

impl SqliteConfig {
    fn default_memory() -> bool {
        false
    }

    fn default_path() -> String {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_path() {
        let ps = PathSet::new_test();

        let mut cfg = SqliteConfig::default();
        cfg.complete(&ps).unwrap();
        assert!(cfg.path.ends_with("zgw-authz.db"));

        let mut cfg = SqliteConfig {
            memory: true,
            path: String::new(),
        };
        cfg.complete(&ps).unwrap();
        assert!(cfg.path.is_empty());
    }
}
