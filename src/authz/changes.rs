use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::db::cache::Cache;
use crate::db::Transaction;
use crate::events::{Action, Notification};
use crate::types::{Component, TypeRef};

/// Permission changes collected during one transaction. Every application is
/// reported at most once, with the strongest action seen.
#[derive(Debug, Default)]
pub struct PermissionChanges {
    apps: BTreeMap<String, Action>,
}

impl PermissionChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a change of `application`. A destroy wins over everything and
    /// a create is not downgraded by later updates.
    pub fn record(&mut self, application: &str, action: Action) {
        let entry = self
            .apps
            .entry(application.to_string())
            .or_insert(action);
        if rank(action) > rank(*entry) {
            *entry = action;
        }
    }

    /// Records, and invalidates, every application holding a catalog grant on
    /// `catalog` for `component`: a type was added to that catalog.
    pub fn record_catalog_change(
        &mut self,
        tx: &dyn Transaction,
        cache: &dyn Cache,
        catalog: &TypeRef,
        component: Component,
    ) -> Result<()> {
        for holder in tx.list_catalog_grant_holders(catalog, component)? {
            cache.invalidate_application(&holder)?;
            self.record(&holder, Action::Update);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn applications(&self) -> impl Iterator<Item = &str> {
        self.apps.keys().map(|k| k.as_str())
    }

    pub fn into_notifications(self, base_url: &str, now: DateTime<Utc>) -> Vec<Notification> {
        self.apps
            .into_iter()
            .map(|(uuid, action)| Notification::application(base_url, &uuid, action, now))
            .collect()
    }
}

fn rank(action: Action) -> u8 {
    match action {
        Action::Update => 0,
        Action::Create => 1,
        Action::Destroy => 2,
    }
}
