pub mod notify;

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::db::CaseRecord;

pub const CHANNEL_AUTHORIZATIONS: &str = "autorisaties";
pub const CHANNEL_CASES: &str = "zaken";

/// Message posted to a notification channel (kanaal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kanaal: String,
    pub hoofd_object: String,
    pub resource: String,
    pub resource_url: String,
    pub actie: Action,
    pub aanmaakdatum: String,
    #[serde(default)]
    pub kenmerken: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "destroy")]
    Destroy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
        }
    }
}

pub fn application_url(base_url: &str, uuid: &str) -> String {
    format!(
        "{}/autorisaties/api/v1/applicaties/{uuid}",
        base_url.trim_end_matches('/')
    )
}

pub fn case_url(base_url: &str, case_id: &str) -> String {
    format!("{}/zaken/api/v1/zaken/{case_id}", base_url.trim_end_matches('/'))
}

fn format_created(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Notification {
    /// A permission change of one application.
    pub fn application(base_url: &str, uuid: &str, actie: Action, now: DateTime<Utc>) -> Self {
        let url = application_url(base_url, uuid);
        Self {
            kanaal: CHANNEL_AUTHORIZATIONS.to_string(),
            hoofd_object: url.clone(),
            resource: "applicatie".to_string(),
            resource_url: url,
            actie,
            aanmaakdatum: format_created(now),
            kenmerken: BTreeMap::new(),
        }
    }

    /// A change of a case or of a resource attached to it. `sub_resource` is
    /// the resource name and path segment, e.g. `("status", "statussen/12")`.
    pub fn case(
        base_url: &str,
        case: &CaseRecord,
        sub_resource: Option<(&str, String)>,
        actie: Action,
        now: DateTime<Utc>,
    ) -> Self {
        let hoofd_object = case_url(base_url, &case.id);
        let (resource, resource_url) = match sub_resource {
            Some((resource, path)) => (
                resource.to_string(),
                format!("{}/zaken/api/v1/{path}", base_url.trim_end_matches('/')),
            ),
            None => ("zaak".to_string(), hoofd_object.clone()),
        };

        let mut kenmerken = BTreeMap::new();
        kenmerken.insert("zaaktype".to_string(), case.case_type.to_string());
        kenmerken.insert(
            "vertrouwelijkheidaanduiding".to_string(),
            case.confidentiality.to_string(),
        );

        Self {
            kanaal: CHANNEL_CASES.to_string(),
            hoofd_object,
            resource,
            resource_url,
            actie,
            aanmaakdatum: format_created(now),
            kenmerken,
        }
    }
}
