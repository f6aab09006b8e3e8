use serde::{Deserialize, Serialize};

/// Request body of an application create or replace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationBody {
    #[serde(default)]
    pub client_ids: Vec<String>,

    #[serde(default)]
    pub label: String,

    #[serde(rename = "heeftAlleAutorisaties", default)]
    pub has_all_permissions: bool,

    #[serde(rename = "autorisaties", default)]
    pub grants: Vec<GrantBody>,
}

/// Request body of a partial application update. A present `autorisaties`
/// replaces every grant of the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPatch {
    pub client_ids: Option<Vec<String>>,

    pub label: Option<String>,

    #[serde(rename = "heeftAlleAutorisaties")]
    pub has_all_permissions: Option<bool>,

    #[serde(rename = "autorisaties")]
    pub grants: Option<Vec<GrantBody>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantBody {
    #[serde(default)]
    pub component: String,

    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zaaktype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub informatieobjecttype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub besluittype: Option<String>,

    #[serde(
        rename = "maxVertrouwelijkheidaanduiding",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_confidentiality: Option<String>,
}

impl GrantBody {
    /// The type reference held in the field named `field`.
    pub fn type_field(&self, field: &str) -> Option<&str> {
        let value = match field {
            "zaaktype" => self.zaaktype.as_deref(),
            "informatieobjecttype" => self.informatieobjecttype.as_deref(),
            "besluittype" => self.besluittype.as_deref(),
            _ => None,
        };
        value.filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub url: String,
    pub uuid: String,
    pub client_ids: Vec<String>,
    pub label: String,
    #[serde(rename = "heeftAlleAutorisaties")]
    pub has_all_permissions: bool,
    #[serde(rename = "autorisaties")]
    pub grants: Vec<GrantView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantView {
    pub component: String,
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zaaktype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub informatieobjecttype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub besluittype: Option<String>,
    #[serde(
        rename = "maxVertrouwelijkheidaanduiding",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_confidentiality: Option<String>,
}

impl GrantView {
    pub fn set_type_field(&mut self, field: &str, url: String) {
        match field {
            "zaaktype" => self.zaaktype = Some(url),
            "informatieobjecttype" => self.informatieobjecttype = Some(url),
            "besluittype" => self.besluittype = Some(url),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let body: ApplicationBody = serde_json::from_str(
            r#"{
                "clientIds": ["zs-1"],
                "label": "Zaaksysteem",
                "autorisaties": [{
                    "component": "zrc",
                    "scopes": ["zaken.lezen"],
                    "zaaktype": "https://zgw.example.nl/catalogi/api/v1/zaaktypen/zt-1",
                    "maxVertrouwelijkheidaanduiding": "openbaar"
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(body.client_ids, vec!["zs-1".to_string()]);
        assert!(!body.has_all_permissions);
        assert_eq!(body.grants.len(), 1);
        assert_eq!(
            body.grants[0].max_confidentiality.as_deref(),
            Some("openbaar")
        );
        assert!(body.grants[0].type_field("zaaktype").is_some());
        assert!(body.grants[0].type_field("besluittype").is_none());

        let patch: ApplicationPatch =
            serde_json::from_str(r#"{"heeftAlleAutorisaties": true}"#).unwrap();
        assert_eq!(patch.has_all_permissions, Some(true));
        assert!(patch.grants.is_none());

        let mut view = GrantView {
            component: "drc".to_string(),
            scopes: vec!["documenten.lezen".to_string()],
            zaaktype: None,
            informatieobjecttype: None,
            besluittype: None,
            max_confidentiality: None,
        };
        view.set_type_field("informatieobjecttype", "iot-url".to_string());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["informatieobjecttype"], "iot-url");
        assert!(json.get("zaaktype").is_none());
        assert!(json.get("maxVertrouwelijkheidaanduiding").is_none());
    }
}
