use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::authn::token::jwt::JwtTokenGenerator;
use crate::types::{Component, Period, RefParser, TypeRef};

use super::config::ServiceConfig;
use super::{
    ArchiveDerivation, DerivationMethod, ResultType, StatusType, TypeDefinition, TypeRelations,
};

/// Outcome of a remote fetch that completed.
#[derive(Debug)]
pub enum FetchResponse {
    Found(RemoteTypeDocument),
    NotFound,
}

/// Fetches type definitions from the catalog API of another installation.
#[async_trait]
pub trait RemoteTypeFetcher: Send + Sync {
    async fn fetch(&self, service: &ServiceConfig, url: &str) -> Result<FetchResponse>;
}

/// A type object as returned by a remote catalog API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTypeDocument {
    pub url: String,
    #[serde(default)]
    pub catalogus: Option<String>,
    #[serde(default)]
    pub informatieobjecttypen: Vec<String>,
    #[serde(default)]
    pub besluittypen: Vec<String>,
    #[serde(default)]
    pub statustypen: Vec<RemoteStatusType>,
    #[serde(default)]
    pub resultaattypen: Vec<RemoteResultType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatusType {
    pub url: String,
    pub volgnummer: u32,
    #[serde(default)]
    pub is_eindstatus: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResultType {
    pub url: String,
    #[serde(default)]
    pub archiefnominatie: Option<String>,
    #[serde(default)]
    pub archiefactietermijn: Option<String>,
    #[serde(default)]
    pub brondatum_archiefprocedure: Option<RemoteArchiveProcedure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteArchiveProcedure {
    pub afleidingswijze: DerivationMethod,
    #[serde(default)]
    pub procestermijn: Option<String>,
    #[serde(default)]
    pub datumkenmerk: Option<String>,
}

impl RemoteTypeDocument {
    /// Converts the document into a definition. Relations are taken as-is;
    /// only their URLs are parsed so they compare equal to payload references.
    pub fn into_definition(
        self,
        reference: TypeRef,
        component: Component,
        parser: &RefParser,
    ) -> Result<TypeDefinition> {
        let catalog = match self.catalogus.as_deref() {
            Some(raw) if !raw.is_empty() => Some(parser.parse(raw).context("catalogus")?),
            _ => None,
        };

        let document_types = parse_refs(parser, &self.informatieobjecttypen)
            .context("informatieobjecttypen")?;
        let decision_types = parse_refs(parser, &self.besluittypen).context("besluittypen")?;

        let mut status_types = Vec::with_capacity(self.statustypen.len());
        for status in self.statustypen {
            status_types.push(StatusType {
                reference: parser.parse(&status.url).context("statustypen")?,
                order: status.volgnummer,
                is_final: status.is_eindstatus,
            });
        }
        status_types.sort_by_key(|s| s.order);

        let mut result_types = Vec::with_capacity(self.resultaattypen.len());
        for result in self.resultaattypen {
            result_types.push(
                convert_result_type(parser, result)
                    .with_context(|| "resultaattypen".to_string())?,
            );
        }

        Ok(TypeDefinition {
            reference,
            component,
            catalog,
            relations: TypeRelations {
                document_types,
                decision_types,
                status_types,
                result_types,
            },
        })
    }
}

fn parse_refs(parser: &RefParser, raws: &[String]) -> Result<BTreeSet<TypeRef>> {
    raws.iter().map(|raw| parser.parse(raw)).collect()
}

fn parse_period(raw: Option<String>) -> Result<Option<Period>> {
    match raw {
        Some(raw) if !raw.is_empty() => Ok(Some(raw.parse::<Period>()?)),
        _ => Ok(None),
    }
}

fn convert_result_type(parser: &RefParser, result: RemoteResultType) -> Result<ResultType> {
    let derivation = match result.brondatum_archiefprocedure {
        Some(procedure) => ArchiveDerivation {
            method: procedure.afleidingswijze,
            process_period: parse_period(procedure.procestermijn)?,
            date_attribute: procedure.datumkenmerk.filter(|s| !s.is_empty()),
        },
        None => ArchiveDerivation::new(DerivationMethod::AnderDatumkenmerk),
    };
    Ok(ResultType {
        reference: parser.parse(&result.url)?,
        archive_nomination: result.archiefnominatie.filter(|s| !s.is_empty()),
        archive_action_period: parse_period(result.archiefactietermijn)?,
        derivation,
    })
}

/// [`RemoteTypeFetcher`] over HTTP.
pub struct HttpTypeFetcher {
    client: Client,
}

impl HttpTypeFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client for remote types")?;
        Ok(Self { client })
    }

    fn build_headers(&self, service: &ServiceConfig) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let (Some(client_id), Some(secret)) = (&service.client_id, &service.secret) {
            let generator = JwtTokenGenerator::new(client_id.as_str(), secret.as_str())?;
            let token = generator.generate_token(Utc::now().timestamp(), None, None)?;
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("build authorization header")?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl RemoteTypeFetcher for HttpTypeFetcher {
    async fn fetch(&self, service: &ServiceConfig, url: &str) -> Result<FetchResponse> {
        let headers = self.build_headers(service)?;
        debug!("Fetch remote type {url} from {}", service.api_root);

        let resp = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .with_context(|| format!("request {url}"))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(FetchResponse::NotFound);
        }
        if !status.is_success() {
            bail!("remote catalog returned {status} for {url}");
        }

        let doc: RemoteTypeDocument = resp
            .json()
            .await
            .with_context(|| format!("decode type document from {url}"))?;
        Ok(FetchResponse::Found(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_definition() {
        let raw = r#"{
            "url": "https://ztc.example.com/catalogi/api/v1/zaaktypen/zt",
            "catalogus": "https://ztc.example.com/catalogi/api/v1/catalogussen/c",
            "informatieobjecttypen": [
                "https://ztc.example.com/catalogi/api/v1/informatieobjecttypen/d1",
                "https://zgw.local/catalogi/api/v1/informatieobjecttypen/d2"
            ],
            "statustypen": [
                {"url": "https://ztc.example.com/catalogi/api/v1/statustypen/s2", "volgnummer": 2, "isEindstatus": true},
                {"url": "https://ztc.example.com/catalogi/api/v1/statustypen/s1", "volgnummer": 1}
            ],
            "resultaattypen": [
                {
                    "url": "https://ztc.example.com/catalogi/api/v1/resultaattypen/r1",
                    "archiefnominatie": "vernietigen",
                    "archiefactietermijn": "P5Y",
                    "brondatumArchiefprocedure": {"afleidingswijze": "termijn", "procestermijn": "P1Y"}
                }
            ]
        }"#;
        let doc: RemoteTypeDocument = serde_json::from_str(raw).unwrap();
        let parser = RefParser::new(&["https://zgw.local/".to_string()]).unwrap();
        let reference = TypeRef::remote(doc.url.clone());
        let def = doc
            .into_definition(reference.clone(), Component::Zrc, &parser)
            .unwrap();

        assert_eq!(def.reference, reference);
        assert_eq!(
            def.catalog,
            Some(TypeRef::remote(
                "https://ztc.example.com/catalogi/api/v1/catalogussen/c"
            ))
        );
        assert!(def.relations.document_types.contains(&TypeRef::local("d2")));
        assert_eq!(def.relations.document_types.len(), 2);

        let orders: Vec<_> = def.relations.status_types.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2]);
        assert!(def.relations.status_types[1].is_final);

        let result = &def.relations.result_types[0];
        assert_eq!(result.derivation.method, DerivationMethod::Termijn);
        assert_eq!(result.derivation.process_period, Some(Period::years(1)));
        assert_eq!(result.archive_action_period, Some(Period::years(5)));
    }

    #[test]
    fn test_invalid_period() {
        let doc = RemoteTypeDocument {
            url: "https://ztc.example.com/zaaktypen/zt".to_string(),
            resultaattypen: vec![RemoteResultType {
                url: "https://ztc.example.com/resultaattypen/r".to_string(),
                archiefnominatie: None,
                archiefactietermijn: Some("5 years".to_string()),
                brondatum_archiefprocedure: None,
            }],
            ..Default::default()
        };
        let parser = RefParser::default();
        let result = doc.into_definition(
            TypeRef::remote("https://ztc.example.com/zaaktypen/zt"),
            Component::Zrc,
            &parser,
        );
        assert!(result.is_err());
    }
}
