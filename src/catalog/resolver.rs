use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, warn};

use crate::db::Database;
use crate::types::{Component, RefParser, TypeRef};

use super::cache::TypeCache;
use super::config::{ServiceMap, TypesConfig};
use super::remote::{FetchResponse, RemoteTypeFetcher};
use super::{Relation, TypeDefinition};

/// Outcome of resolving a type reference.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Arc<TypeDefinition>),
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// No such local type, or the remote answered 404.
    NotFound,
    /// The URL is outside every configured service.
    UnknownService,
    /// The type exists but belongs to another component.
    WrongComponent,
    FetchFailed(String),
    Timeout,
}

impl UnresolvedReason {
    /// Whether retrying later could resolve the type.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FetchFailed(_) | Self::Timeout)
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "type not found"),
            Self::UnknownService => write!(f, "no service known for type url"),
            Self::WrongComponent => write!(f, "type belongs to another component"),
            Self::FetchFailed(msg) => write!(f, "fetch remote type failed: {msg}"),
            Self::Timeout => write!(f, "fetch remote type timed out"),
        }
    }
}

impl Resolution {
    pub fn definition(&self) -> Option<&Arc<TypeDefinition>> {
        match self {
            Self::Resolved(def) => Some(def),
            Self::Unresolved(_) => None,
        }
    }
}

/// Resolves local identifiers from storage and remote URLs through the
/// URL-to-service map, caching remote definitions.
pub struct TypeResolver {
    db: Arc<Database>,
    services: ServiceMap,
    fetcher: Arc<dyn RemoteTypeFetcher>,
    cache: TypeCache,
    timeout: Duration,
    parser: RefParser,
}

impl TypeResolver {
    pub fn new(
        db: Arc<Database>,
        cfg: &TypesConfig,
        parser: RefParser,
        fetcher: Arc<dyn RemoteTypeFetcher>,
    ) -> Self {
        Self {
            db,
            services: ServiceMap::new(cfg.services.clone()),
            fetcher,
            cache: TypeCache::new(cfg.cache_ttl()),
            timeout: cfg.fetch_timeout(),
            parser,
        }
    }

    pub fn parser(&self) -> &RefParser {
        &self.parser
    }

    /// Resolves `reference` as a type of `component`. Only storage faults are
    /// errors; everything else is reported as [`Resolution::Unresolved`].
    pub async fn resolve_type(
        &self,
        reference: &TypeRef,
        component: Component,
    ) -> Result<Resolution> {
        let resolution = self.resolve(reference, Some(component)).await?;
        if let Resolution::Resolved(def) = &resolution {
            if def.component != component {
                debug!(
                    "Type {reference} is a {} type, not {component}",
                    def.component
                );
                return Ok(Resolution::Unresolved(UnresolvedReason::WrongComponent));
            }
        }
        Ok(resolution)
    }

    /// Related type references declared by a case-type. `None` when the type
    /// cannot be resolved.
    pub async fn related_types(
        &self,
        reference: &TypeRef,
        relation: Relation,
    ) -> Result<Option<BTreeSet<TypeRef>>> {
        let resolution = self.resolve(reference, None).await?;
        Ok(resolution.definition().map(|def| def.related(relation)))
    }

    /// Drops a cached remote definition, e.g. after a type-change notification.
    pub fn invalidate(&self, url: &str) {
        self.cache.invalidate(url);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    async fn resolve(
        &self,
        reference: &TypeRef,
        component: Option<Component>,
    ) -> Result<Resolution> {
        match reference {
            TypeRef::Local(_) => {
                let def = self
                    .db
                    .with_transaction(|tx, _cache| tx.get_type(reference))?;
                Ok(match def {
                    Some(def) => Resolution::Resolved(Arc::new(def)),
                    None => Resolution::Unresolved(UnresolvedReason::NotFound),
                })
            }
            TypeRef::Remote(url) => {
                // Remote documents do not say which component they belong to.
                // The URL's collection decides; the caller's component only
                // applies to URLs outside the standard collections.
                let component = Component::from_type_url(url)
                    .or(component)
                    .unwrap_or(Component::Zrc);
                let result = self
                    .cache
                    .get_or_fetch(url, component, || {
                        self.fetch_remote(reference, url, component)
                    })
                    .await;
                Ok(match result {
                    Ok(def) => Resolution::Resolved(def),
                    Err(reason) => Resolution::Unresolved(reason),
                })
            }
        }
    }

    async fn fetch_remote(
        &self,
        reference: &TypeRef,
        url: &str,
        component: Component,
    ) -> Result<TypeDefinition, UnresolvedReason> {
        let service = match self.services.find(url) {
            Some(service) => service,
            None => {
                debug!("No service configured for remote type {url}");
                return Err(UnresolvedReason::UnknownService);
            }
        };

        let fetch = self.fetcher.fetch(service, url);
        let resp = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!("Fetch remote type {url} failed: {e:#}");
                return Err(UnresolvedReason::FetchFailed(format!("{e:#}")));
            }
            Err(_) => {
                warn!(
                    "Fetch remote type {url} timed out after {}s",
                    self.timeout.as_secs()
                );
                return Err(UnresolvedReason::Timeout);
            }
        };

        let doc = match resp {
            FetchResponse::Found(doc) => doc,
            FetchResponse::NotFound => return Err(UnresolvedReason::NotFound),
        };
        match doc.into_definition(reference.clone(), component, &self.parser) {
            Ok(def) => Ok(def),
            Err(e) => {
                warn!("Remote type {url} is invalid: {e:#}");
                Err(UnresolvedReason::FetchFailed(format!("{e:#}")))
            }
        }
    }
}
