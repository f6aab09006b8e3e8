use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use log::{debug, info};

use crate::catalog::resolver::{Resolution, TypeResolver, UnresolvedReason};
use crate::errors::ApiError;
use crate::types::{Application, Component, Confidentiality, ScopeSet, TypeRef};

use super::index::{GrantIndex, GrantSnapshot};

/// What a caller wants to do: scopes on a component, optionally on an object
/// with a type and a confidentiality level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzRequest {
    pub component: Option<Component>,
    pub scopes: ScopeSet,
    pub type_ref: Option<TypeRef>,
    pub confidentiality: Option<Confidentiality>,
}

impl AuthzRequest {
    pub fn new(component: Component, scopes: ScopeSet) -> Self {
        Self {
            component: Some(component),
            scopes,
            type_ref: None,
            confidentiality: None,
        }
    }

    /// A request that names no component. Never allowed for non-superusers.
    pub fn without_component(scopes: ScopeSet) -> Self {
        Self {
            component: None,
            scopes,
            type_ref: None,
            confidentiality: None,
        }
    }

    pub fn with_type(mut self, type_ref: TypeRef) -> Self {
        self.type_ref = Some(type_ref);
        self
    }

    pub fn with_confidentiality(mut self, confidentiality: Confidentiality) -> Self {
        self.confidentiality = Some(confidentiality);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    NoApplications,
    NoScopesRequired,
    NoComponent,
    ScopesNotGranted,
    /// A catalog grant could have matched but the type could not be fetched.
    UpstreamUnavailable(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Converts a denial into the error returned to the caller.
    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(DenyReason::UpstreamUnavailable(detail)) => Err(ApiError::upstream(detail)),
            Self::Deny(_) => Err(ApiError::permission_denied()),
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoApplications => write!(f, "client has no applications"),
            Self::NoScopesRequired => write!(f, "no scopes required"),
            Self::NoComponent => write!(f, "no component given"),
            Self::ScopesNotGranted => write!(f, "scopes not granted"),
            Self::UpstreamUnavailable(detail) => write!(f, "upstream unavailable: {detail}"),
        }
    }
}

/// The permission decision function.
pub struct PermissionEvaluator {
    index: GrantIndex,
    types: Arc<TypeResolver>,
}

impl PermissionEvaluator {
    pub fn new(index: GrantIndex, types: Arc<TypeResolver>) -> Self {
        Self { index, types }
    }

    pub fn types(&self) -> &Arc<TypeResolver> {
        &self.types
    }

    pub async fn allow(&self, applications: &[Application], req: &AuthzRequest) -> Result<bool> {
        Ok(self.decide(applications, req).await?.is_allowed())
    }

    /// Like [`Self::decide`], with the denial already turned into an error.
    pub async fn check(
        &self,
        applications: &[Application],
        req: &AuthzRequest,
    ) -> Result<(), ApiError> {
        self.decide(applications, req).await?.into_result()
    }

    pub async fn decide(&self, applications: &[Application], req: &AuthzRequest) -> Result<Decision> {
        let decision = self.evaluate(applications, req).await?;
        let apps: Vec<_> = applications.iter().map(|a| a.uuid.as_str()).collect();
        match &decision {
            Decision::Allow => debug!(
                "Allow applications {apps:?} scopes {} on {:?} type {:?} confidentiality {:?}",
                req.scopes, req.component, req.type_ref, req.confidentiality
            ),
            Decision::Deny(reason) => info!(
                "Deny applications {apps:?} scopes {} on {:?} type {:?} confidentiality {:?}: {reason}",
                req.scopes, req.component, req.type_ref, req.confidentiality
            ),
        }
        Ok(decision)
    }

    async fn evaluate(&self, applications: &[Application], req: &AuthzRequest) -> Result<Decision> {
        if applications.is_empty() {
            return Ok(Decision::Deny(DenyReason::NoApplications));
        }
        if applications.iter().any(|a| a.has_all_permissions) {
            return Ok(Decision::Allow);
        }
        if req.scopes.is_empty() {
            return Ok(Decision::Deny(DenyReason::NoScopesRequired));
        }
        let component = match req.component {
            Some(component) => component,
            None => return Ok(Decision::Deny(DenyReason::NoComponent)),
        };

        // Grants and a local type definition come from the same transaction.
        let snapshot = self
            .index
            .snapshot(applications, component, req.type_ref.as_ref())?;
        match &req.type_ref {
            Some(type_ref) => {
                self.evaluate_object(&snapshot, req, component, type_ref)
                    .await
            }
            None => Ok(evaluate_component(&snapshot, req)),
        }
    }

    async fn evaluate_object(
        &self,
        snapshot: &GrantSnapshot,
        req: &AuthzRequest,
        component: Component,
        type_ref: &TypeRef,
    ) -> Result<Decision> {
        let mut provided = ScopeSet::new();
        for grant in snapshot.grants.iter() {
            if grant.type_ref.as_ref() == Some(type_ref)
                && grant.satisfies_confidentiality(req.confidentiality)
            {
                provided.extend(&grant.scopes);
            }
        }
        if req.scopes.is_subset(&provided) {
            return Ok(Decision::Allow);
        }

        let candidates: Vec<_> = snapshot
            .catalog_grants
            .iter()
            .filter(|g| g.satisfies_confidentiality(req.confidentiality))
            .collect();
        let mut potential = provided.clone();
        for grant in candidates.iter() {
            potential.extend(&grant.scopes);
        }
        if !req.scopes.is_subset(&potential) {
            // No catalog can close the gap, skip resolving the type.
            return Ok(Decision::Deny(DenyReason::ScopesNotGranted));
        }

        let resolution = match type_ref {
            TypeRef::Local(_) => local_resolution(snapshot, type_ref, component),
            TypeRef::Remote(_) => self.types.resolve_type(type_ref, component).await?,
        };
        let def = match resolution {
            Resolution::Resolved(def) => def,
            Resolution::Unresolved(reason) => return Ok(unresolved_decision(type_ref, reason)),
        };
        let catalog = match def.catalog.as_ref() {
            Some(catalog) => catalog,
            None => return Ok(Decision::Deny(DenyReason::ScopesNotGranted)),
        };

        for grant in candidates {
            if &grant.catalog == catalog {
                provided.extend(&grant.scopes);
            }
        }
        if req.scopes.is_subset(&provided) {
            return Ok(Decision::Allow);
        }
        Ok(Decision::Deny(DenyReason::ScopesNotGranted))
    }
}

fn local_resolution(snapshot: &GrantSnapshot, type_ref: &TypeRef, component: Component) -> Resolution {
    match &snapshot.local_type {
        Some(def) if def.component == component => Resolution::Resolved(Arc::new(def.clone())),
        Some(def) => {
            debug!("Type {type_ref} is a {} type, not {component}", def.component);
            Resolution::Unresolved(UnresolvedReason::WrongComponent)
        }
        None => Resolution::Unresolved(UnresolvedReason::NotFound),
    }
}

fn unresolved_decision(type_ref: &TypeRef, reason: UnresolvedReason) -> Decision {
    if reason.is_transient() {
        return Decision::Deny(DenyReason::UpstreamUnavailable(format!(
            "cannot resolve type {type_ref}: {reason}"
        )));
    }
    debug!("Type {type_ref} unresolved ({reason}), catalog grants do not apply");
    Decision::Deny(DenyReason::ScopesNotGranted)
}

/// Component-wide actions: every grant counts, typed or not. A catalog grant
/// only exists as materialised grants, so an empty catalog contributes nothing.
fn evaluate_component(snapshot: &GrantSnapshot, req: &AuthzRequest) -> Decision {
    let mut provided = ScopeSet::new();
    for grant in snapshot.grants.iter() {
        if grant.satisfies_confidentiality(req.confidentiality) {
            provided.extend(&grant.scopes);
        }
    }
    for grant in snapshot.catalog_grants.iter() {
        if snapshot.populated_catalogs.contains(&grant.catalog)
            && grant.satisfies_confidentiality(req.confidentiality)
        {
            provided.extend(&grant.scopes);
        }
    }

    if req.scopes.is_subset(&provided) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::ScopesNotGranted)
    }
}
