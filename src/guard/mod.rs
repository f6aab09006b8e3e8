pub mod archive;
pub mod cases;
pub mod config;
pub mod lifecycle;
pub mod locks;


use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info};
use thiserror::Error;

use crate::authz::evaluator::{AuthzRequest, PermissionEvaluator};
use crate::catalog::{DerivationMethod, ResultType, TypeDefinition};
use crate::db::{CaseRecord, StatusRecord};
use crate::errors::{ApiError, ErrorKind, InvalidParam};
use crate::types::{Application, Component, ScopeSet, TypeRef};

use archive::{ArchiveError, ArchiveInput};
use config::GuardConfig;

/// Why the state guard refused a write.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardDenial {
    #[error("the case is closed")]
    CaseClosed,
    #[error("reopening the case requires scope '{0}'")]
    ReopenForbidden(String),
    #[error("the main case is closed, its sub-case cannot be reopened")]
    MainCaseClosed,
    #[error("adding a status to a case that has one requires another scope")]
    StatusScopeMissing,
    #[error("status type {0} does not belong to the case type")]
    StatusTypeMismatch(TypeRef),
    #[error("a status was already recorded at {0}")]
    DuplicateStatus(DateTime<Utc>),
    #[error("a final status requires a result on the case")]
    ResultMissing,
    #[error("sub-case {0} has no final status")]
    SubCasesOpen(String),
    #[error("sub-case {0} has no result")]
    SubCaseResultMissing(String),
    #[error("a sub-case cannot be the main case of another case")]
    SubCaseOfSubCase,
    #[error("cannot compute the archive action date: {0}")]
    Archive(#[from] ArchiveError),
}

impl GuardDenial {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CaseClosed => "case-closed",
            Self::ReopenForbidden(_) => "reopen-forbidden",
            Self::MainCaseClosed => "main-case-closed",
            Self::StatusScopeMissing => "status-scope-missing",
            Self::StatusTypeMismatch(_) => "zaaktype-mismatch",
            Self::DuplicateStatus(_) => "unique",
            Self::ResultMissing => "result-missing",
            Self::SubCasesOpen(_) => "sub-cases-open",
            Self::SubCaseResultMissing(_) => "sub-case-result-missing",
            Self::SubCaseOfSubCase => "deelzaak-als-hoofdzaak",
            Self::Archive(_) => "archiefactiedatum-error",
        }
    }

    fn field(&self) -> &'static str {
        match self {
            Self::SubCaseOfSubCase => "hoofdzaak",
            Self::Archive(_) => "archiefactiedatum",
            Self::DuplicateStatus(_) => "datumStatusGezet",
            _ => "statustype",
        }
    }
}

impl From<GuardDenial> for ApiError {
    fn from(denial: GuardDenial) -> Self {
        let detail = denial.to_string();
        let code = denial.code();
        match denial {
            GuardDenial::CaseClosed
            | GuardDenial::ReopenForbidden(_)
            | GuardDenial::MainCaseClosed => ApiError::new(ErrorKind::CaseClosed, code, detail),
            GuardDenial::StatusScopeMissing => {
                ApiError::new(ErrorKind::PermissionDenied, code, detail)
            }
            GuardDenial::StatusTypeMismatch(_) => ApiError::type_mismatch(code, detail),
            GuardDenial::DuplicateStatus(_) => ApiError::conflict(code, detail),
            GuardDenial::ResultMissing
            | GuardDenial::SubCasesOpen(_)
            | GuardDenial::SubCaseResultMissing(_)
            | GuardDenial::SubCaseOfSubCase
            | GuardDenial::Archive(_) => {
                ApiError::invalid(vec![InvalidParam::new(denial.field(), code, detail)])
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(GuardDenial),
}

impl Verdict {
    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(denial) => Err(denial.into()),
        }
    }
}

/// A sub-case as the closure preconditions of its main case see it.
#[derive(Debug, Clone)]
pub struct SubCaseState {
    pub case: CaseRecord,
    pub has_result: bool,
    /// Definition of the attached result's type, when it resolves.
    pub result_type: Option<ResultType>,
}

/// Everything `check_status_transition` reads.
pub struct StatusTransition<'a> {
    pub case: &'a CaseRecord,
    pub applications: &'a [Application],
    /// Scopes the caller needed for the status write itself.
    pub required_scopes: &'a ScopeSet,
    pub case_type: &'a TypeDefinition,
    pub status_type: &'a TypeRef,
    pub set_at: DateTime<Utc>,
    /// Statuses already recorded on the case.
    pub statuses: &'a [StatusRecord],
    /// Type of the result attached to the case, if any.
    pub result: Option<&'a TypeRef>,
    pub main_case: Option<&'a CaseRecord>,
    pub sub_cases: &'a [SubCaseState],
}

/// Writes to apply when a status transition is allowed.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub status: StatusRecord,
    pub case: CaseRecord,
    /// Sub-cases whose archive action date is inherited from this case.
    pub sub_cases: Vec<CaseRecord>,
    pub reopened: bool,
}

#[derive(Debug)]
pub enum TransitionOutcome {
    Allowed(TransitionPlan),
    Denied(GuardDenial),
}

/// Enforces the closed-case rule and the status state machine.
pub struct StateGuard {
    evaluator: Arc<PermissionEvaluator>,
}

impl StateGuard {
    pub fn new(evaluator: Arc<PermissionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Whether a write needing `required` may touch `case`. Open cases are
    /// always writable here; the evaluator has already checked the scopes.
    pub async fn check_write(
        &self,
        cfg: &GuardConfig,
        case: &CaseRecord,
        applications: &[Application],
        required: &ScopeSet,
    ) -> Result<Verdict> {
        if !case.is_closed() {
            return Ok(Verdict::Allow);
        }

        for scope in cfg.bypass_scopes(required) {
            if self.holds(case, applications, scope).await? {
                info!("Write on closed case {} allowed by scope {scope}", case.id);
                return Ok(Verdict::Allow);
            }
        }
        debug!("Write {required} on closed case {} denied", case.id);
        Ok(Verdict::Deny(GuardDenial::CaseClosed))
    }

    pub async fn check_status_transition(
        &self,
        cfg: &GuardConfig,
        t: &StatusTransition<'_>,
    ) -> Result<TransitionOutcome> {
        let case = t.case;
        let Some(status_type) = t.case_type.status_type(t.status_type) else {
            return Ok(denied(GuardDenial::StatusTypeMismatch(t.status_type.clone())));
        };
        if t.statuses.iter().any(|s| s.set_at == t.set_at) {
            return Ok(denied(GuardDenial::DuplicateStatus(t.set_at)));
        }

        let reopening = case.is_closed() && !status_type.is_final;
        if reopening {
            if t.main_case.map(|m| m.is_closed()).unwrap_or(false) {
                return Ok(denied(GuardDenial::MainCaseClosed));
            }
            if !self.holds(case, t.applications, &cfg.reopen_scope).await? {
                return Ok(denied(GuardDenial::ReopenForbidden(cfg.reopen_scope.clone())));
            }
        } else if let Verdict::Deny(denial) = self
            .check_write(cfg, case, t.applications, t.required_scopes)
            .await?
        {
            return Ok(denied(denial));
        }

        if let Some(ref status_scope) = cfg.status_scope {
            if !t.statuses.is_empty()
                && !reopening
                && !self.holds(case, t.applications, status_scope).await?
                && !self.holds(case, t.applications, &cfg.reopen_scope).await?
            {
                return Ok(denied(GuardDenial::StatusScopeMissing));
            }
        }

        let status = StatusRecord {
            id: 0,
            case_id: case.id.clone(),
            status_type: t.status_type.clone(),
            set_at: t.set_at,
            is_final: status_type.is_final,
        };
        let mut next = case.clone();
        next.lifecycle = case.lifecycle.next(status_type.is_final);

        if !status_type.is_final {
            if reopening {
                info!("Reopen case {}", case.id);
                next.end_date = None;
                next.archive_nomination = None;
                next.archive_action_date = None;
            }
            return Ok(TransitionOutcome::Allowed(TransitionPlan {
                status,
                case: next,
                sub_cases: Vec::new(),
                reopened: reopening,
            }));
        }

        match self.close(t, &mut next) {
            Ok(sub_cases) => Ok(TransitionOutcome::Allowed(TransitionPlan {
                status,
                case: next,
                sub_cases,
                reopened: false,
            })),
            Err(denial) => Ok(denied(denial)),
        }
    }

    /// Closure preconditions and archive computation for a final status.
    fn close(
        &self,
        t: &StatusTransition<'_>,
        next: &mut CaseRecord,
    ) -> Result<Vec<CaseRecord>, GuardDenial> {
        let Some(result) = t.result else {
            return Err(GuardDenial::ResultMissing);
        };
        for sub in t.sub_cases.iter() {
            if !sub.case.is_closed() {
                return Err(GuardDenial::SubCasesOpen(sub.case.id.clone()));
            }
            if !sub.has_result {
                return Err(GuardDenial::SubCaseResultMissing(sub.case.id.clone()));
            }
        }

        let end_date = t.set_at.date_naive();
        next.end_date = Some(end_date);

        if let Some(result_type) = t.case_type.result_type(result) {
            if next.archive_nomination.is_none() {
                next.archive_nomination = result_type.archive_nomination.clone();
            }
            if next.archive_action_date.is_none() {
                let input = ArchiveInput {
                    case: &*next,
                    end_date,
                    main_case_end_date: t.main_case.and_then(|m| m.end_date),
                };
                let date = archive::action_date(result_type, &input)?;
                debug!(
                    "Case {} archive action date {date:?} via {}",
                    next.id,
                    result_type.derivation.method.as_str()
                );
                next.archive_action_date = date;
            }
        }

        // Closed sub-cases deriving from the main case get their date now.
        let mut updates = Vec::new();
        for sub in t.sub_cases.iter() {
            let Some(ref result_type) = sub.result_type else {
                continue;
            };
            if result_type.derivation.method != DerivationMethod::Hoofdzaak
                || sub.case.archive_action_date.is_some()
            {
                continue;
            }
            let sub_end = sub.case.end_date.unwrap_or(end_date);
            let input = ArchiveInput {
                case: &sub.case,
                end_date: sub_end,
                main_case_end_date: Some(end_date),
            };
            let mut case = sub.case.clone();
            case.archive_action_date = archive::action_date(result_type, &input)?;
            if case.archive_nomination.is_none() {
                case.archive_nomination = result_type.archive_nomination.clone();
            }
            updates.push(case);
        }
        Ok(updates)
    }

    async fn holds(
        &self,
        case: &CaseRecord,
        applications: &[Application],
        scope: &str,
    ) -> Result<bool> {
        let req = AuthzRequest::new(Component::Zrc, ScopeSet::single(scope))
            .with_type(case.case_type.clone())
            .with_confidentiality(case.confidentiality);
        self.evaluator.allow(applications, &req).await
    }
}

fn denied(denial: GuardDenial) -> TransitionOutcome {
    debug!("Status transition denied: {denial}");
    TransitionOutcome::Denied(denial)
}
