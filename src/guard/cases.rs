use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use uuid::Uuid;

use crate::authz::evaluator::{AuthzRequest, PermissionEvaluator};
use crate::catalog::resolver::Resolution;
use crate::catalog::{Relation, TypeDefinition};
use crate::db::{CaseRecord, Database, DecisionDates, ResultRecord, StatusRecord};
use crate::errors::ApiError;
use crate::events::notify::Notifier;
use crate::events::{Action, Notification};
use crate::settings::Settings;
use crate::types::{Application, Component, Confidentiality, ScopeSet, TypeRef};

use super::locks::CaseLocks;
use super::{GuardDenial, StateGuard, StatusTransition, SubCaseState, TransitionOutcome};

pub const SCOPE_CASES_UPDATE: &str = "zaken.bijwerken";

#[derive(Debug, Clone)]
pub struct NewCase {
    /// Generated when absent.
    pub id: Option<String>,
    pub case_type: String,
    pub confidentiality: Confidentiality,
    pub main_case: Option<String>,
    pub properties: BTreeMap<String, String>,
}

/// Fields to change on a case, `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct CaseUpdate {
    pub confidentiality: Option<Confidentiality>,
    pub properties: Option<BTreeMap<String, String>>,
    pub suspended: Option<bool>,
    pub suspension_reason: Option<String>,
    pub archive_nomination: Option<String>,
    pub archive_action_date: Option<NaiveDate>,
    pub decisions: Option<Vec<DecisionDates>>,
    pub related_end_dates: Option<Vec<NaiveDate>>,
}

#[derive(Debug, Clone)]
pub struct NewStatus {
    pub status_type: String,
    pub set_at: DateTime<Utc>,
}

/// An object of another type linked to a case, e.g. a document.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub relation: Relation,
    pub type_ref: String,
    pub scopes: ScopeSet,
}

/// The write path for cases and the resources attached to them.
pub struct CaseService {
    db: Arc<Database>,
    evaluator: Arc<PermissionEvaluator>,
    guard: StateGuard,
    locks: CaseLocks,
    notifier: Notifier,
}

impl CaseService {
    pub fn new(db: Arc<Database>, evaluator: Arc<PermissionEvaluator>, notifier: Notifier) -> Self {
        Self {
            db,
            guard: StateGuard::new(evaluator.clone()),
            evaluator,
            locks: CaseLocks::new(),
            notifier,
        }
    }

    pub async fn create_case(
        &self,
        settings: &Settings,
        applications: &[Application],
        input: NewCase,
    ) -> Result<CaseRecord, ApiError> {
        let case_type = self.parse_ref("zaaktype", &input.case_type)?;
        let required = settings.authz.create_scope(Component::Zrc);
        let req = AuthzRequest::new(Component::Zrc, required.clone())
            .with_type(case_type.clone())
            .with_confidentiality(input.confidentiality);
        self.evaluator.check(applications, &req).await?;
        self.case_type(&case_type).await?;

        let id = input
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut case = CaseRecord::new(id, case_type, input.confidentiality);
        case.properties = input.properties;

        let _main_lock = match input.main_case {
            Some(ref main_id) => {
                let lock = self.locks.lock(main_id).await;
                let main = self.db.with_transaction(|tx, _cache| tx.get_case(main_id))?;
                let Some(main) = main else {
                    return Err(ApiError::invalid_param(
                        "hoofdzaak",
                        "does_not_exist",
                        format!("main case {main_id} does not exist"),
                    ));
                };
                if main.main_case.is_some() || main.id == case.id {
                    return Err(GuardDenial::SubCaseOfSubCase.into());
                }
                self.guard
                    .check_write(&settings.guard, &main, applications, &required)
                    .await?
                    .into_result()?;
                case.main_case = Some(main.id);
                Some(lock)
            }
            None => None,
        };

        self.db.with_transaction(|tx, _cache| {
            if tx.get_case(&case.id)?.is_some() {
                return Err(ApiError::conflict("unique", format!("case {} exists", case.id)).into());
            }
            tx.create_case(&case)
        })?;
        info!("Created case {} of type {}", case.id, case.case_type);

        self.notify(settings, &case, None, Action::Create);
        Ok(case)
    }

    pub async fn update_case(
        &self,
        settings: &Settings,
        applications: &[Application],
        case_id: &str,
        update: CaseUpdate,
    ) -> Result<CaseRecord, ApiError> {
        let _lock = self.locks.lock(case_id).await;
        let required = ScopeSet::single(SCOPE_CASES_UPDATE);
        let mut case = self.load_case(applications, case_id, &required).await?;
        self.authorize(applications, &case, &required, case.confidentiality)
            .await?;
        self.guard
            .check_write(&settings.guard, &case, applications, &required)
            .await?
            .into_result()?;

        if let Some(level) = update.confidentiality {
            if level != case.confidentiality {
                // The caller must be allowed to see the case at its new level.
                self.authorize(applications, &case, &required, level).await?;
                case.confidentiality = level;
            }
        }
        if let Some(properties) = update.properties {
            case.properties = properties;
        }
        if let Some(suspended) = update.suspended {
            case.suspended = suspended;
            if suspended {
                case.ever_suspended = true;
            }
        }
        if update.suspension_reason.is_some() {
            case.suspension_reason = update.suspension_reason;
        }
        if update.archive_nomination.is_some() {
            case.archive_nomination = update.archive_nomination;
        }
        if update.archive_action_date.is_some() {
            case.archive_action_date = update.archive_action_date;
        }
        if let Some(decisions) = update.decisions {
            case.decisions = decisions;
        }
        if let Some(dates) = update.related_end_dates {
            case.related_end_dates = dates;
        }

        self.db.with_transaction(|tx, _cache| tx.update_case(&case))?;
        self.notify(settings, &case, None, Action::Update);
        Ok(case)
    }

    pub async fn record_status(
        &self,
        settings: &Settings,
        applications: &[Application],
        case_id: &str,
        input: NewStatus,
    ) -> Result<StatusRecord, ApiError> {
        let _lock = self.locks.lock(case_id).await;
        let candidates = status_scopes(settings);
        let case = self.load_case(applications, case_id, &candidates[0]).await?;
        let required = self
            .authorize_any(applications, &case, &candidates)
            .await?;

        let status_type = self.parse_ref("statustype", &input.status_type)?;
        let case_type = self.case_type(&case.case_type).await?;

        let (statuses, result, main_case, sub_cases) =
            self.db.with_transaction(|tx, _cache| {
                let statuses = tx.list_statuses(&case.id)?;
                let result = tx.get_result(&case.id)?;
                let main_case = match case.main_case {
                    Some(ref main_id) => tx.get_case(main_id)?,
                    None => None,
                };
                let mut sub_cases = Vec::new();
                for sub in tx.list_sub_cases(&case.id)? {
                    let result = tx.get_result(&sub.id)?;
                    sub_cases.push((sub, result));
                }
                Ok((statuses, result, main_case, sub_cases))
            })?;

        let mut sub_states = Vec::with_capacity(sub_cases.len());
        for (sub, result) in sub_cases {
            let result_type = match result {
                Some(ref result) => match self.resolve_case_type(&sub.case_type).await? {
                    Resolution::Resolved(def) => def.result_type(&result.result_type).cloned(),
                    Resolution::Unresolved(_) => None,
                },
                None => None,
            };
            sub_states.push(SubCaseState {
                has_result: result.is_some(),
                case: sub,
                result_type,
            });
        }

        let transition = StatusTransition {
            case: &case,
            applications,
            required_scopes: &required,
            case_type: &case_type,
            status_type: &status_type,
            set_at: input.set_at,
            statuses: &statuses,
            result: result.as_ref().map(|r| &r.result_type),
            main_case: main_case.as_ref(),
            sub_cases: &sub_states,
        };
        let plan = match self
            .guard
            .check_status_transition(&settings.guard, &transition)
            .await?
        {
            TransitionOutcome::Allowed(plan) => plan,
            TransitionOutcome::Denied(denial) => return Err(denial.into()),
        };

        let created = self.db.with_transaction(|tx, _cache| {
            let created = tx.create_status(&plan.status)?;
            tx.update_case(&plan.case)?;
            for sub in plan.sub_cases.iter() {
                tx.update_case(sub)?;
            }
            Ok(created)
        })?;
        info!(
            "Recorded status {} on case {}, lifecycle {}",
            created.status_type, case.id, plan.case.lifecycle
        );

        let status_path = format!("statussen/{}", created.id);
        self.notify(settings, &plan.case, Some(("status", status_path)), Action::Create);
        self.notify(settings, &plan.case, None, Action::Update);
        for sub in plan.sub_cases.iter() {
            self.notify(settings, sub, None, Action::Update);
        }
        Ok(created)
    }

    pub async fn set_result(
        &self,
        settings: &Settings,
        applications: &[Application],
        case_id: &str,
        result_type: &str,
    ) -> Result<ResultRecord, ApiError> {
        let _lock = self.locks.lock(case_id).await;
        let required = ScopeSet::single(SCOPE_CASES_UPDATE);
        let case = self.load_case(applications, case_id, &required).await?;
        self.authorize(applications, &case, &required, case.confidentiality)
            .await?;
        self.guard
            .check_write(&settings.guard, &case, applications, &required)
            .await?
            .into_result()?;

        let result_type = self.parse_ref("resultaattype", result_type)?;
        let case_type = self.case_type(&case.case_type).await?;
        if case_type.result_type(&result_type).is_none() {
            return Err(ApiError::type_mismatch(
                "zaaktype-mismatch",
                format!("result type {result_type} does not belong to the case type"),
            ));
        }

        let result = ResultRecord {
            case_id: case.id.clone(),
            result_type,
        };
        self.db.with_transaction(|tx, _cache| tx.save_result(&result))?;

        let path = format!("resultaten/{}", case.id);
        self.notify(settings, &case, Some(("resultaat", path)), Action::Create);
        Ok(result)
    }

    /// Checks that an object of `attachment.type_ref` may be linked to the
    /// case: the caller holds the scopes, the case accepts writes and its
    /// case-type permits the type.
    pub async fn authorize_attachment(
        &self,
        settings: &Settings,
        applications: &[Application],
        case_id: &str,
        attachment: &Attachment,
    ) -> Result<(), ApiError> {
        let case = self
            .load_case(applications, case_id, &attachment.scopes)
            .await?;
        self.authorize(applications, &case, &attachment.scopes, case.confidentiality)
            .await?;
        self.guard
            .check_write(&settings.guard, &case, applications, &attachment.scopes)
            .await?
            .into_result()?;

        let (field, code) = match attachment.relation {
            Relation::Document => (
                "informatieobjecttype",
                "missing-zaaktype-informatieobjecttype-relation",
            ),
            Relation::Decision => ("besluittype", "missing-zaaktype-besluittype-relation"),
            Relation::Status => ("statustype", "zaaktype-mismatch"),
            Relation::Result => ("resultaattype", "zaaktype-mismatch"),
        };
        let type_ref = self.parse_ref(field, &attachment.type_ref)?;

        // Surfaces why the case type does not resolve.
        self.case_type(&case.case_type).await?;
        let related = self
            .evaluator
            .types()
            .related_types(&case.case_type, attachment.relation)
            .await?
            .unwrap_or_default();
        if !related.contains(&type_ref) {
            return Err(ApiError::type_mismatch(
                code,
                format!("{field} {type_ref} is not permitted by the case type"),
            ));
        }
        Ok(())
    }

    pub fn get_case(&self, case_id: &str) -> Result<Option<CaseRecord>, ApiError> {
        Ok(self.db.with_transaction(|tx, _cache| tx.get_case(case_id))?)
    }

    pub fn list_statuses(&self, case_id: &str) -> Result<Vec<StatusRecord>, ApiError> {
        Ok(self
            .db
            .with_transaction(|tx, _cache| tx.list_statuses(case_id))?)
    }

    /// Loads a case. A missing case is only reported to callers allowed to
    /// perform `scopes` somewhere in the component.
    async fn load_case(
        &self,
        applications: &[Application],
        case_id: &str,
        scopes: &ScopeSet,
    ) -> Result<CaseRecord, ApiError> {
        if let Some(case) = self.db.with_transaction(|tx, _cache| tx.get_case(case_id))? {
            return Ok(case);
        }
        let req = AuthzRequest::new(Component::Zrc, scopes.clone());
        self.evaluator.check(applications, &req).await?;
        Err(ApiError::not_found(format!("case {case_id} not found")))
    }

    async fn authorize(
        &self,
        applications: &[Application],
        case: &CaseRecord,
        scopes: &ScopeSet,
        confidentiality: Confidentiality,
    ) -> Result<(), ApiError> {
        let req = AuthzRequest::new(Component::Zrc, scopes.clone())
            .with_type(case.case_type.clone())
            .with_confidentiality(confidentiality);
        self.evaluator.check(applications, &req).await
    }

    /// Authorizes the first of `candidates` the caller holds on the case and
    /// returns it. Fails with the denial of the first candidate.
    async fn authorize_any(
        &self,
        applications: &[Application],
        case: &CaseRecord,
        candidates: &[ScopeSet],
    ) -> Result<ScopeSet, ApiError> {
        let mut first_err = None;
        for scopes in candidates {
            match self
                .authorize(applications, case, scopes, case.confidentiality)
                .await
            {
                Ok(()) => return Ok(scopes.clone()),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        Err(first_err.unwrap_or_else(ApiError::permission_denied))
    }

    async fn resolve_case_type(&self, reference: &TypeRef) -> Result<Resolution, ApiError> {
        Ok(self
            .evaluator
            .types()
            .resolve_type(reference, Component::Zrc)
            .await?)
    }

    async fn case_type(&self, reference: &TypeRef) -> Result<Arc<TypeDefinition>, ApiError> {
        match self.resolve_case_type(reference).await? {
            Resolution::Resolved(def) => Ok(def),
            Resolution::Unresolved(reason) if reason.is_transient() => Err(ApiError::upstream(
                format!("cannot resolve case type {reference}: {reason}"),
            )),
            Resolution::Unresolved(reason) => Err(ApiError::invalid_param(
                "zaaktype",
                "invalid-resource",
                format!("case type {reference}: {reason}"),
            )),
        }
    }

    fn parse_ref(&self, field: &str, raw: &str) -> Result<TypeRef, ApiError> {
        self.evaluator
            .types()
            .parser()
            .parse(raw)
            .map_err(|err| ApiError::invalid_param(field, "bad-url", format!("{err:#}")))
    }

    fn notify(
        &self,
        settings: &Settings,
        case: &CaseRecord,
        sub_resource: Option<(&str, String)>,
        action: Action,
    ) {
        let notification = Notification::case(
            &settings.public_base_url,
            case,
            sub_resource,
            action,
            Utc::now(),
        );
        self.notifier.publish(vec![notification]);
    }
}

/// Scopes any of which admits a status write. The guard then decides which
/// statuses each of them may record.
fn status_scopes(settings: &Settings) -> Vec<ScopeSet> {
    let guard = &settings.guard;
    let mut candidates = vec![ScopeSet::single(SCOPE_CASES_UPDATE)];
    let create = settings.authz.create_scope(Component::Zrc);
    if !create.is_empty() {
        candidates.push(create);
    }
    if let Some(ref scope) = guard.status_scope {
        candidates.push(ScopeSet::single(scope.as_str()));
    }
    candidates.push(ScopeSet::single(guard.reopen_scope.as_str()));
    candidates.dedup();
    candidates
}
