use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use log::info;
use uuid::Uuid;

use crate::catalog::TypeDefinition;
use crate::db::{Database, Transaction};
use crate::errors::{ApiError, Validation};
use crate::events::notify::Notifier;
use crate::events::{application_url, Action};
use crate::settings::Settings;
use crate::types::payload::{ApplicationBody, ApplicationPatch, ApplicationView, GrantBody, GrantView};
use crate::types::{
    Application, CatalogGrant, Component, Confidentiality, Grant, RefParser, ScopeSet, TypeRef,
};

use super::changes::PermissionChanges;

const NON_FIELD_ERRORS: &str = "nonFieldErrors";

/// Manages applications and their grants. Every mutation invalidates the
/// grant cache inside its transaction and notifies the changed applications
/// once the transaction has committed.
pub struct AdminService {
    db: Arc<Database>,
    parser: RefParser,
    notifier: Notifier,
}

/// A validated application payload. `grants` is `None` when the grants are
/// left untouched.
struct ApplicationInput {
    client_ids: BTreeSet<String>,
    label: String,
    has_all_permissions: bool,
    grants: Option<Vec<Grant>>,
}

impl AdminService {
    pub fn new(db: Arc<Database>, parser: RefParser, notifier: Notifier) -> Self {
        Self {
            db,
            parser,
            notifier,
        }
    }

    pub fn list_applications(&self, settings: &Settings) -> Result<Vec<ApplicationView>, ApiError> {
        let base = settings.public_base_url.as_str();
        Ok(self.db.with_transaction(|tx, _cache| {
            let apps = tx.list_applications()?;
            apps.iter().map(|app| build_view(tx, base, app)).collect()
        })?)
    }

    pub fn get_application(&self, settings: &Settings, uuid: &str) -> Result<ApplicationView, ApiError> {
        let base = settings.public_base_url.as_str();
        Ok(self.db.with_transaction(|tx, _cache| {
            let Some(app) = tx.get_application(uuid)? else {
                return Err(not_found(uuid).into());
            };
            build_view(tx, base, &app)
        })?)
    }

    /// The application a client id belongs to.
    pub fn find_consumer(&self, settings: &Settings, client_id: &str) -> Result<ApplicationView, ApiError> {
        let base = settings.public_base_url.as_str();
        Ok(self.db.with_transaction(|tx, _cache| {
            let app = match tx.find_client_owner(client_id)? {
                Some(uuid) => tx.get_application(&uuid)?,
                None => None,
            };
            let Some(app) = app else {
                return Err(ApiError::not_found(format!(
                    "no application for client {client_id}"
                ))
                .into());
            };
            build_view(tx, base, &app)
        })?)
    }

    pub fn create_application(
        &self,
        settings: &Settings,
        body: ApplicationBody,
    ) -> Result<ApplicationView, ApiError> {
        let input = self.validate_body(&body)?;
        let uuid = Uuid::new_v4().to_string();
        let base = settings.public_base_url.as_str();

        let (view, changes) = self.db.with_transaction(|tx, cache| {
            check_client_ids(tx, &uuid, &input.client_ids)?;
            let app = Application {
                uuid: uuid.clone(),
                label: input.label.clone(),
                client_ids: input.client_ids.clone(),
                has_all_permissions: input.has_all_permissions,
            };
            tx.create_application(&app)?;
            if let Some(ref grants) = input.grants {
                create_grants(tx, &uuid, grants)?;
            }
            cache.invalidate_application(&uuid)?;

            let mut changes = PermissionChanges::new();
            changes.record(&uuid, Action::Create);
            Ok((build_view(tx, base, &app)?, changes))
        })?;

        info!("Created application {uuid} ({})", view.label);
        self.publish(settings, changes);
        Ok(view)
    }

    /// Replaces an application. Its grants are replaced too, dropping any
    /// catalog grants.
    pub fn replace_application(
        &self,
        settings: &Settings,
        uuid: &str,
        body: ApplicationBody,
    ) -> Result<ApplicationView, ApiError> {
        let input = self.validate_body(&body)?;
        self.update(settings, uuid, input)
    }

    pub fn patch_application(
        &self,
        settings: &Settings,
        uuid: &str,
        patch: ApplicationPatch,
    ) -> Result<ApplicationView, ApiError> {
        let current = self
            .db
            .with_transaction(|tx, _cache| tx.get_application(uuid))?
            .ok_or_else(|| not_found(uuid))?;

        let input = self.validate_patch(&current, &patch)?;
        self.update(settings, uuid, input)
    }

    pub fn delete_application(&self, settings: &Settings, uuid: &str) -> Result<(), ApiError> {
        let changes = self.db.with_transaction(|tx, cache| {
            if tx.get_application(uuid)?.is_none() {
                return Err(not_found(uuid).into());
            }
            tx.delete_application_grants(uuid)?;
            tx.delete_application_catalog_grants(uuid)?;
            tx.delete_application(uuid)?;
            cache.invalidate_application(uuid)?;

            let mut changes = PermissionChanges::new();
            changes.record(uuid, Action::Destroy);
            Ok(changes)
        })?;

        info!("Deleted application {uuid}");
        self.publish(settings, changes);
        Ok(())
    }

    pub fn add_grant(&self, settings: &Settings, grant: Grant) -> Result<Grant, ApiError> {
        let (created, changes) = self.db.with_transaction(|tx, cache| {
            if tx.get_application(&grant.application)?.is_none() {
                return Err(not_found(&grant.application).into());
            }
            let created = tx.create_grant(&grant)?;
            cache.invalidate_application(&grant.application)?;

            let mut changes = PermissionChanges::new();
            changes.record(&grant.application, Action::Update);
            Ok((created, changes))
        })?;

        self.publish(settings, changes);
        Ok(created)
    }

    pub fn revoke_grant(&self, settings: &Settings, id: u64) -> Result<Grant, ApiError> {
        let (revoked, changes) = self.db.with_transaction(|tx, cache| {
            let Some(revoked) = tx.delete_grant(id)? else {
                return Err(ApiError::not_found(format!("grant {id} not found")).into());
            };
            cache.invalidate_application(&revoked.application)?;

            let mut changes = PermissionChanges::new();
            changes.record(&revoked.application, Action::Update);
            Ok((revoked, changes))
        })?;

        self.publish(settings, changes);
        Ok(revoked)
    }

    pub fn add_catalog_grant(
        &self,
        settings: &Settings,
        grant: CatalogGrant,
    ) -> Result<CatalogGrant, ApiError> {
        let (created, changes) = self.db.with_transaction(|tx, cache| {
            if tx.get_application(&grant.application)?.is_none() {
                return Err(not_found(&grant.application).into());
            }
            let existing = tx.list_catalog_grants(&grant.application, Some(grant.component))?;
            if existing.iter().any(|g| g.catalog == grant.catalog) {
                return Err(ApiError::conflict(
                    "unique",
                    format!(
                        "application {} already holds a {} grant on catalog {}",
                        grant.application, grant.component, grant.catalog
                    ),
                )
                .into());
            }
            let created = tx.create_catalog_grant(&grant)?;
            cache.invalidate_application(&grant.application)?;

            let mut changes = PermissionChanges::new();
            changes.record(&grant.application, Action::Update);
            Ok((created, changes))
        })?;

        self.publish(settings, changes);
        Ok(created)
    }

    pub fn revoke_catalog_grant(&self, settings: &Settings, id: u64) -> Result<CatalogGrant, ApiError> {
        let (revoked, changes) = self.db.with_transaction(|tx, cache| {
            let Some(revoked) = tx.delete_catalog_grant(id)? else {
                return Err(ApiError::not_found(format!("catalog grant {id} not found")).into());
            };
            cache.invalidate_application(&revoked.application)?;

            let mut changes = PermissionChanges::new();
            changes.record(&revoked.application, Action::Update);
            Ok((revoked, changes))
        })?;

        self.publish(settings, changes);
        Ok(revoked)
    }

    pub fn register_type(&self, settings: &Settings, def: TypeDefinition) -> Result<(), ApiError> {
        self.register_types(settings, vec![def])
    }

    /// Stores local type definitions. Applications holding a catalog grant on
    /// a catalog that gains a type are notified once for the whole batch.
    pub fn register_types(
        &self,
        settings: &Settings,
        defs: Vec<TypeDefinition>,
    ) -> Result<(), ApiError> {
        let changes = self.db.with_transaction(|tx, cache| {
            let mut changes = PermissionChanges::new();
            for def in defs.iter() {
                if def.reference.is_remote() {
                    return Err(ApiError::invalid_param(
                        "url",
                        "bad-url",
                        format!("type {} is not held by this installation", def.reference),
                    )
                    .into());
                }
                if tx.get_type(&def.reference)?.is_some() {
                    return Err(ApiError::conflict(
                        "unique",
                        format!("type {} already exists", def.reference),
                    )
                    .into());
                }
                tx.create_type(def)?;
                if let Some(ref catalog) = def.catalog {
                    changes.record_catalog_change(tx, cache, catalog, def.component)?;
                }
            }
            Ok(changes)
        })?;

        info!("Registered {} type(s)", defs.len());
        self.publish(settings, changes);
        Ok(())
    }

    fn update(
        &self,
        settings: &Settings,
        uuid: &str,
        input: ApplicationInput,
    ) -> Result<ApplicationView, ApiError> {
        let base = settings.public_base_url.as_str();

        let (view, changes) = self.db.with_transaction(|tx, cache| {
            if tx.get_application(uuid)?.is_none() {
                return Err(not_found(uuid).into());
            }
            check_client_ids(tx, uuid, &input.client_ids)?;

            match input.grants {
                Some(ref grants) => {
                    tx.delete_application_grants(uuid)?;
                    let dropped = tx.delete_application_catalog_grants(uuid)?;
                    if dropped > 0 {
                        info!("Grants of application {uuid} replaced, dropped {dropped} catalog grant(s)");
                    }
                    create_grants(tx, uuid, grants)?;
                }
                None => check_untouched_grants(tx, uuid, input.has_all_permissions)?,
            }

            let app = Application {
                uuid: uuid.to_string(),
                label: input.label.clone(),
                client_ids: input.client_ids.clone(),
                has_all_permissions: input.has_all_permissions,
            };
            tx.update_application(&app)?;
            cache.invalidate_application(uuid)?;

            let mut changes = PermissionChanges::new();
            changes.record(uuid, Action::Update);
            Ok((build_view(tx, base, &app)?, changes))
        })?;

        info!("Updated application {uuid} ({})", view.label);
        self.publish(settings, changes);
        Ok(view)
    }

    fn validate_body(&self, body: &ApplicationBody) -> Result<ApplicationInput, ApiError> {
        let mut validation = Validation::new();
        let client_ids = validate_client_ids(&mut validation, &body.client_ids);
        validate_label(&mut validation, &body.label);
        if body.has_all_permissions && !body.grants.is_empty() {
            validation.add(
                NON_FIELD_ERRORS,
                "ambiguous-authorizations-specified",
                "either set heeftAlleAutorisaties or list autorisaties, not both",
            );
        } else if !body.has_all_permissions && body.grants.is_empty() {
            validation.add(
                NON_FIELD_ERRORS,
                "missing-autorisaties",
                "set heeftAlleAutorisaties or list autorisaties",
            );
        }
        let grants = self.validate_grants(&mut validation, &body.grants);
        validation.finish()?;

        Ok(ApplicationInput {
            client_ids,
            label: body.label.clone(),
            has_all_permissions: body.has_all_permissions,
            grants: Some(grants),
        })
    }

    fn validate_patch(
        &self,
        current: &Application,
        patch: &ApplicationPatch,
    ) -> Result<ApplicationInput, ApiError> {
        let mut validation = Validation::new();
        let client_ids = match patch.client_ids {
            Some(ref ids) => validate_client_ids(&mut validation, ids),
            None => current.client_ids.clone(),
        };
        let label = match patch.label {
            Some(ref label) => {
                validate_label(&mut validation, label);
                label.clone()
            }
            None => current.label.clone(),
        };
        let has_all_permissions = patch
            .has_all_permissions
            .unwrap_or(current.has_all_permissions);

        let grants = match patch.grants {
            Some(ref grants) => {
                if has_all_permissions && !grants.is_empty() {
                    validation.add(
                        NON_FIELD_ERRORS,
                        "ambiguous-authorizations-specified",
                        "either set heeftAlleAutorisaties or list autorisaties, not both",
                    );
                } else if !has_all_permissions && grants.is_empty() {
                    validation.add(
                        NON_FIELD_ERRORS,
                        "missing-autorisaties",
                        "set heeftAlleAutorisaties or list autorisaties",
                    );
                }
                Some(self.validate_grants(&mut validation, grants))
            }
            None => None,
        };
        validation.finish()?;

        Ok(ApplicationInput {
            client_ids,
            label,
            has_all_permissions,
            grants,
        })
    }

    /// Converts grant payloads, adding every problem found to `validation`.
    /// The application of the returned grants is filled in when stored.
    fn validate_grants(&self, validation: &mut Validation, bodies: &[GrantBody]) -> Vec<Grant> {
        let mut grants = Vec::with_capacity(bodies.len());
        for (idx, body) in bodies.iter().enumerate() {
            let prefix = format!("autorisaties.{idx}");

            let component = match body.component.parse::<Component>() {
                Ok(component) => component,
                Err(err) => {
                    validation.add(format!("{prefix}.component"), "invalid_choice", format!("{err:#}"));
                    continue;
                }
            };

            if body.scopes.is_empty() {
                validation.add(format!("{prefix}.scopes"), "required", "scopes cannot be empty");
            }
            let scopes: ScopeSet = body.scopes.iter().cloned().collect();

            let type_ref = match component.type_field() {
                Some(field) => match body.type_field(field) {
                    Some(raw) => match self.parser.parse(raw) {
                        Ok(type_ref) => Some(type_ref),
                        Err(err) => {
                            validation.add(format!("{prefix}.{field}"), "bad-url", format!("{err:#}"));
                            None
                        }
                    },
                    None => {
                        validation.add(
                            format!("{prefix}.{field}"),
                            "required",
                            format!("{field} is required for component {component}"),
                        );
                        None
                    }
                },
                None => None,
            };

            let conf_field = format!("{prefix}.maxVertrouwelijkheidaanduiding");
            let max_confidentiality = match body.max_confidentiality.as_deref() {
                Some(raw) => match raw.parse::<Confidentiality>() {
                    Ok(level) => Some(level),
                    Err(err) => {
                        validation.add(conf_field, "invalid_choice", format!("{err:#}"));
                        None
                    }
                },
                None if component.has_confidentiality() => {
                    validation.add(
                        conf_field,
                        "required",
                        format!("maxVertrouwelijkheidaanduiding is required for component {component}"),
                    );
                    None
                }
                None => None,
            };

            grants.push(Grant {
                id: 0,
                application: String::new(),
                component,
                scopes,
                type_ref,
                max_confidentiality,
            });
        }
        grants
    }

    fn publish(&self, settings: &Settings, changes: PermissionChanges) {
        if changes.is_empty() {
            return;
        }
        let notifications = changes.into_notifications(&settings.public_base_url, Utc::now());
        self.notifier.publish(notifications);
    }
}

fn not_found(uuid: &str) -> ApiError {
    ApiError::not_found(format!("application {uuid} not found"))
}

fn validate_client_ids(validation: &mut Validation, ids: &[String]) -> BTreeSet<String> {
    if ids.is_empty() {
        validation.add("clientIds", "required", "at least one client id is required");
    }
    if ids.iter().any(|id| id.trim().is_empty()) {
        validation.add("clientIds", "blank", "client ids cannot be blank");
    }
    ids.iter().map(|id| id.trim().to_string()).collect()
}

fn validate_label(validation: &mut Validation, label: &str) {
    if label.trim().is_empty() {
        validation.add("label", "required", "label cannot be empty");
    }
}

/// A client id belongs to at most one application.
fn check_client_ids(
    tx: &dyn Transaction,
    uuid: &str,
    client_ids: &BTreeSet<String>,
) -> anyhow::Result<()> {
    let mut validation = Validation::new();
    for client_id in client_ids {
        if let Some(owner) = tx.find_client_owner(client_id)? {
            if owner != uuid {
                validation.add(
                    "clientIds",
                    "unique",
                    format!("client id {client_id} is already used by application {owner}"),
                );
            }
        }
    }
    validation.finish()?;
    Ok(())
}

/// Keeps the superuser flag and the stored grants mutually exclusive when a
/// partial update leaves the grants alone.
fn check_untouched_grants(
    tx: &dyn Transaction,
    uuid: &str,
    has_all_permissions: bool,
) -> anyhow::Result<()> {
    let has_grants = !tx.list_grants(uuid, None)?.is_empty()
        || !tx.list_catalog_grants(uuid, None)?.is_empty();
    if has_all_permissions && has_grants {
        return Err(ApiError::invalid_param(
            NON_FIELD_ERRORS,
            "ambiguous-authorizations-specified",
            "either set heeftAlleAutorisaties or list autorisaties, not both",
        )
        .into());
    }
    if !has_all_permissions && !has_grants {
        return Err(ApiError::invalid_param(
            NON_FIELD_ERRORS,
            "missing-autorisaties",
            "set heeftAlleAutorisaties or list autorisaties",
        )
        .into());
    }
    Ok(())
}

fn create_grants(tx: &dyn Transaction, uuid: &str, grants: &[Grant]) -> anyhow::Result<()> {
    for grant in grants {
        let mut grant = grant.clone();
        grant.application = uuid.to_string();
        tx.create_grant(&grant)?;
    }
    Ok(())
}

/// Renders an application with its explicit grants followed by one virtual
/// grant per type currently in each granted catalog.
fn build_view(tx: &dyn Transaction, base: &str, app: &Application) -> anyhow::Result<ApplicationView> {
    let mut grants: Vec<GrantView> = tx
        .list_grants(&app.uuid, None)?
        .iter()
        .map(|g| grant_view(base, g.component, &g.scopes, g.type_ref.as_ref(), g.max_confidentiality))
        .collect();

    for catalog_grant in tx.list_catalog_grants(&app.uuid, None)? {
        if catalog_grant.component.type_field().is_none() {
            continue;
        }
        let types = tx.list_catalog_types(&catalog_grant.catalog, catalog_grant.component)?;
        for type_ref in types.iter() {
            grants.push(grant_view(
                base,
                catalog_grant.component,
                &catalog_grant.scopes,
                Some(type_ref),
                catalog_grant.max_confidentiality,
            ));
        }
    }

    Ok(ApplicationView {
        url: application_url(base, &app.uuid),
        uuid: app.uuid.clone(),
        client_ids: app.client_ids.iter().cloned().collect(),
        label: app.label.clone(),
        has_all_permissions: app.has_all_permissions,
        grants,
    })
}

fn grant_view(
    base: &str,
    component: Component,
    scopes: &ScopeSet,
    type_ref: Option<&TypeRef>,
    max_confidentiality: Option<Confidentiality>,
) -> GrantView {
    let mut view = GrantView {
        component: component.as_str().to_string(),
        scopes: scopes.iter().map(String::from).collect(),
        zaaktype: None,
        informatieobjecttype: None,
        besluittype: None,
        max_confidentiality: max_confidentiality.map(|c| c.as_str().to_string()),
    };
    if let (Some(field), Some(type_ref)) = (component.type_field(), type_ref) {
        view.set_type_field(field, type_url(base, component, type_ref));
    }
    view
}

/// Absolute URL of a type. Remote references are already URLs.
pub fn type_url(base: &str, component: Component, type_ref: &TypeRef) -> String {
    let id = match type_ref {
        TypeRef::Remote(url) => return url.clone(),
        TypeRef::Local(id) => id,
    };
    let collection = match component {
        Component::Drc => "informatieobjecttypen",
        Component::Brc => "besluittypen",
        _ => "zaaktypen",
    };
    format!(
        "{}/catalogi/api/v1/{collection}/{id}",
        base.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use crate::catalog::TypeRelations;
    use crate::errors::ErrorKind;
    use crate::events::CHANNEL_AUTHORIZATIONS;

    use super::*;

    const CATALOG_BASE: &str = "http://localhost:8000/catalogi/api/v1";

    fn new_service() -> (Arc<Database>, AdminService, Notifier) {
        let db = Arc::new(Database::new_test());
        let parser = RefParser::new(&[CATALOG_BASE.to_string()]).unwrap();
        let notifier = Notifier::start();
        let service = AdminService::new(db.clone(), parser, notifier.clone());
        (db, service, notifier)
    }

    fn zrc_grant(zaaktype: &str, conf: &str) -> GrantBody {
        GrantBody {
            component: "zrc".to_string(),
            scopes: vec!["zaken.lezen".to_string(), "zaken.aanmaken".to_string()],
            zaaktype: Some(zaaktype.to_string()),
            max_confidentiality: Some(conf.to_string()),
            ..Default::default()
        }
    }

    fn body(client_id: &str, grants: Vec<GrantBody>) -> ApplicationBody {
        ApplicationBody {
            client_ids: vec![client_id.to_string()],
            label: format!("App {client_id}"),
            has_all_permissions: false,
            grants,
        }
    }

    fn codes(err: &ApiError) -> Vec<(&str, &str)> {
        err.invalid_params
            .iter()
            .map(|p| (p.name.as_str(), p.code.as_str()))
            .collect()
    }

    fn case_type(id: &str, catalog: &str) -> TypeDefinition {
        TypeDefinition {
            reference: TypeRef::local(id),
            component: Component::Zrc,
            catalog: Some(TypeRef::local(catalog)),
            relations: TypeRelations::default(),
        }
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_db, service, _notifier) = new_service();
        let settings = Settings::new_test();

        // Test case 1: superuser flag together with grants
        let mut b = body("c1", vec![zrc_grant("zt-1", "openbaar")]);
        b.has_all_permissions = true;
        let err = service.create_application(&settings, b).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(
            codes(&err),
            vec![(NON_FIELD_ERRORS, "ambiguous-authorizations-specified")]
        );

        // Test case 2: neither
        let err = service
            .create_application(&settings, body("c1", vec![]))
            .unwrap_err();
        assert_eq!(codes(&err), vec![(NON_FIELD_ERRORS, "missing-autorisaties")]);

        // Test case 3: every grant problem is reported at once
        let grants = vec![
            GrantBody {
                component: "zrc".to_string(),
                scopes: vec![],
                ..Default::default()
            },
            GrantBody {
                component: "zaken".to_string(),
                scopes: vec!["x".to_string()],
                ..Default::default()
            },
            zrc_grant("https://", "geheimer"),
        ];
        let mut b = body("", grants);
        b.label = String::new();
        let err = service.create_application(&settings, b).unwrap_err();
        assert_eq!(
            codes(&err),
            vec![
                ("clientIds", "blank"),
                ("label", "required"),
                ("autorisaties.0.scopes", "required"),
                ("autorisaties.0.zaaktype", "required"),
                ("autorisaties.0.maxVertrouwelijkheidaanduiding", "required"),
                ("autorisaties.1.component", "invalid_choice"),
                ("autorisaties.2.zaaktype", "bad-url"),
                ("autorisaties.2.maxVertrouwelijkheidaanduiding", "invalid_choice"),
            ]
        );

        // Test case 4: brc grants need a besluittype but no ceiling
        let grant = GrantBody {
            component: "brc".to_string(),
            scopes: vec!["besluiten.lezen".to_string()],
            besluittype: Some("bt-1".to_string()),
            ..Default::default()
        };
        assert!(service
            .create_application(&settings, body("c1", vec![grant]))
            .is_ok());
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let (_db, service, notifier) = new_service();
        let settings = Settings::new_test();
        let mut rx = notifier.subscribe(CHANNEL_AUTHORIZATIONS).await.unwrap();

        let zaaktype = format!("{CATALOG_BASE}/zaaktypen/zt-1");
        let view = service
            .create_application(&settings, body("zs-1", vec![zrc_grant(&zaaktype, "intern")]))
            .unwrap();
        assert_eq!(
            view.url,
            format!("http://localhost:8000/autorisaties/api/v1/applicaties/{}", view.uuid)
        );
        assert_eq!(view.grants.len(), 1);
        assert_eq!(view.grants[0].zaaktype.as_deref(), Some(zaaktype.as_str()));
        assert_eq!(
            view.grants[0].max_confidentiality.as_deref(),
            Some("intern")
        );

        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.actie, Action::Create);
        assert_eq!(notification.resource_url, view.url);

        assert_eq!(service.get_application(&settings, &view.uuid).unwrap(), view);
        assert_eq!(service.find_consumer(&settings, "zs-1").unwrap(), view);
        assert_eq!(service.list_applications(&settings).unwrap(), vec![view]);

        let err = service.find_consumer(&settings, "zs-2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = service.get_application(&settings, "missing").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_client_id_unique() {
        let (_db, service, _notifier) = new_service();
        let settings = Settings::new_test();

        let first = service
            .create_application(&settings, body("zs-1", vec![zrc_grant("zt-1", "openbaar")]))
            .unwrap();
        let err = service
            .create_application(&settings, body("zs-1", vec![zrc_grant("zt-1", "openbaar")]))
            .unwrap_err();
        assert_eq!(codes(&err), vec![("clientIds", "unique")]);
        assert_eq!(service.list_applications(&settings).unwrap().len(), 1);

        // Keeping its own client id is fine.
        let mut b = body("zs-1", vec![zrc_grant("zt-2", "openbaar")]);
        b.label = "Renamed".to_string();
        let view = service
            .replace_application(&settings, &first.uuid, b)
            .unwrap();
        assert_eq!(view.label, "Renamed");
    }

    #[tokio::test]
    async fn test_replace_drops_catalog_grants() {
        let (_db, service, _notifier) = new_service();
        let settings = Settings::new_test();

        let view = service
            .create_application(&settings, body("zs-1", vec![zrc_grant("zt-1", "openbaar")]))
            .unwrap();
        service
            .add_catalog_grant(
                &settings,
                CatalogGrant {
                    id: 0,
                    application: view.uuid.clone(),
                    component: Component::Zrc,
                    catalog: TypeRef::local("c1"),
                    scopes: ScopeSet::single("zaken.lezen"),
                    max_confidentiality: Some(Confidentiality::Openbaar),
                },
            )
            .unwrap();
        service
            .register_types(&settings, vec![case_type("zt-8", "c1"), case_type("zt-9", "c1")])
            .unwrap();

        // Test case 1: virtual grants for every type in the catalog
        let read = service.get_application(&settings, &view.uuid).unwrap();
        assert_eq!(read.grants.len(), 3);
        let virtual_types: Vec<_> = read.grants[1..]
            .iter()
            .map(|g| g.zaaktype.clone().unwrap())
            .collect();
        assert_eq!(
            virtual_types,
            vec![
                format!("{CATALOG_BASE}/zaaktypen/zt-8"),
                format!("{CATALOG_BASE}/zaaktypen/zt-9"),
            ]
        );

        // Test case 2: replacing the grants drops the catalog grant
        let replaced = service
            .replace_application(&settings, &view.uuid, body("zs-1", vec![zrc_grant("zt-2", "geheim")]))
            .unwrap();
        assert_eq!(replaced.grants.len(), 1);
        assert_eq!(
            replaced.grants[0].zaaktype.as_deref(),
            Some(format!("{CATALOG_BASE}/zaaktypen/zt-2").as_str())
        );

        // Test case 3: a patch without grants leaves them alone
        let patched = service
            .patch_application(
                &settings,
                &view.uuid,
                ApplicationPatch {
                    label: Some("Patched".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(patched.label, "Patched");
        assert_eq!(patched.grants, replaced.grants);

        // Test case 4: turning on the superuser flag needs the grants cleared
        let err = service
            .patch_application(
                &settings,
                &view.uuid,
                ApplicationPatch {
                    has_all_permissions: Some(true),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(
            codes(&err),
            vec![(NON_FIELD_ERRORS, "ambiguous-authorizations-specified")]
        );
        let patched = service
            .patch_application(
                &settings,
                &view.uuid,
                ApplicationPatch {
                    has_all_permissions: Some(true),
                    grants: Some(vec![]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(patched.has_all_permissions);
        assert!(patched.grants.is_empty());
    }

    #[tokio::test]
    async fn test_register_type_notifies_holders() {
        let (_db, service, notifier) = new_service();
        let settings = Settings::new_test();
        let mut rx = notifier.subscribe(CHANNEL_AUTHORIZATIONS).await.unwrap();

        let holder = service
            .create_application(&settings, body("zs-1", vec![zrc_grant("zt-1", "openbaar")]))
            .unwrap();
        let other = service
            .create_application(&settings, body("zs-2", vec![zrc_grant("zt-1", "openbaar")]))
            .unwrap();
        service
            .add_catalog_grant(
                &settings,
                CatalogGrant {
                    id: 0,
                    application: holder.uuid.clone(),
                    component: Component::Zrc,
                    catalog: TypeRef::local("c1"),
                    scopes: ScopeSet::single("zaken.lezen"),
                    max_confidentiality: Some(Confidentiality::Openbaar),
                },
            )
            .unwrap();
        service
            .register_types(&settings, vec![case_type("zt-8", "c1"), case_type("zt-9", "c1")])
            .unwrap();

        let err = service
            .register_type(&settings, case_type("zt-8", "c1"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        // A type in a catalog nobody holds notifies nobody.
        service
            .register_type(&settings, case_type("zt-10", "c2"))
            .unwrap();
        service.delete_application(&settings, &other.uuid).unwrap();

        let mut seen = Vec::new();
        for _ in 0..5 {
            let n = rx.recv().await.unwrap();
            seen.push((n.actie, n.resource_url));
        }
        assert_eq!(
            seen,
            vec![
                (Action::Create, holder.url.clone()),
                (Action::Create, other.url.clone()),
                // catalog grant added
                (Action::Update, holder.url.clone()),
                // two types registered in one batch, one update
                (Action::Update, holder.url.clone()),
                (Action::Destroy, other.url.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn test_grant_mutations() {
        let (_db, service, _notifier) = new_service();
        let settings = Settings::new_test();

        let view = service
            .create_application(&settings, body("zs-1", vec![zrc_grant("zt-1", "openbaar")]))
            .unwrap();
        let grant = service
            .add_grant(
                &settings,
                Grant {
                    id: 0,
                    application: view.uuid.clone(),
                    component: Component::Drc,
                    scopes: ScopeSet::single("documenten.lezen"),
                    type_ref: Some(TypeRef::local("iot-1")),
                    max_confidentiality: Some(Confidentiality::Intern),
                },
            )
            .unwrap();
        assert!(grant.id > 0);

        let read = service.get_application(&settings, &view.uuid).unwrap();
        assert_eq!(
            read.grants[1].informatieobjecttype.as_deref(),
            Some(format!("{CATALOG_BASE}/informatieobjecttypen/iot-1").as_str())
        );

        let revoked = service.revoke_grant(&settings, grant.id).unwrap();
        assert_eq!(revoked, grant);
        let err = service.revoke_grant(&settings, grant.id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let mut orphan = grant.clone();
        orphan.application = "missing".to_string();
        let err = service.add_grant(&settings, orphan).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_type_url() {
        let remote = TypeRef::remote("https://other.example.nl/catalogi/api/v1/zaaktypen/1");
        assert_eq!(
            type_url("http://localhost:8000", Component::Zrc, &remote),
            "https://other.example.nl/catalogi/api/v1/zaaktypen/1"
        );
        assert_eq!(
            type_url("http://localhost:8000/", Component::Brc, &TypeRef::local("bt-1")),
            "http://localhost:8000/catalogi/api/v1/besluittypen/bt-1"
        );
    }
}
