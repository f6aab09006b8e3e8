pub mod cache;
pub mod config;
pub mod remote;
pub mod resolver;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Component, Period, TypeRef};

/// A type object as seen by the authorization core: where it lives and what it
/// relates to. Local definitions are stored in the database, remote ones are
/// built from the catalog API of another installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub reference: TypeRef,
    pub component: Component,
    /// Owning catalog, absent when a remote catalog did not report one.
    pub catalog: Option<TypeRef>,
    #[serde(default)]
    pub relations: TypeRelations,
}

/// Relations a case-type carries. Document-, decision- and status-types have
/// empty relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRelations {
    #[serde(default)]
    pub document_types: BTreeSet<TypeRef>,
    #[serde(default)]
    pub decision_types: BTreeSet<TypeRef>,
    #[serde(default)]
    pub status_types: Vec<StatusType>,
    #[serde(default)]
    pub result_types: Vec<ResultType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "document")]
    Document,
    #[serde(rename = "decision")]
    Decision,
    #[serde(rename = "status")]
    Status,
    #[serde(rename = "result")]
    Result,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusType {
    pub reference: TypeRef,
    /// Sequence number (volgnummer) within the case-type.
    pub order: u32,
    /// Recording a status of this type closes the case.
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultType {
    pub reference: TypeRef,
    #[serde(default)]
    pub archive_nomination: Option<String>,
    #[serde(default)]
    pub archive_action_period: Option<Period>,
    pub derivation: ArchiveDerivation,
}

/// How the source date (brondatum) for archiving is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveDerivation {
    pub method: DerivationMethod,
    /// Used by `termijn`.
    #[serde(default)]
    pub process_period: Option<Period>,
    /// Case property holding the date, used by `eigenschap`.
    #[serde(default)]
    pub date_attribute: Option<String>,
}

impl ArchiveDerivation {
    pub fn new(method: DerivationMethod) -> Self {
        Self {
            method,
            process_period: None,
            date_attribute: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivationMethod {
    /// The date the case was closed.
    #[serde(rename = "afgehandeld")]
    Afgehandeld,
    /// A date held in a named case property.
    #[serde(rename = "eigenschap")]
    Eigenschap,
    /// The end date of the main case.
    #[serde(rename = "hoofdzaak")]
    Hoofdzaak,
    /// End date plus the process period.
    #[serde(rename = "termijn")]
    Termijn,
    /// Set by hand, never derived.
    #[serde(rename = "ander_datumkenmerk")]
    AnderDatumkenmerk,
    #[serde(rename = "ingangsdatum_besluit")]
    IngangsdatumBesluit,
    #[serde(rename = "vervaldatum_besluit")]
    VervaldatumBesluit,
    #[serde(rename = "gerelateerde_zaak")]
    GerelateerdeZaak,
    #[serde(rename = "zaakobject")]
    Zaakobject,
}

impl DerivationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Afgehandeld => "afgehandeld",
            Self::Eigenschap => "eigenschap",
            Self::Hoofdzaak => "hoofdzaak",
            Self::Termijn => "termijn",
            Self::AnderDatumkenmerk => "ander_datumkenmerk",
            Self::IngangsdatumBesluit => "ingangsdatum_besluit",
            Self::VervaldatumBesluit => "vervaldatum_besluit",
            Self::GerelateerdeZaak => "gerelateerde_zaak",
            Self::Zaakobject => "zaakobject",
        }
    }
}

impl TypeDefinition {
    pub fn status_type(&self, reference: &TypeRef) -> Option<&StatusType> {
        self.relations
            .status_types
            .iter()
            .find(|s| &s.reference == reference)
    }

    pub fn result_type(&self, reference: &TypeRef) -> Option<&ResultType> {
        self.relations
            .result_types
            .iter()
            .find(|r| &r.reference == reference)
    }

    /// The related type references of one kind.
    pub fn related(&self, relation: Relation) -> BTreeSet<TypeRef> {
        match relation {
            Relation::Document => self.relations.document_types.clone(),
            Relation::Decision => self.relations.decision_types.clone(),
            Relation::Status => self
                .relations
                .status_types
                .iter()
                .map(|s| s.reference.clone())
                .collect(),
            Relation::Result => self
                .relations
                .result_types
                .iter()
                .map(|r| r.reference.clone())
                .collect(),
        }
    }
}
