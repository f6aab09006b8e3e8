use chrono::NaiveDate;
use thiserror::Error;

use crate::catalog::{ArchiveDerivation, DerivationMethod, ResultType};
use crate::db::CaseRecord;
use crate::types::period::PeriodError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("derivation '{0}' requires a date attribute")]
    MissingDateAttribute(&'static str),
    #[error("case property '{0}' is not set")]
    MissingProperty(String),
    #[error("case property '{name}' holds '{value}', which is not a date")]
    InvalidPropertyDate { name: String, value: String },
    #[error("derivation 'termijn' requires a process period")]
    MissingProcessPeriod,
    #[error("no decision is attached to the case")]
    NoDecision,
    #[error("no decision on the case has an expiry date")]
    NoExpiryDate,
    #[error("no related case has an end date")]
    NoRelatedCase,
    #[error("derivation '{0}' is not supported")]
    Unsupported(&'static str),
    #[error(transparent)]
    Period(#[from] PeriodError),
}

/// What a derivation may read.
pub struct ArchiveInput<'a> {
    pub case: &'a CaseRecord,
    /// The end date the case gets (or has).
    pub end_date: NaiveDate,
    pub main_case_end_date: Option<NaiveDate>,
}

/// The source date (brondatum) the archive action period starts from. `None`
/// when the derivation yields no date yet.
pub fn source_date(
    derivation: &ArchiveDerivation,
    input: &ArchiveInput,
) -> Result<Option<NaiveDate>, ArchiveError> {
    let date = match derivation.method {
        DerivationMethod::Afgehandeld => Some(input.end_date),
        DerivationMethod::Hoofdzaak => input.main_case_end_date,
        DerivationMethod::AnderDatumkenmerk => None,
        DerivationMethod::Termijn => {
            let period = derivation
                .process_period
                .ok_or(ArchiveError::MissingProcessPeriod)?;
            Some(period.add_to(input.end_date)?)
        }
        DerivationMethod::Eigenschap => {
            let name = derivation
                .date_attribute
                .as_deref()
                .ok_or(ArchiveError::MissingDateAttribute("eigenschap"))?;
            let value = input
                .case
                .properties
                .get(name)
                .ok_or_else(|| ArchiveError::MissingProperty(name.to_string()))?;
            Some(parse_property_date(name, value)?)
        }
        DerivationMethod::IngangsdatumBesluit => {
            let date = input.case.decisions.iter().map(|d| d.effective_date).max();
            Some(date.ok_or(ArchiveError::NoDecision)?)
        }
        DerivationMethod::VervaldatumBesluit => {
            if input.case.decisions.is_empty() {
                return Err(ArchiveError::NoDecision);
            }
            let date = input
                .case
                .decisions
                .iter()
                .filter_map(|d| d.expiry_date)
                .max();
            Some(date.ok_or(ArchiveError::NoExpiryDate)?)
        }
        DerivationMethod::GerelateerdeZaak => {
            let date = input.case.related_end_dates.iter().max().copied();
            Some(date.ok_or(ArchiveError::NoRelatedCase)?)
        }
        DerivationMethod::Zaakobject => return Err(ArchiveError::Unsupported("zaakobject")),
    };
    Ok(date)
}

/// Source date plus the archive action period of the result-type.
pub fn action_date(
    result_type: &ResultType,
    input: &ArchiveInput,
) -> Result<Option<NaiveDate>, ArchiveError> {
    let Some(period) = result_type.archive_action_period else {
        return Ok(None);
    };
    match source_date(&result_type.derivation, input)? {
        Some(date) => Ok(Some(period.add_to(date)?)),
        None => Ok(None),
    }
}

// Properties hold either a plain date or a full timestamp.
fn parse_property_date(name: &str, value: &str) -> Result<NaiveDate, ArchiveError> {
    let raw = value.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    date_part
        .parse::<NaiveDate>()
        .map_err(|_| ArchiveError::InvalidPropertyDate {
            name: name.to_string(),
            value: value.to_string(),
        })
}
