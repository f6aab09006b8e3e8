use std::fmt;

use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error categories surfaced to API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotAuthenticated,
    TokenInvalid,
    PermissionDenied,
    CaseClosed,
    InvalidInput,
    TypeMismatch,
    NotFound,
    MethodNotAllowed,
    Conflict,
    UpstreamUnavailable,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotAuthenticated => "not-authenticated",
            ErrorKind::TokenInvalid => "token-invalid",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::CaseClosed => "case-closed",
            ErrorKind::InvalidInput => "invalid-input",
            ErrorKind::TypeMismatch => "type-mismatch",
            ErrorKind::NotFound => "not-found",
            ErrorKind::MethodNotAllowed => "method-not-allowed",
            ErrorKind::Conflict => "conflict",
            ErrorKind::UpstreamUnavailable => "upstream-unavailable",
            ErrorKind::InternalError => "internal-error",
        }
    }

    /// Name used in the problem `type` URI.
    pub fn type_name(&self) -> &'static str {
        match self {
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::TokenInvalid => "TokenInvalid",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::CaseClosed => "CaseClosed",
            ErrorKind::InvalidInput => "ValidationError",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorKind::InternalError => "APIException",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::NotAuthenticated | ErrorKind::TokenInvalid => 401,
            ErrorKind::PermissionDenied | ErrorKind::CaseClosed => 403,
            ErrorKind::InvalidInput | ErrorKind::TypeMismatch => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Conflict => 409,
            ErrorKind::UpstreamUnavailable => 502,
            ErrorKind::InternalError => 500,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ErrorKind::NotAuthenticated => "Authentication credentials were not provided.",
            ErrorKind::TokenInvalid => "The provided token is not valid.",
            ErrorKind::PermissionDenied => "You do not have permission to perform this action.",
            ErrorKind::CaseClosed => "The case is closed.",
            ErrorKind::InvalidInput => "Invalid input.",
            ErrorKind::TypeMismatch => "The referenced type does not match.",
            ErrorKind::NotFound => "Not found.",
            ErrorKind::MethodNotAllowed => "Method not allowed.",
            ErrorKind::Conflict => "The request conflicts with the current state.",
            ErrorKind::UpstreamUnavailable => "An upstream service is unavailable.",
            ErrorKind::InternalError => "A server error occurred.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidParam {
    pub name: String,
    pub code: String,
    pub reason: String,
}

impl InvalidParam {
    pub fn new(name: impl Into<String>, code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            reason: reason.into(),
        }
    }
}

/// The error returned by every operation that faces an API consumer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} ({code}): {detail}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub code: String,
    pub detail: String,
    pub invalid_params: Vec<InvalidParam>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            detail: detail.into(),
            invalid_params: Vec::new(),
        }
    }

    pub fn not_authenticated() -> Self {
        Self::new(
            ErrorKind::NotAuthenticated,
            "not_authenticated",
            ErrorKind::NotAuthenticated.title(),
        )
    }

    pub fn permission_denied() -> Self {
        Self::new(
            ErrorKind::PermissionDenied,
            "permission_denied",
            ErrorKind::PermissionDenied.title(),
        )
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, "not_found", detail)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(
            ErrorKind::MethodNotAllowed,
            "method_not_allowed",
            ErrorKind::MethodNotAllowed.title(),
        )
    }

    pub fn conflict(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, code, detail)
    }

    pub fn type_mismatch(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, code, detail)
    }

    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, "upstream_unavailable", detail)
    }

    pub fn invalid(params: Vec<InvalidParam>) -> Self {
        let detail = params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.reason))
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            kind: ErrorKind::InvalidInput,
            code: "invalid".to_string(),
            detail,
            invalid_params: params,
        }
    }

    pub fn invalid_param(
        name: impl Into<String>,
        code: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::invalid(vec![InvalidParam::new(name, code, reason)])
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, "error", detail)
    }

    /// Renders the problem+json envelope. Every call mints a fresh `instance`.
    pub fn to_problem(&self, public_base_url: &str) -> Problem {
        let base = public_base_url.trim_end_matches('/');
        Problem {
            problem_type: format!("{base}/ref/fouten/{}/", self.kind.type_name()),
            code: self.code.clone(),
            title: self.kind.title().to_string(),
            status: self.kind.status(),
            detail: self.detail.clone(),
            instance: format!("urn:uuid:{}", Uuid::new_v4()),
            invalid_params: self.invalid_params.clone(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Errors raised inside a transaction closure travel as anyhow errors.
        match err.downcast::<ApiError>() {
            Ok(err) => err,
            Err(err) => {
                // Storage errors may quote SQL, only the log gets the chain.
                error!("Internal error: {err:#}");
                Self::internal(ErrorKind::InternalError.title())
            }
        }
    }
}

/// Accumulates field errors so all of them are reported at once.
#[derive(Debug, Default)]
pub struct Validation {
    params: Vec<InvalidParam>,
}

impl Validation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, code: impl Into<String>, reason: impl Into<String>) {
        self.params.push(InvalidParam::new(name, code, reason));
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.params.is_empty() {
            return Ok(());
        }
        Err(ApiError::invalid(self.params))
    }
}

/// RFC 7807 problem body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub code: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    #[serde(rename = "invalidParams", default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_params: Vec<InvalidParam>,
}
