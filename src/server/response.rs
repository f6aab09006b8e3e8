use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use log::{error, info, warn};
use serde::Serialize;

use crate::errors::{ApiError, ErrorKind};

pub const MIME_PROBLEM_JSON: &str = "application/problem+json";

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating the bodies the Authorizations API returns
pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn json<T: Serialize>(data: T) -> Self {
        Self::json_status(StatusCode::OK, data)
    }

    pub fn created<T: Serialize>(data: T) -> Self {
        Self::json_status(StatusCode::CREATED, data)
    }

    pub fn no_content() -> Self {
        Self {
            http_response: HttpResponse::NoContent().finish(),
        }
    }

    pub fn method_not_allowed(base_url: &str) -> Self {
        Self::error(&ApiError::method_not_allowed(), base_url)
    }

    /// Renders `err` as a problem body. Every problem gets its own instance
    /// URN, which is also written to the log.
    pub fn error(err: &ApiError, base_url: &str) -> Self {
        let problem = err.to_problem(base_url);
        match err.kind {
            ErrorKind::InternalError => error!("{}: {err}", problem.instance),
            ErrorKind::UpstreamUnavailable => warn!("{}: {err}", problem.instance),
            ErrorKind::PermissionDenied | ErrorKind::NotAuthenticated | ErrorKind::TokenInvalid => {
                info!("{}: {err}", problem.instance)
            }
            _ => {}
        }

        let status =
            StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            http_response: HttpResponseBuilder::new(status)
                .content_type(MIME_PROBLEM_JSON)
                .json(problem),
        }
    }

    fn json_status<T: Serialize>(status: StatusCode, data: T) -> Self {
        Self {
            http_response: HttpResponseBuilder::new(status).json(data),
        }
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        val.http_response
    }
}
