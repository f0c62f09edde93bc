use std::convert::Infallible;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts,
    },
    http::{request::Parts, StatusCode},
};
use modkit::{Problem, ProblemResponse};
use tracing::error;

use crate::domain::error::DomainError;

pub const CODE_NOT_FOUND: &str = "VOUCHERS_NOT_FOUND";
pub const CODE_CONFLICT: &str = "VOUCHERS_CODE_CONFLICT";
pub const CODE_VALIDATION: &str = "VOUCHERS_VALIDATION";
pub const CODE_INTERNAL: &str = "INTERNAL_DB";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request path and id, copied into every problem document.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub instance: String,
    pub request_id: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            instance: parts.uri.path().to_string(),
            request_id: parts
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        })
    }
}

impl RequestMeta {
    fn finish(&self, problem: Problem) -> ProblemResponse {
        let problem = problem.with_instance(self.instance.clone());
        match &self.request_id {
            Some(id) => problem.with_request_id(id.clone()),
            None => problem,
        }
        .into()
    }

    /// 400 for malformed input that never reached the domain layer.
    pub fn bad_input(&self, detail: impl Into<String>) -> ProblemResponse {
        let problem = Problem::from_status(StatusCode::BAD_REQUEST, detail).with_code(CODE_VALIDATION);
        self.finish(problem)
    }

    pub fn json_rejection(&self, rejection: JsonRejection) -> ProblemResponse {
        self.bad_input(rejection.body_text())
    }

    pub fn path_rejection(&self, rejection: PathRejection) -> ProblemResponse {
        self.bad_input(rejection.body_text())
    }

    pub fn query_rejection(&self, rejection: QueryRejection) -> ProblemResponse {
        self.bad_input(rejection.body_text())
    }

    pub fn domain(&self, err: &DomainError) -> ProblemResponse {
        self.finish(domain_problem(err))
    }
}

/// Maps a domain error onto its problem document. Storage details stay in the log.
pub fn domain_problem(err: &DomainError) -> Problem {
    let (status, code) = match err {
        DomainError::VoucherNotFound { .. } => (StatusCode::NOT_FOUND, CODE_NOT_FOUND),
        DomainError::CodeAlreadyExists { .. } => (StatusCode::CONFLICT, CODE_CONFLICT),
        DomainError::Database { message } => {
            error!(error = %message, "Voucher storage failure");
            return Problem::from_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred",
            )
            .with_code(CODE_INTERNAL);
        }
        _ => (StatusCode::BAD_REQUEST, CODE_VALIDATION),
    };

    let problem = Problem::from_status(status, err.to_string()).with_code(code);
    match err.field() {
        Some(field) => problem.with_field_error(field, err.to_string()),
        None => problem,
    }
}

impl From<DomainError> for ProblemResponse {
    fn from(err: DomainError) -> Self {
        domain_problem(&err).into()
    }
}
