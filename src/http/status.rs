//! JSON envelope shared by every endpoint.

use crate::error::RltailError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// `{Status, ErrorCode, Description, Data}` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status<T> {
    pub status: bool,
    pub error_code: String,
    pub description: String,
    pub data: Option<T>,
}

impl<T: Serialize> Status<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: true,
            error_code: String::new(),
            description: String::new(),
            data: Some(data),
        }
    }

    pub fn ok_with_description(description: impl Into<String>, data: T) -> Self {
        Self {
            description: description.into(),
            ..Self::ok(data)
        }
    }

    pub fn failure(error_code: &str, description: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status: false,
            error_code: error_code.to_string(),
            description: description.into(),
            data,
        }
    }
}

/// HTTP status and stable error code for an error
pub fn classify(error: &RltailError) -> (StatusCode, &'static str) {
    match error {
        RltailError::NotFound { .. } => (StatusCode::NOT_FOUND, "FILE_NOT_FOUND"),
        RltailError::GateBusy => (StatusCode::CONFLICT, "GATE_BUSY"),
        RltailError::InvalidValue { .. } => (StatusCode::BAD_REQUEST, "INVALID_VALUE"),
        RltailError::InvalidArgument { .. } => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
        RltailError::DecompressionFailure { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "UNABLE_DECOMPRESS")
        }
        RltailError::FileError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        RltailError::CatalogUnavailable { .. }
        | RltailError::EmptyCatalog { .. }
        | RltailError::ConfigError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    }
}

/// Error response carrying an optional data payload
pub struct ApiError<T = ()> {
    pub error: RltailError,
    pub data: Option<T>,
}

impl From<RltailError> for ApiError {
    fn from(error: RltailError) -> Self {
        Self { error, data: None }
    }
}

impl<T: Serialize> IntoResponse for ApiError<T> {
    fn into_response(self) -> Response {
        let (code, error_code) = classify(&self.error);
        let body = Status::failure(error_code, self.error.to_string(), self.data);
        (code, Json(body)).into_response()
    }
}

/// Response for a request missing a required query parameter
pub fn missing_parameter(names: &str, usage: &str) -> Response {
    let body: Status<()> = Status::failure(
        "MISSING_PARAMETER",
        format!("Parameter not found: {names}. Example: {usage}"),
        None,
    );
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}
