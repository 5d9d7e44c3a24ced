use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use tracing::error;

use devdeck_core::errors::Error;

/// HTTP view of a core error: status code plus a one-field JSON body.
///
/// Most endpoints answer `{"message": ...}`; the web login answers
/// `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    key: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            key: "message",
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn with_key(mut self, key: &'static str) -> Self {
        self.key = key;
        self
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::UserNotFound => Self::new(StatusCode::UNAUTHORIZED, "Invalid access code"),
            Error::InvalidCredentials => Self::new(StatusCode::UNAUTHORIZED, "Invalid credentials"),
            Error::ResourceNotFound(_) => Self::new(StatusCode::NOT_FOUND, "Not Found"),
            Error::EmptyPool => Self::new(StatusCode::NOT_FOUND, "Live drop pool is empty"),
            Error::Validation(message) => Self::validation(message),
            other => {
                error!(error = %other, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(format!("Malformed payload: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(format!("Invalid path: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert(self.key.to_string(), Value::String(self.message));
        (self.status, Json(Value::Object(body))).into_response()
    }
}
