use std::{collections::BTreeMap, fmt};

use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Field name -> messages, serialized as `{"email": ["..."]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    #[cfg(test)]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), AccountError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AccountError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{}: {}", field, messages.join(" "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unable to authenticate with provided credentials.")]
    InvalidCredentials,

    #[error("This field may not be blank.")]
    BlankField(&'static str),

    #[error("Authentication credentials were not provided.")]
    MissingCredentials,

    #[error("Invalid token.")]
    InvalidToken,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials | AuthError::BlankField(_) => StatusCode::BAD_REQUEST,
            AuthError::MissingCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccountError::Validation(_) => StatusCode::BAD_REQUEST,
            AccountError::Auth(e) => e.status(),
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

const BODY_FIELDS: [&str; 3] = ["email", "password", "name"];

/// Best effort: attribute a body error to the field named in its serde path.
fn rejected_field(detail: &str) -> &'static str {
    BODY_FIELDS
        .into_iter()
        .find(|field| detail.contains(&format!(": {field}: ")))
        .unwrap_or("non_field_errors")
}

impl From<JsonRejection> for AccountError {
    fn from(rejection: JsonRejection) -> Self {
        let detail = rejection.body_text();
        AccountError::Validation(FieldErrors::single(rejected_field(&detail), detail))
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AccountError::Validation(errors) => (status, Json(errors)).into_response(),
            AccountError::Auth(AuthError::InvalidCredentials) => (
                status,
                Json(json!({ "non_field_errors": [AuthError::InvalidCredentials.to_string()] })),
            )
                .into_response(),
            AccountError::Auth(e @ AuthError::BlankField(field)) => {
                (status, Json(FieldErrors::single(field, e.to_string()))).into_response()
            }
            AccountError::Auth(e) => (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(json!({ "detail": e.to_string() })),
            )
                .into_response(),
            AccountError::Internal(e) => {
                error!(error = %e, "internal error");
                (status, Json(json!({ "detail": "Internal server error." }))).into_response()
            }
        }
    }
}
