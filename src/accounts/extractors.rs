use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};

use crate::accounts::errors::{AccountError, AuthError};

/// JSON body whose rejections are reported as validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AccountError))]
pub struct ValidJson<T>(pub T);

/// Token taken from `Authorization: Bearer <key>` (or `Token <key>`).
/// Only the header shape is checked here; the key is resolved by the service.
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AccountError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingCredentials)?;

        parse_authorization(auth).map(|t| BearerToken(t.to_string()))
    }
}

fn parse_authorization(value: &str) -> Result<&str, AccountError> {
    let mut parts = value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::MissingCredentials)?;
    if !scheme.eq_ignore_ascii_case("bearer") && !scheme.eq_ignore_ascii_case("token") {
        return Err(AuthError::MissingCredentials.into());
    }
    match (parts.next(), parts.next()) {
        (Some(token), None) => Ok(token),
        // "Bearer" alone or a key containing spaces
        _ => Err(AuthError::InvalidToken.into()),
    }
}
