use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::Error;
use crate::policy::Actor;
use crate::state::State;

/// The authenticated caller of a request.
///
/// A missing `Authorization` header yields [`Actor::Anonymous`]; a malformed
/// header or an unknown token is rejected with 401.
pub struct Caller(pub Actor);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, Error> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| Error::Unauthorized)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("Token "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(Error::Unauthorized)?;
    Ok(Some(token))
}

impl FromRequestParts<Arc<State>> for Caller {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<State>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let actor = state.core.authenticate(token).await?;
        Ok(Caller(actor))
    }
}
