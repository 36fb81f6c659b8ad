use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;

use crate::config::{ApiKey, Config, Permission};
use crate::tnc::TncHandle;

use super::api::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tnc: TncHandle,
}

/// A chase-team member identified by their API key. Only the outbound
/// routes ask for one; everything read-only is open.
#[derive(Debug, Clone)]
pub struct Operator {
    key: ApiKey,
}

impl Operator {
    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Checks that this operator may feed the queue behind `permission`.
    pub fn authorize(&self, permission: Permission) -> Result<(), ApiError> {
        if self.key.permissions.contains(&permission) {
            return Ok(());
        }
        log::warn!(
            "{} tried to use the {} queue without {:?}",
            self.name(),
            permission.queue(),
            permission
        );
        Err(ApiError::Forbidden {
            operator: self.key.name.clone(),
            queue: permission.queue(),
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::Unauthorized("missing_api_key"))?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(ApiError::Unauthorized("malformed_authorization"))
}

impl FromRequestParts<AppState> for Operator {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(&parts.headers)?;
        match state.config.find_api_key(token) {
            Some(key) => Ok(Operator { key: key.clone() }),
            None => {
                log::warn!("Rejected {} {} with an unknown API key", parts.method, parts.uri);
                Err(ApiError::Unauthorized("unknown_api_key"))
            }
        }
    }
}
