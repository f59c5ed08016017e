// carta-controller/src/auth.rs
// Identity binding for incoming connections. Credential verification
// itself lives in external collaborators; the gateway only needs an
// authenticated username attached to the request before the upgrade.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use carta_config::AuthMode;

use crate::gateway::AppState;

/// Identity bound to a session for its whole lifetime.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser>;
}

/// Authenticator for `auth_mode = none`: every connection runs as the user
/// the controller itself runs as.
pub struct LocalAuthenticator {
    username: String,
}

impl LocalAuthenticator {
    pub fn new() -> Self {
        let username = std::env::var("USER").unwrap_or_else(|_| "anonymous".to_string());
        Self { username }
    }
}

impl Default for LocalAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    async fn authenticate(&self, _headers: &HeaderMap) -> Result<AuthenticatedUser> {
        Ok(AuthenticatedUser {
            username: self.username.clone(),
        })
    }
}

/// Builds the authenticator for the configured mode. PAM and OIDC live in
/// external collaborators that are not part of this build.
pub fn build_authenticator(mode: AuthMode) -> Result<Arc<dyn Authenticator>> {
    match mode {
        AuthMode::None => Ok(Arc::new(LocalAuthenticator::new())),
        other => bail!("auth mode '{}' is not available in this build", other),
    }
}

/// Middleware that resolves the identity and attaches it to the request,
/// so the websocket handler can bind it into the session.
pub async fn attach_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match state.authenticator.authenticate(req.headers()).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => {
            warn!("Auth failed: {}", e);
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}
