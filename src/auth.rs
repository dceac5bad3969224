//! Bearer-token authentication middleware and the identity collaborator.
//!
//! User accounts live in an external identity provider; this backend only
//! sees opaque user references. The auth guard resolves the bearer token on
//! each request and injects the [UserId] as a request extension.

use std::{collections::HashMap, path::Path, sync::Arc};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::Deserialize;

use crate::{AppState, Error, database_id::UserId};

/// The identity of a user as known to the external identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    /// The opaque user reference.
    pub user_id: UserId,
    /// The address report and alert emails are sent to.
    pub email: String,
    /// The user's given name, used in email greetings.
    pub first_name: String,
    /// The user's family name, used in email greetings.
    pub last_name: String,
}

/// The external user-identity collaborator.
///
/// Issues opaque user references for bearer tokens and resolves references
/// back to profiles for the background jobs that send email.
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token to a user reference, or `None` if the token is
    /// unknown or expired.
    fn resolve_token(&self, token: &str) -> Option<UserId>;

    /// Look up the profile for a user reference.
    fn profile(&self, user_id: UserId) -> Option<UserProfile>;

    /// Every user known to the provider. Used by the report generator to fan
    /// out over all users.
    fn list_users(&self) -> Vec<UserProfile>;
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    token: String,
    user_id: UserId,
    email: String,
    first_name: String,
    last_name: String,
}

/// An [IdentityProvider] backed by a static token table.
///
/// Suitable for self-hosted deployments: the server loads a JSON array of
/// `{token, user_id, email, first_name, last_name}` entries at start-up.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, UserId>,
    profiles: HashMap<UserId, UserProfile>,
}

impl StaticIdentityProvider {
    /// Load the token table from a JSON file.
    ///
    /// # Errors
    /// Returns a validation error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|error| {
            Error::Validation(format!("could not read identity file {path:?}: {error}"))
        })?;

        Self::from_json(&text)
    }

    /// Parse the token table from JSON text.
    ///
    /// # Errors
    /// Returns a validation error if the text is not a valid token table.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let entries: Vec<TokenEntry> = serde_json::from_str(text).map_err(|error| {
            Error::Validation(format!("could not parse identity file: {error}"))
        })?;

        let mut provider = Self::default();

        for entry in entries {
            provider.insert(
                &entry.token,
                UserProfile {
                    user_id: entry.user_id,
                    email: entry.email,
                    first_name: entry.first_name,
                    last_name: entry.last_name,
                },
            );
        }

        Ok(provider)
    }

    /// Register a token for a user profile.
    pub fn insert(&mut self, token: &str, profile: UserProfile) {
        self.tokens.insert(token.to_owned(), profile.user_id);
        self.profiles.insert(profile.user_id, profile);
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn resolve_token(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token).copied()
    }

    fn profile(&self, user_id: UserId) -> Option<UserProfile> {
        self.profiles.get(&user_id).cloned()
    }

    fn list_users(&self) -> Vec<UserProfile> {
        let mut users: Vec<UserProfile> = self.profiles.values().cloned().collect();
        users.sort_by_key(|profile| profile.user_id);

        users
    }
}

/// The state needed for the auth middleware.
#[derive(Clone)]
pub struct AuthState {
    /// The external identity provider.
    pub identity: Arc<dyn IdentityProvider>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            identity: state.identity.clone(),
        }
    }
}

/// Middleware function that checks for a valid bearer token.
///
/// The resolved user reference is placed into the request and the request
/// executed normally if the token is valid, otherwise a 401 response is
/// returned.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(user_id): Extension<UserId>` to receive the user reference.
pub async fn auth_guard(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let bearer = match TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &())
        .await
    {
        Ok(TypedHeader(Authorization(bearer))) => bearer,
        Err(_) => return Error::Unauthenticated.into_response(),
    };

    let user_id = match state.identity.resolve_token(bearer.token()) {
        Some(user_id) => user_id,
        None => {
            tracing::debug!("request carried an unknown bearer token");
            return Error::Unauthenticated.into_response();
        }
    };

    parts.extensions.insert(user_id);
    let request = Request::from_parts(parts, body);

    next.run(request).await
}


#[cfg(test)]
mod auth_guard_tests {
    use std::sync::Arc;

    use axum::{Extension, Router, middleware, routing::get};
    use axum_test::TestServer;

    use crate::{
        auth::{AuthState, StaticIdentityProvider, UserProfile, auth_guard},
        database_id::UserId,
    };

    async fn whoami(Extension(user_id): Extension<UserId>) -> String {
        user_id.to_string()
    }

    fn test_server() -> TestServer {
        let mut provider = StaticIdentityProvider::default();
        provider.insert(
            "alice-token",
            UserProfile {
                user_id: 7,
                email: "alice@example.com".to_owned(),
                first_name: "Alice".to_owned(),
                last_name: "Archer".to_owned(),
            },
        );

        let state = AuthState {
            identity: Arc::new(provider),
        };

        let router = Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state, auth_guard));

        TestServer::new(router)
    }

    #[tokio::test]
    async fn valid_token_injects_user_id() {
        let server = test_server();

        let response = server
            .get("/whoami")
            .authorization_bearer("alice-token")
            .await;

        response.assert_status_ok();
        assert_eq!(response.text(), "7");
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let server = test_server();

        let response = server.get("/whoami").await;

        assert_eq!(response.status_code(), 401);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let server = test_server();

        let response = server.get("/whoami").authorization_bearer("bob-token").await;

        assert_eq!(response.status_code(), 401);
    }
}
