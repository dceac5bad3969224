//! Defines the endpoint for listing the caller's accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{AppState, account::core::list_accounts_for_user, database_id::UserId};

/// The state needed to list accounts.
#[derive(Clone)]
pub struct MyAccountsState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for MyAccountsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler returning every account the caller owns.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn my_accounts_endpoint(
    State(state): State<MyAccountsState>,
    Extension(user_id): Extension<UserId>,
) -> Response {
    let connection = state.db_connection.lock().unwrap();

    match list_accounts_for_user(user_id, &connection) {
        Ok(accounts) => Json(accounts).into_response(),
        Err(error) => error.into_response(),
    }
}
