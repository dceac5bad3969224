//! Defines the endpoint for updating an account, including the default flag.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, params};
use serde::Deserialize;

use crate::{
    AppState, Error,
    account::{
        Account, AccountKind,
        core::{clear_default_flags, get_account},
    },
    database_id::{AccountId, UserId},
};

/// The state needed to update an account.
#[derive(Clone)]
pub struct UpdateAccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UpdateAccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for updating an account. Omitted fields keep their
/// current values.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAccountRequest {
    /// A new display name.
    pub name: Option<String>,
    /// A new account kind.
    #[serde(rename = "type")]
    pub kind: Option<AccountKind>,
    /// Whether this account should be the user's default.
    pub is_default: Option<bool>,
}

/// A route handler for updating an account.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn update_account_endpoint(
    State(state): State<UpdateAccountState>,
    Extension(user_id): Extension<UserId>,
    Path(account_id): Path<AccountId>,
    Json(request): Json<UpdateAccountRequest>,
) -> Response {
    let connection = state.db_connection.lock().unwrap();

    match update_account(account_id, user_id, &request, &connection) {
        Ok(account) => Json(account).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Update an account's name, kind or default flag.
///
/// Setting the default flag clears it on the user's other accounts inside
/// the same SQL transaction, so every user with at least one account keeps
/// exactly one default throughout. Unsetting the flag on the only default
/// account is rejected.
///
/// # Errors
/// Returns:
/// - [Error::NotFound] if `account_id` does not refer to an account,
/// - [Error::PermissionDenied] if the caller does not own the account,
/// - [Error::Conflict] when unsetting the only default.
pub fn update_account(
    account_id: AccountId,
    user_id: UserId,
    request: &UpdateAccountRequest,
    connection: &Connection,
) -> Result<Account, Error> {
    let transaction = connection.unchecked_transaction()?;

    let account = get_account(account_id, &transaction)?;
    if account.user_id != user_id {
        return Err(Error::PermissionDenied);
    }

    let is_default = request.is_default.unwrap_or(account.is_default);

    if !is_default && account.is_default {
        let other_defaults: i64 = transaction
            .prepare(
                "SELECT COUNT(*) FROM account
                 WHERE user_id = :user_id AND is_default = 1 AND id != :id",
            )?
            .query_row(&[(":user_id", &user_id), (":id", &account_id)], |row| {
                row.get(0)
            })?;

        if other_defaults == 0 {
            return Err(Error::Conflict(
                "At least one account must be marked as default.".to_owned(),
            ));
        }
    }

    if is_default {
        clear_default_flags(user_id, &transaction)?;
    }

    let name = request.name.as_deref().unwrap_or(&account.name);
    let kind = request.kind.unwrap_or(account.kind);

    transaction.execute(
        "UPDATE account SET name = ?1, kind = ?2, is_default = ?3 WHERE id = ?4",
        params![name, kind, is_default, account_id],
    )?;

    let account = get_account(account_id, &transaction)?;
    transaction.commit()?;

    Ok(account)
}
