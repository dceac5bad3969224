//! Defines the endpoint for fetching one account with its transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    account::{Account, core::get_account},
    database_id::AccountId,
    transaction::{Transaction, list_transactions_for_account},
};

/// The state needed to fetch an account.
#[derive(Clone)]
pub struct GetAccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for GetAccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// An account along with every transaction recorded against it.
#[derive(Debug, Serialize)]
pub struct AccountWithTransactions {
    /// The account.
    #[serde(flatten)]
    pub account: Account,
    /// The account's transactions.
    pub transactions: Vec<Transaction>,
}

/// A route handler returning an account and its transaction list.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_account_endpoint(
    State(state): State<GetAccountState>,
    Path(account_id): Path<AccountId>,
) -> Response {
    let connection = state.db_connection.lock().unwrap();

    match get_account_with_transactions(account_id, &connection) {
        Ok(account) => Json(account).into_response(),
        Err(error) => error.into_response(),
    }
}

fn get_account_with_transactions(
    account_id: AccountId,
    connection: &Connection,
) -> Result<AccountWithTransactions, Error> {
    let account = get_account(account_id, connection)?;
    let transactions = list_transactions_for_account(account_id, connection)?;

    Ok(AccountWithTransactions {
        account,
        transactions,
    })
}
