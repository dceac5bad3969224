//! Defines the endpoint for bulk-deleting transactions.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    database_id::{AccountId, TransactionId, UserId},
    transaction::core::{
        TRANSACTION_COLUMNS, apply_balance_delta, map_transaction_row, signed_delta,
    },
};

/// The state needed to delete transactions.
#[derive(Clone)]
pub struct DeleteTransactionsState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for bulk-deleting transactions.
#[derive(Debug, Deserialize)]
pub struct DeleteTransactionsRequest {
    /// The transactions to delete. IDs the caller does not own are ignored.
    pub transaction_ids: Vec<TransactionId>,
}

/// The balance of one account after a bulk delete.
#[derive(Debug, PartialEq, Serialize)]
pub struct AccountBalance {
    /// The account whose balance changed.
    pub account_id: AccountId,
    /// The balance after the deleted transactions were reversed.
    pub new_balance: f64,
}

/// The result of a bulk delete.
#[derive(Debug, PartialEq, Serialize)]
pub struct DeletedTransactions {
    /// How many transactions were deleted.
    pub deleted: usize,
    /// The adjusted balance of every affected account.
    pub new_balances: Vec<AccountBalance>,
}

/// A route handler for bulk-deleting transactions.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn delete_transactions_endpoint(
    State(state): State<DeleteTransactionsState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<DeleteTransactionsRequest>,
) -> Response {
    let connection = state.db_connection.lock().unwrap();

    match delete_transactions(user_id, &request.transaction_ids, &connection) {
        Ok(deleted) => Json(deleted).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Delete the caller's transactions with the given IDs and reverse their
/// contribution to each owning account's balance.
///
/// The deleted rows may span several accounts: the reversal deltas are
/// grouped per account and every affected balance is adjusted, all inside
/// one SQL transaction.
///
/// # Errors
/// Returns:
/// - [Error::Validation] if `ids` is empty,
/// - [Error::NotFound] if none of the IDs match a transaction the caller
///   owns.
pub fn delete_transactions(
    user_id: UserId,
    ids: &[TransactionId],
    connection: &Connection,
) -> Result<DeletedTransactions, Error> {
    if ids.is_empty() {
        return Err(Error::Validation("No transaction ID provided.".to_owned()));
    }

    let transaction = connection.unchecked_transaction()?;

    let mut matched = Vec::new();
    for id in ids {
        let result = transaction
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" \
                 WHERE id = :id AND user_id = :user_id"
            ))?
            .query_row(&[(":id", id), (":user_id", &user_id)], map_transaction_row);

        match result {
            Ok(found) => matched.push(found),
            Err(rusqlite::Error::QueryReturnedNoRows) => continue,
            Err(error) => return Err(error.into()),
        }
    }

    if matched.is_empty() {
        return Err(Error::NotFound(
            "No transactions found with the IDs provided.",
        ));
    }

    // Reversal per account: removing income subtracts, removing an expense
    // adds back.
    let mut deltas: BTreeMap<AccountId, f64> = BTreeMap::new();
    for found in &matched {
        *deltas.entry(found.account_id).or_insert(0.0) -=
            signed_delta(found.kind, found.amount);
    }

    for found in &matched {
        transaction.execute(
            "DELETE FROM \"transaction\" WHERE id = ?1",
            params![found.id],
        )?;
    }

    let mut new_balances = Vec::new();
    for (account_id, delta) in deltas {
        apply_balance_delta(account_id, delta, &transaction)?;

        let new_balance: f64 = transaction.query_row(
            "SELECT balance FROM account WHERE id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        new_balances.push(AccountBalance {
            account_id,
            new_balance,
        });
    }

    transaction.commit()?;

    Ok(DeletedTransactions {
        deleted: matched.len(),
        new_balances,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Json, extract::State, http::StatusCode};
    use rusqlite::Connection;

    use crate::{
        Error,
        account::AccountKind,
        db::initialize,
        test_utils::{account_balance, insert_test_account, insert_test_expense,
            insert_test_income},
        transaction::delete_endpoint::{
            DeleteTransactionsRequest, DeleteTransactionsState, delete_transactions,
            delete_transactions_endpoint,
        },
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[tokio::test]
    async fn can_delete_transactions() {
        let conn = get_test_connection();
        let account = insert_test_account(&conn, 1, "Everyday", AccountKind::Current, 70.0, true);
        let transaction = insert_test_expense(&conn, 1, account.id, 30.0, "groceries");
        let state = DeleteTransactionsState {
            db_connection: Arc::new(Mutex::new(conn)),
        };

        let response = delete_transactions_endpoint(
            State(state.clone()),
            Extension(1),
            Json(DeleteTransactionsRequest {
                transaction_ids: vec![transaction.id],
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(account_balance(&connection, account.id), 100.0);
    }

    #[test]
    fn deleting_expense_adds_amount_back() {
        let conn = get_test_connection();
        let account = insert_test_account(&conn, 1, "Everyday", AccountKind::Current, 70.0, true);
        let transaction = insert_test_expense(&conn, 1, account.id, 30.0, "groceries");

        let deleted = delete_transactions(1, &[transaction.id], &conn).unwrap();

        assert_eq!(deleted.deleted, 1);
        assert_eq!(account_balance(&conn, account.id), 100.0);
    }

    #[test]
    fn deleting_income_subtracts_amount() {
        let conn = get_test_connection();
        let account = insert_test_account(&conn, 1, "Everyday", AccountKind::Current, 150.0, true);
        let transaction = insert_test_income(&conn, 1, account.id, 50.0, "salary");

        delete_transactions(1, &[transaction.id], &conn).unwrap();

        assert_eq!(account_balance(&conn, account.id), 100.0);
    }

    #[test]
    fn ids_spanning_two_accounts_adjust_both_balances() {
        let conn = get_test_connection();
        let first = insert_test_account(&conn, 1, "Everyday", AccountKind::Current, 70.0, true);
        let second = insert_test_account(&conn, 1, "Rainy Day", AccountKind::Saving, 40.0, false);
        let expense_one = insert_test_expense(&conn, 1, first.id, 30.0, "groceries");
        let expense_two = insert_test_expense(&conn, 1, second.id, 10.0, "coffee");

        let deleted = delete_transactions(1, &[expense_one.id, expense_two.id], &conn).unwrap();

        assert_eq!(deleted.deleted, 2);
        assert_eq!(account_balance(&conn, first.id), 100.0);
        assert_eq!(account_balance(&conn, second.id), 50.0);
    }

    #[test]
    fn empty_id_list_is_rejected() {
        let conn = get_test_connection();

        let result = delete_transactions(1, &[], &conn);

        assert_eq!(
            result,
            Err(Error::Validation("No transaction ID provided.".to_owned()))
        );
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let conn = get_test_connection();

        let result = delete_transactions(1, &[41, 42], &conn);

        assert_eq!(
            result,
            Err(Error::NotFound("No transactions found with the IDs provided."))
        );
    }

    #[test]
    fn other_users_transactions_are_skipped() {
        let conn = get_test_connection();
        let mine = insert_test_account(&conn, 1, "Everyday", AccountKind::Current, 70.0, true);
        let theirs = insert_test_account(&conn, 2, "Everyday", AccountKind::Current, 70.0, true);
        let my_expense = insert_test_expense(&conn, 1, mine.id, 30.0, "groceries");
        let their_expense = insert_test_expense(&conn, 2, theirs.id, 30.0, "groceries");

        let deleted = delete_transactions(1, &[my_expense.id, their_expense.id], &conn).unwrap();

        assert_eq!(deleted.deleted, 1);
        // The other user's account is untouched.
        assert_eq!(account_balance(&conn, theirs.id), 70.0);
    }
}
