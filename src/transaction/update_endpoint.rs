//! Defines the endpoint for updating a transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, params};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::{TransactionId, UserId},
    db::normalize_datetime,
    transaction::{
        Transaction, TransactionKind,
        core::{apply_balance_delta, get_transaction, signed_delta},
    },
};

/// The state needed to update a transaction.
#[derive(Clone)]
pub struct UpdateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UpdateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for updating a transaction.
///
/// Recurrence scheduling fields are managed by the recurrence processor and
/// cannot be changed here.
#[derive(Debug, Deserialize)]
pub struct UpdateTransactionRequest {
    /// Whether the transaction is income or an expense.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The amount of money in dollars. Must be greater than zero.
    pub amount: f64,
    /// A text description of what the transaction was for.
    #[serde(default)]
    pub description: String,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// A free-form category label.
    pub category: String,
}

/// A route handler for updating a transaction.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn update_transaction_endpoint(
    State(state): State<UpdateTransactionState>,
    Extension(user_id): Extension<UserId>,
    Path(transaction_id): Path<TransactionId>,
    Json(request): Json<UpdateTransactionRequest>,
) -> Response {
    let connection = state.db_connection.lock().unwrap();

    match update_transaction(user_id, transaction_id, &request, &connection) {
        Ok(transaction) => Json(transaction).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Update a transaction and apply the net balance change to its account.
///
/// The current row is reloaded inside the SQL transaction, so the old signed
/// delta and the balance adjustment are computed against a consistent
/// snapshot even when other mutations of the same account interleave.
///
/// # Errors
/// Returns:
/// - [Error::NotFound] if the transaction does not exist,
/// - [Error::PermissionDenied] if the caller does not own it,
/// - [Error::Validation] if the new amount is not positive.
pub fn update_transaction(
    user_id: UserId,
    transaction_id: TransactionId,
    request: &UpdateTransactionRequest,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if request.amount <= 0.0 {
        return Err(Error::Validation(
            "Amount must be greater than 0.".to_owned(),
        ));
    }

    let transaction = connection.unchecked_transaction()?;

    let existing = get_transaction(transaction_id, &transaction)?;
    if existing.user_id != user_id {
        return Err(Error::PermissionDenied);
    }

    let old_delta = signed_delta(existing.kind, existing.amount);
    let new_delta = signed_delta(request.kind, request.amount);

    transaction.execute(
        "UPDATE \"transaction\"
         SET kind = ?1, amount = ?2, description = ?3, date = ?4, category = ?5
         WHERE id = ?6",
        params![
            request.kind,
            request.amount,
            request.description,
            normalize_datetime(request.date),
            request.category,
            transaction_id,
        ],
    )?;

    apply_balance_delta(existing.account_id, new_delta - old_delta, &transaction)?;

    let updated = get_transaction(transaction_id, &transaction)?;
    transaction.commit()?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Json,
        extract::{Path, State},
        http::StatusCode,
    };
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        Error,
        account::AccountKind,
        db::initialize,
        test_utils::{account_balance, insert_test_account, insert_test_expense},
        transaction::{
            TransactionKind,
            update_endpoint::{
                UpdateTransactionRequest, UpdateTransactionState, update_transaction,
                update_transaction_endpoint,
            },
        },
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn request(kind: TransactionKind, amount: f64) -> UpdateTransactionRequest {
        UpdateTransactionRequest {
            kind,
            amount,
            description: "updated".to_owned(),
            date: datetime!(2025-03-12 09:00:00 UTC),
            category: "groceries".to_owned(),
        }
    }

    #[tokio::test]
    async fn can_update_transaction() {
        let conn = get_test_connection();
        let account = insert_test_account(&conn, 1, "Everyday", AccountKind::Current, 70.0, true);
        let transaction = insert_test_expense(&conn, 1, account.id, 30.0, "groceries");
        let state = UpdateTransactionState {
            db_connection: Arc::new(Mutex::new(conn)),
        };

        let response = update_transaction_endpoint(
            State(state.clone()),
            Extension(1),
            Path(transaction.id),
            Json(request(TransactionKind::Expense, 50.0)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let connection = state.db_connection.lock().unwrap();
        // The balance absorbs only the 20-dollar difference.
        assert_eq!(account_balance(&connection, account.id), 50.0);
    }

    #[test]
    fn growing_an_expense_subtracts_the_difference() {
        let conn = get_test_connection();
        let account = insert_test_account(&conn, 1, "Everyday", AccountKind::Current, 70.0, true);
        let transaction = insert_test_expense(&conn, 1, account.id, 30.0, "groceries");

        update_transaction(1, transaction.id, &request(TransactionKind::Expense, 50.0), &conn)
            .unwrap();

        assert_eq!(account_balance(&conn, account.id), 50.0);
    }

    #[test]
    fn flipping_expense_to_income_applies_both_sides() {
        let conn = get_test_connection();
        let account = insert_test_account(&conn, 1, "Everyday", AccountKind::Current, 70.0, true);
        let transaction = insert_test_expense(&conn, 1, account.id, 30.0, "groceries");

        let updated =
            update_transaction(1, transaction.id, &request(TransactionKind::Income, 30.0), &conn)
                .unwrap();

        assert_eq!(updated.kind, TransactionKind::Income);
        // Reversing a 30 expense and adding a 30 income moves the balance by 60.
        assert_eq!(account_balance(&conn, account.id), 130.0);
    }

    #[test]
    fn missing_transaction_is_not_found() {
        let conn = get_test_connection();

        let result = update_transaction(1, 42, &request(TransactionKind::Expense, 50.0), &conn);

        assert_eq!(result, Err(Error::NotFound("Transaction not found")));
    }

    #[test]
    fn other_users_transaction_is_forbidden() {
        let conn = get_test_connection();
        let account = insert_test_account(&conn, 2, "Everyday", AccountKind::Current, 70.0, true);
        let transaction = insert_test_expense(&conn, 2, account.id, 30.0, "groceries");

        let result = update_transaction(
            1,
            transaction.id,
            &request(TransactionKind::Expense, 50.0),
            &conn,
        );

        assert_eq!(result, Err(Error::PermissionDenied));
        assert_eq!(account_balance(&conn, account.id), 70.0);
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let conn = get_test_connection();
        let account = insert_test_account(&conn, 1, "Everyday", AccountKind::Current, 70.0, true);
        let transaction = insert_test_expense(&conn, 1, account.id, 30.0, "groceries");

        let result =
            update_transaction(1, transaction.id, &request(TransactionKind::Expense, 0.0), &conn);

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(account_balance(&conn, account.id), 70.0);
    }
}
