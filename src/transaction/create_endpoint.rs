//! Defines the endpoint for creating a new transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Deserializer, de};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    account::get_account,
    database_id::{AccountId, UserId},
    transaction::{
        NewTransaction, RecurringInterval, Transaction, TransactionKind, TransactionStatus,
        core::{apply_balance_delta, get_transaction, insert_transaction, signed_delta},
        recurrence::next_recurring_date,
    },
};

/// The state needed to create a transaction.
#[derive(Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating a transaction.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// The account to record the transaction against.
    pub account_id: AccountId,
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
    /// An optional link to the scanned receipt.
    #[serde(rename = "receiptUrl", default)]
    pub receipt_url: String,
    /// Whether this transaction spawns occurrences on a schedule.
    #[serde(rename = "isRecurring", default)]
    pub is_recurring: bool,
    /// The recurrence schedule. Clients send an empty string or omit the
    /// field for non-recurring transactions.
    #[serde(
        rename = "recurringInterval",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub recurring_interval: Option<RecurringInterval>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<RecurringInterval>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;

    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(text)) if text.is_empty() => Ok(None),
        Some(other) => serde_json::from_value(other).map(Some).map_err(de::Error::custom),
    }
}

/// A route handler for creating a new transaction.
///
/// Responds with 201 and the created transaction on success.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<CreateTransactionRequest>,
) -> Response {
    let connection = state.db_connection.lock().unwrap();

    match create_transaction(user_id, &request, &connection) {
        Ok(transaction) => (StatusCode::CREATED, Json(transaction)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Record a transaction and update the owning account's balance.
///
/// The row insert and the balance update happen in one SQL transaction:
/// either both are persisted or neither is, so the balance invariant
/// (balance equals the signed sum of the account's transactions) holds even
/// when a write fails part-way.
///
/// # Errors
/// Returns:
/// - [Error::Validation] if the amount is not positive, or the recurrence
///   flag is set without an interval,
/// - [Error::NotFound] if the account does not exist,
/// - [Error::PermissionDenied] if the caller does not own the account.
pub fn create_transaction(
    user_id: UserId,
    request: &CreateTransactionRequest,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if request.amount <= 0.0 {
        return Err(Error::Validation(
            "Amount must be greater than 0.".to_owned(),
        ));
    }

    if request.is_recurring && request.recurring_interval.is_none() {
        return Err(Error::Validation(
            "if is recurring is set to true then you have to provide a recurring interval \
             (daily,weekly monthly,yearly) !"
                .to_owned(),
        ));
    }

    // The interval is meaningless without the flag; drop it so the stored
    // row keeps the invariant "interval set iff recurring".
    let recurring_interval = if request.is_recurring {
        request.recurring_interval
    } else {
        None
    };

    let transaction = connection.unchecked_transaction()?;

    let account = get_account(request.account_id, &transaction)?;
    if account.user_id != user_id {
        return Err(Error::PermissionDenied);
    }

    let next_recurring =
        recurring_interval.map(|interval| next_recurring_date(interval, request.date));

    let id = insert_transaction(
        &NewTransaction {
            user_id,
            account_id: account.id,
            kind: request.kind,
            amount: request.amount,
            description: request.description.clone(),
            date: request.date,
            category: request.category.clone(),
            receipt_url: request.receipt_url.clone(),
            is_recurring: request.is_recurring,
            recurring_interval,
            next_recurring_date: next_recurring,
            status: TransactionStatus::Completed,
        },
        &transaction,
    )?;

    apply_balance_delta(
        account.id,
        signed_delta(request.kind, request.amount),
        &transaction,
    )?;

    let created = get_transaction(id, &transaction)?;
    transaction.commit()?;

    Ok(created)
}
