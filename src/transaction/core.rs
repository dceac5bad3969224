//! Defines the core data models and database queries for transactions.

use rusqlite::{
    Connection, Row, ToSql, params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{AccountId, TransactionId, UserId},
};

/// Whether a transaction adds to or subtracts from an account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money flowing into the account.
    Income,
    /// Money flowing out of the account.
    Expense,
}

impl TransactionKind {
    fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(FromSqlError::Other(
                format!("unknown transaction kind {other:?}").into(),
            )),
        }
    }
}

/// The processing state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Recorded but not yet settled, e.g. a freshly materialized recurring
    /// occurrence.
    Pending,
    /// Settled. Only completed recurring transactions spawn occurrences.
    Completed,
    /// Failed to settle.
    Failed,
}

impl TransactionStatus {
    fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl ToSql for TransactionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(FromSqlError::Other(
                format!("unknown transaction status {other:?}").into(),
            )),
        }
    }
}

/// How often a recurring transaction spawns a new occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringInterval {
    /// Every day.
    Daily,
    /// Every seven days.
    Weekly,
    /// Every thirty days. An approximation, not calendar-aware.
    Monthly,
    /// Every 365 days. An approximation, not calendar-aware.
    Yearly,
}

impl RecurringInterval {
    fn as_str(self) -> &'static str {
        match self {
            RecurringInterval::Daily => "daily",
            RecurringInterval::Weekly => "weekly",
            RecurringInterval::Monthly => "monthly",
            RecurringInterval::Yearly => "yearly",
        }
    }

    /// The fixed offset between occurrences.
    pub fn period(self) -> time::Duration {
        match self {
            RecurringInterval::Daily => time::Duration::days(1),
            RecurringInterval::Weekly => time::Duration::days(7),
            RecurringInterval::Monthly => time::Duration::days(30),
            RecurringInterval::Yearly => time::Duration::days(365),
        }
    }
}

impl ToSql for RecurringInterval {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for RecurringInterval {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "daily" => Ok(RecurringInterval::Daily),
            "weekly" => Ok(RecurringInterval::Weekly),
            "monthly" => Ok(RecurringInterval::Monthly),
            "yearly" => Ok(RecurringInterval::Yearly),
            other => Err(FromSqlError::Other(
                format!("unknown recurring interval {other:?}").into(),
            )),
        }
    }
}

/// An income or expense event recorded against an account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserId,
    /// The account the transaction is recorded against.
    pub account_id: AccountId,
    /// Whether the transaction is income or an expense.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The amount of money in dollars. Always positive; the sign applied to
    /// the balance comes from the kind.
    pub amount: f64,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// A free-form category label, e.g. "groceries".
    pub category: String,
    /// An optional link to the scanned receipt for this transaction.
    #[serde(rename = "receiptUrl")]
    pub receipt_url: String,
    /// Whether this transaction spawns occurrences on a schedule.
    #[serde(rename = "isRecurring")]
    pub is_recurring: bool,
    /// The recurrence schedule. Set if and only if `is_recurring` is true.
    #[serde(rename = "recurringInterval")]
    pub recurring_interval: Option<RecurringInterval>,
    /// When the next occurrence becomes due.
    #[serde(rename = "nextRecurringDate", with = "time::serde::rfc3339::option")]
    pub next_recurring_date: Option<OffsetDateTime>,
    /// When the recurrence processor last materialized an occurrence.
    #[serde(rename = "lastProcessed", with = "time::serde::rfc3339::option")]
    pub last_processed: Option<OffsetDateTime>,
    /// The processing state.
    pub status: TransactionStatus,
    /// When the transaction row was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The fields needed to insert a transaction row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The user that owns the transaction.
    pub user_id: UserId,
    /// The account the transaction is recorded against.
    pub account_id: AccountId,
    /// Whether the transaction is income or an expense.
    pub kind: TransactionKind,
    /// The amount of money in dollars.
    pub amount: f64,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    pub date: OffsetDateTime,
    /// A free-form category label.
    pub category: String,
    /// An optional link to the scanned receipt.
    pub receipt_url: String,
    /// Whether this transaction spawns occurrences on a schedule.
    pub is_recurring: bool,
    /// The recurrence schedule.
    pub recurring_interval: Option<RecurringInterval>,
    /// When the first/next occurrence becomes due.
    pub next_recurring_date: Option<OffsetDateTime>,
    /// The processing state.
    pub status: TransactionStatus,
}

/// The signed contribution of a transaction to its account balance:
/// positive for income, negative for expenses.
pub fn signed_delta(kind: TransactionKind, amount: f64) -> f64 {
    match kind {
        TransactionKind::Income => amount,
        TransactionKind::Expense => -amount,
    }
}

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, account_id, kind, amount, \
     description, date, category, receipt_url, is_recurring, recurring_interval, \
     next_recurring_date, last_processed, status, created_at";

/// Create the transaction table.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            amount REAL NOT NULL,
            description TEXT NOT NULL,
            date TEXT NOT NULL,
            category TEXT NOT NULL,
            receipt_url TEXT NOT NULL DEFAULT '',
            is_recurring INTEGER NOT NULL DEFAULT 0,
            recurring_interval TEXT,
            next_recurring_date TEXT,
            last_processed TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

/// Convert a database row into a [Transaction].
///
/// Expects the columns in [TRANSACTION_COLUMNS] order.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_id: row.get(2)?,
        kind: row.get(3)?,
        amount: row.get(4)?,
        description: row.get(5)?,
        date: row.get(6)?,
        category: row.get(7)?,
        receipt_url: row.get(8)?,
        is_recurring: row.get(9)?,
        recurring_interval: row.get(10)?,
        next_recurring_date: row.get(11)?,
        last_processed: row.get(12)?,
        status: row.get(13)?,
        created_at: row.get(14)?,
    })
}

/// Insert a transaction row and return its ID.
///
/// This only writes the row. Callers that record a new event must apply the
/// signed delta to the account balance in the same SQL transaction; see
/// [crate::transaction::create_transaction].
pub(crate) fn insert_transaction(
    new_transaction: &NewTransaction,
    connection: &Connection,
) -> Result<TransactionId, Error> {
    let created_at = crate::db::normalize_datetime(OffsetDateTime::now_utc());

    connection.execute(
        "INSERT INTO \"transaction\" (user_id, account_id, kind, amount, description, date, \
         category, receipt_url, is_recurring, recurring_interval, next_recurring_date, \
         last_processed, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL, ?12, ?13)",
        params![
            new_transaction.user_id,
            new_transaction.account_id,
            new_transaction.kind,
            new_transaction.amount,
            new_transaction.description,
            crate::db::normalize_datetime(new_transaction.date),
            new_transaction.category,
            new_transaction.receipt_url,
            new_transaction.is_recurring,
            new_transaction.recurring_interval,
            new_transaction
                .next_recurring_date
                .map(crate::db::normalize_datetime),
            new_transaction.status,
            created_at,
        ],
    )?;

    Ok(connection.last_insert_rowid())
}

/// Retrieve a transaction by its `id`.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not refer to a transaction.
pub fn get_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound("Transaction not found"),
            error => error.into(),
        })
}

/// Retrieve a transaction by its `id`, scoped to its owner.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not refer to a transaction owned
/// by `user_id`. Another user's transaction is reported as missing rather
/// than forbidden so the response does not reveal that the ID exists.
pub fn get_transaction_for_user(
    user_id: UserId,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(&[(":id", &id), (":user_id", &user_id)], map_transaction_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound("Transaction not found"),
            error => error.into(),
        })
}

/// Retrieve all transactions owned by `user_id`.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn list_transactions_for_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE user_id = :user_id \
             ORDER BY date DESC"
        ))?
        .query_map(&[(":user_id", &user_id)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Retrieve all transactions recorded against `account_id`.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn list_transactions_for_account(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE account_id = :account_id \
             ORDER BY date DESC"
        ))?
        .query_map(&[(":account_id", &account_id)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Apply a signed delta to an account's balance.
///
/// The read-modify-write happens inside SQLite, so callers only need to run
/// this in the same SQL transaction as the row mutation it pairs with.
pub(crate) fn apply_balance_delta(
    account_id: AccountId,
    delta: f64,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account SET balance = balance + ?1 WHERE id = ?2",
        params![delta, account_id],
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound("Account not found"));
    }

    Ok(())
}

#[cfg(test)]
mod create_table_tests {
    use rusqlite::Connection;

    use super::create_transaction_table;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_transaction_table(&connection));
    }
}
