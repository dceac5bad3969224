//! Defines the core data model and database queries for budgets.

use rusqlite::{Connection, Row, params};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{AccountId, BudgetId, UserId},
    db::normalize_datetime,
};

/// A user's monthly spending target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetId,
    /// The user the budget belongs to. Each user has at most one budget.
    pub user_id: UserId,
    /// The monthly spending target in dollars.
    pub amount: f64,
    /// When the last threshold alert was emailed, if ever.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_alert_sent: Option<OffsetDateTime>,
    /// When the budget was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub(crate) const BUDGET_COLUMNS: &str = "id, user_id, amount, last_alert_sent, created_at";

/// Create the budget table.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL UNIQUE,
            amount REAL NOT NULL,
            last_alert_sent TEXT,
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Convert a database row into a [Budget].
///
/// Expects the columns in [BUDGET_COLUMNS] order.
pub fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        last_alert_sent: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Retrieve the budget for `user_id`, or `None` if the user has not set one.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_budget_for_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<Option<Budget>, Error> {
    let result = connection
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget WHERE user_id = :user_id"
        ))?
        .query_row(&[(":user_id", &user_id)], map_budget_row);

    match result {
        Ok(budget) => Ok(Some(budget)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Every budget in the database, for the periodic alert check.
pub(crate) fn list_budgets(connection: &Connection) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(&format!("SELECT {BUDGET_COLUMNS} FROM budget"))?
        .query_map([], map_budget_row)?
        .map(|maybe_budget| maybe_budget.map_err(Error::from))
        .collect()
}

pub(crate) fn insert_budget(
    user_id: UserId,
    amount: f64,
    connection: &Connection,
) -> Result<Budget, Error> {
    let created_at = normalize_datetime(OffsetDateTime::now_utc());

    connection.execute(
        "INSERT INTO budget (user_id, amount, last_alert_sent, created_at)
         VALUES (?1, ?2, NULL, ?3)",
        params![user_id, amount, created_at],
    )?;

    let id = connection.last_insert_rowid();

    Ok(Budget {
        id,
        user_id,
        amount,
        last_alert_sent: None,
        created_at,
    })
}

pub(crate) fn set_budget_amount(
    budget_id: BudgetId,
    amount: f64,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE budget SET amount = ?1 WHERE id = ?2",
        params![amount, budget_id],
    )?;

    Ok(())
}

pub(crate) fn set_last_alert_sent(
    budget_id: BudgetId,
    when: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE budget SET last_alert_sent = ?1 WHERE id = ?2",
        params![normalize_datetime(when), budget_id],
    )?;

    Ok(())
}

/// Sum the caller's expense transactions on `account_id` between `from`
/// (inclusive) and `to` (exclusive, unbounded when `None`).
///
/// Bounds must be in the storage form ([normalize_datetime]) for the text
/// comparison to be meaningful.
pub(crate) fn sum_expenses(
    user_id: UserId,
    account_id: AccountId,
    from: OffsetDateTime,
    to: Option<OffsetDateTime>,
    connection: &Connection,
) -> Result<f64, Error> {
    let from = normalize_datetime(from);

    let total = match to {
        Some(to) => connection.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM \"transaction\"
             WHERE user_id = ?1 AND account_id = ?2 AND kind = 'expense'
               AND date >= ?3 AND date < ?4",
            params![user_id, account_id, from, normalize_datetime(to)],
            |row| row.get(0),
        )?,
        None => connection.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM \"transaction\"
             WHERE user_id = ?1 AND account_id = ?2 AND kind = 'expense'
               AND date >= ?3",
            params![user_id, account_id, from],
            |row| row.get(0),
        )?,
    };

    Ok(total)
}
