//! Defines the core data model and database queries for bank accounts.

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{AccountId, UserId},
};

/// The kind of bank account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// An everyday checking account.
    Current,
    /// A savings account.
    Saving,
}

impl AccountKind {
    fn as_str(self) -> &'static str {
        match self {
            AccountKind::Current => "current",
            AccountKind::Saving => "saving",
        }
    }
}

impl ToSql for AccountKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for AccountKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "current" => Ok(AccountKind::Current),
            "saving" => Ok(AccountKind::Saving),
            other => Err(FromSqlError::Other(
                format!("unknown account kind {other:?}").into(),
            )),
        }
    }
}

/// A bank account holding a running balance for one user.
///
/// The balance is mutated only by transaction operations; see the
/// transaction module for the update paths.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The ID of the account.
    pub id: AccountId,
    /// The user that owns the account.
    pub user_id: UserId,
    /// The display name of the account.
    pub name: String,
    /// Whether this is a current or saving account.
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// The running balance in dollars.
    pub balance: f64,
    /// Whether this is the user's default account.
    pub is_default: bool,
    /// When the account was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub(crate) const ACCOUNT_COLUMNS: &str =
    "id, user_id, name, kind, balance, is_default, created_at";

/// Create the account table.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            balance REAL NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Convert a database row into an [Account].
///
/// Expects the columns in [ACCOUNT_COLUMNS] order.
pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        balance: row.get(4)?,
        is_default: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Retrieve an account by its `id`.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not refer to an account.
pub fn get_account(id: AccountId, connection: &Connection) -> Result<Account, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_row_to_account)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound("Account not found"),
            error => error.into(),
        })
}

/// Retrieve all accounts owned by `user_id`.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn list_accounts_for_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE user_id = :user_id"
        ))?
        .query_map(&[(":user_id", &user_id)], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Retrieve the default account for `user_id`, or `None` if the user has no
/// default account.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_default_account(
    user_id: UserId,
    connection: &Connection,
) -> Result<Option<Account>, Error> {
    let result = connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE user_id = :user_id AND is_default = 1"
        ))?
        .query_row(&[(":user_id", &user_id)], map_row_to_account);

    match result {
        Ok(account) => Ok(Some(account)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

pub(crate) fn count_accounts_for_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<i64, Error> {
    let count = connection
        .prepare("SELECT COUNT(*) FROM account WHERE user_id = :user_id")?
        .query_row(&[(":user_id", &user_id)], |row| row.get(0))?;

    Ok(count)
}

/// Clear the default flag on every account the user owns.
pub(crate) fn clear_default_flags(user_id: UserId, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "UPDATE account SET is_default = 0 WHERE user_id = :user_id",
        &[(":user_id", &user_id)],
    )?;

    Ok(())
}
