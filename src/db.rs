//! Database initialization and shared datetime conventions.

use rusqlite::{Connection, Transaction as SqlTransaction};
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::{
    Error, account::create_account_table, budget::create_budget_table,
    transaction::create_transaction_table,
};

/// Add the tables for the domain models to the database.
///
/// # Errors
/// Returns an error if a table cannot be created or the schema transaction
/// cannot be committed.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_account_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_budget_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Convert `datetime` to the canonical form used for storage: UTC, truncated
/// to whole seconds.
///
/// All datetimes are stored as text, so they must share one offset and one
/// subsecond width for SQL comparisons on the column to be meaningful.
pub(crate) fn normalize_datetime(datetime: OffsetDateTime) -> OffsetDateTime {
    let utc = datetime.to_offset(UtcOffset::UTC);

    utc - Duration::nanoseconds(i64::from(utc.nanosecond()))
}
