//! The recurrence processor: scans for due recurring transactions and
//! materializes their occurrences.

use std::time::Duration;

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::TransactionId,
    db::normalize_datetime,
    rate_limit::RateLimiter,
    transaction::{
        NewTransaction, RecurringInterval, Transaction, TransactionStatus,
        core::{apply_balance_delta, get_transaction, insert_transaction, signed_delta},
    },
};

/// The most occurrences materialized per user per throttle window.
pub const RECURRENCE_THROTTLE_LIMIT: u32 = 10;

/// The length of the per-user throttle window.
pub const RECURRENCE_THROTTLE_WINDOW: Duration = Duration::from_secs(60);

/// Compute when the next occurrence after `from` becomes due.
///
/// Monthly and yearly intervals use fixed 30- and 365-day offsets rather
/// than calendar arithmetic, so long-lived schedules drift relative to the
/// calendar.
pub fn next_recurring_date(interval: RecurringInterval, from: OffsetDateTime) -> OffsetDateTime {
    from + interval.period()
}

/// Whether a recurring transaction is due for processing at `now`.
///
/// A transaction that has never been processed is due immediately.
pub fn is_transaction_due(transaction: &Transaction, now: OffsetDateTime) -> bool {
    if !transaction.is_recurring {
        return false;
    }

    match transaction.next_recurring_date {
        Some(next_recurring_date) if next_recurring_date > now => false,
        _ => true,
    }
}

/// Select the IDs of every recurring transaction due for processing at `now`.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn due_recurring_transaction_ids(
    connection: &Connection,
    now: OffsetDateTime,
) -> Result<Vec<TransactionId>, Error> {
    connection
        .prepare(
            "SELECT id FROM \"transaction\"
             WHERE is_recurring = 1 AND status = 'completed'
               AND (last_processed IS NULL OR next_recurring_date <= :now)",
        )?
        .query_map(&[(":now", &normalize_datetime(now))], |row| row.get(0))?
        .map(|maybe_id| maybe_id.map_err(Error::from))
        .collect()
}

/// What happened to one dispatched recurring transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A new occurrence was recorded with this ID.
    Processed(TransactionId),
    /// The user exhausted their throttle window; try again later.
    RateLimited,
    /// The transaction was no longer due; nothing was written.
    NotDue,
}

/// Process one recurring transaction.
///
/// Re-checks due-ness so a duplicate dispatch of the same ID is a no-op.
/// When due, one SQL transaction covers all three writes: the cloned
/// occurrence (pending, dated `now`, description suffixed "(recurring)"),
/// the balance adjustment on the source account, and the bookkeeping update
/// (`last_processed`, `next_recurring_date`) on the source transaction.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction disappeared between scan and
/// processing, or an error if an SQL write fails (in which case nothing is
/// committed).
pub fn process_recurring_transaction(
    transaction_id: TransactionId,
    limiter: &RateLimiter,
    connection: &Connection,
    now: OffsetDateTime,
) -> Result<ProcessOutcome, Error> {
    let source = get_transaction(transaction_id, connection)?;

    if !limiter.try_acquire(source.user_id) {
        tracing::info!(
            "rate limit exceeded for user {} while processing transaction {transaction_id}",
            source.user_id
        );
        return Ok(ProcessOutcome::RateLimited);
    }

    if !is_transaction_due(&source, now) {
        return Ok(ProcessOutcome::NotDue);
    }

    let now = normalize_datetime(now);
    let transaction = connection.unchecked_transaction()?;

    let occurrence_id = insert_transaction(
        &NewTransaction {
            user_id: source.user_id,
            account_id: source.account_id,
            kind: source.kind,
            amount: source.amount,
            description: format!("{} (recurring).", source.description),
            date: now,
            category: source.category.clone(),
            receipt_url: String::new(),
            is_recurring: false,
            recurring_interval: None,
            next_recurring_date: None,
            status: TransactionStatus::Pending,
        },
        &transaction,
    )?;

    apply_balance_delta(
        source.account_id,
        signed_delta(source.kind, source.amount),
        &transaction,
    )?;

    // The next due date steps from this run, not from the scheduled time, so
    // a late run shifts the whole schedule rather than catching up.
    let next_due = source
        .recurring_interval
        .map(|interval| next_recurring_date(interval, now));

    transaction.execute(
        "UPDATE \"transaction\" SET last_processed = ?1, next_recurring_date = ?2 WHERE id = ?3",
        rusqlite::params![now, next_due, transaction_id],
    )?;

    transaction.commit()?;

    Ok(ProcessOutcome::Processed(occurrence_id))
}

/// Scan for due recurring transactions and process each one independently.
///
/// A failure processing one transaction is logged and does not stop the
/// rest of the batch. Returns how many occurrences were materialized.
///
/// # Errors
/// Returns an error only if the scan itself fails.
pub fn trigger_recurring_transactions(
    connection: &Connection,
    limiter: &RateLimiter,
    now: OffsetDateTime,
) -> Result<usize, Error> {
    let due = due_recurring_transaction_ids(connection, now)?;
    let mut processed = 0;

    for transaction_id in due {
        match process_recurring_transaction(transaction_id, limiter, connection, now) {
            Ok(ProcessOutcome::Processed(_)) => processed += 1,
            Ok(_) => {}
            Err(error) => {
                tracing::error!("could not process recurring transaction {transaction_id}: {error}");
            }
        }
    }

    Ok(processed)
}
