//! The transaction ledger.
//!
//! Every mutation here co-updates the owning account's balance inside a
//! single SQL transaction, keeping each balance equal to the signed sum of
//! the account's transactions.

mod core;
mod create_endpoint;
mod delete_endpoint;
mod get_endpoint;
mod list_endpoint;
mod recurrence;
mod update_endpoint;

pub use core::{
    NewTransaction, RecurringInterval, Transaction, TransactionKind, TransactionStatus,
    create_transaction_table, get_transaction, get_transaction_for_user,
    list_transactions_for_account, list_transactions_for_user, map_transaction_row, signed_delta,
};
pub use create_endpoint::{CreateTransactionRequest, create_transaction,
    create_transaction_endpoint};
pub use delete_endpoint::{DeleteTransactionsRequest, delete_transactions,
    delete_transactions_endpoint};
pub use get_endpoint::get_transaction_endpoint;
pub use list_endpoint::list_transactions_endpoint;
pub use recurrence::{
    ProcessOutcome, RECURRENCE_THROTTLE_LIMIT, RECURRENCE_THROTTLE_WINDOW,
    due_recurring_transaction_ids, is_transaction_due, next_recurring_date,
    process_recurring_transaction, trigger_recurring_transactions,
};
pub use update_endpoint::{UpdateTransactionRequest, update_transaction,
    update_transaction_endpoint};

#[cfg(test)]
pub(crate) use core::insert_transaction;
