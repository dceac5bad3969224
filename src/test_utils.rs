#![allow(missing_docs)]
//! Shared fixtures and collaborator doubles for tests.

use std::sync::{Arc, Mutex};

use axum::response::Response;
use rusqlite::{Connection, params};
use time::{OffsetDateTime, macros::datetime};

use crate::{
    AppState, Error,
    account::{Account, AccountKind, get_account},
    ai::GenerativeModel,
    auth::{IdentityProvider, StaticIdentityProvider, UserProfile},
    database_id::{AccountId, UserId},
    db::normalize_datetime,
    email::Mailer,
    transaction::{
        NewTransaction, RecurringInterval, Transaction, TransactionKind, TransactionStatus,
        get_transaction, insert_transaction,
    },
};

/// An identity provider with two registered users: Alice (user 1,
/// "alice-token") and Bob (user 2, "bob-token").
pub(crate) fn test_identity() -> StaticIdentityProvider {
    let mut provider = StaticIdentityProvider::default();
    provider.insert(
        "alice-token",
        UserProfile {
            user_id: 1,
            email: "alice@example.com".to_owned(),
            first_name: "Alice".to_owned(),
            last_name: "Archer".to_owned(),
        },
    );
    provider.insert(
        "bob-token",
        UserProfile {
            user_id: 2,
            email: "bob@example.com".to_owned(),
            first_name: "Bob".to_owned(),
            last_name: "Builder".to_owned(),
        },
    );

    provider
}

/// A full [AppState] over an in-memory database, with the test identity
/// provider, a failing model and a recording mailer.
pub(crate) fn test_state() -> AppState {
    let connection = Connection::open_in_memory().unwrap();

    AppState::new(
        connection,
        "UTC",
        Arc::new(test_identity()),
        Arc::new(StubModel::failing()),
        Arc::new(RecordingMailer::default()),
    )
    .unwrap()
}

pub(crate) fn insert_test_account(
    connection: &Connection,
    user_id: UserId,
    name: &str,
    kind: AccountKind,
    balance: f64,
    is_default: bool,
) -> Account {
    let created_at = normalize_datetime(OffsetDateTime::now_utc());

    connection
        .execute(
            "INSERT INTO account (user_id, name, kind, balance, is_default, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user_id, name, kind, balance, is_default, created_at],
        )
        .unwrap();

    get_account(connection.last_insert_rowid(), connection).unwrap()
}

fn insert_row(connection: &Connection, new_transaction: &NewTransaction) -> Transaction {
    let id = insert_transaction(new_transaction, connection).unwrap();

    get_transaction(id, connection).unwrap()
}

/// Insert a completed expense dated 2025-03-10, without touching the account
/// balance. Fixture inserts bypass the endpoint logic on purpose so tests
/// can stage exactly the state they need.
pub(crate) fn insert_test_expense(
    connection: &Connection,
    user_id: UserId,
    account_id: AccountId,
    amount: f64,
    category: &str,
) -> Transaction {
    insert_row(
        connection,
        &NewTransaction {
            user_id,
            account_id,
            kind: TransactionKind::Expense,
            amount,
            description: format!("test {category}"),
            date: datetime!(2025-03-10 12:00:00 UTC),
            category: category.to_owned(),
            receipt_url: String::new(),
            is_recurring: false,
            recurring_interval: None,
            next_recurring_date: None,
            status: TransactionStatus::Completed,
        },
    )
}

pub(crate) fn insert_test_income(
    connection: &Connection,
    user_id: UserId,
    account_id: AccountId,
    amount: f64,
    category: &str,
) -> Transaction {
    insert_row(
        connection,
        &NewTransaction {
            user_id,
            account_id,
            kind: TransactionKind::Income,
            amount,
            description: format!("test {category}"),
            date: datetime!(2025-03-10 12:00:00 UTC),
            category: category.to_owned(),
            receipt_url: String::new(),
            is_recurring: false,
            recurring_interval: None,
            next_recurring_date: None,
            status: TransactionStatus::Completed,
        },
    )
}

pub(crate) fn insert_test_expense_on_date(
    connection: &Connection,
    user_id: UserId,
    account_id: AccountId,
    amount: f64,
    date: OffsetDateTime,
) -> Transaction {
    insert_row(
        connection,
        &NewTransaction {
            user_id,
            account_id,
            kind: TransactionKind::Expense,
            amount,
            description: "test groceries".to_owned(),
            date,
            category: "groceries".to_owned(),
            receipt_url: String::new(),
            is_recurring: false,
            recurring_interval: None,
            next_recurring_date: None,
            status: TransactionStatus::Completed,
        },
    )
}

pub(crate) fn insert_test_income_on_date(
    connection: &Connection,
    user_id: UserId,
    account_id: AccountId,
    amount: f64,
    date: OffsetDateTime,
) -> Transaction {
    insert_row(
        connection,
        &NewTransaction {
            user_id,
            account_id,
            kind: TransactionKind::Income,
            amount,
            description: "test salary".to_owned(),
            date,
            category: "salary".to_owned(),
            receipt_url: String::new(),
            is_recurring: false,
            recurring_interval: None,
            next_recurring_date: None,
            status: TransactionStatus::Completed,
        },
    )
}

/// Insert a completed recurring expense that has never been processed.
pub(crate) fn insert_test_recurring_expense(
    connection: &Connection,
    user_id: UserId,
    account_id: AccountId,
    amount: f64,
    interval: RecurringInterval,
) -> Transaction {
    insert_row(
        connection,
        &NewTransaction {
            user_id,
            account_id,
            kind: TransactionKind::Expense,
            amount,
            description: "gym membership".to_owned(),
            date: datetime!(2025-03-01 12:00:00 UTC),
            category: "personal".to_owned(),
            receipt_url: String::new(),
            is_recurring: true,
            recurring_interval: Some(interval),
            next_recurring_date: None,
            status: TransactionStatus::Completed,
        },
    )
}

#[track_caller]
pub(crate) fn account_balance(connection: &Connection, account_id: AccountId) -> f64 {
    connection
        .query_row(
            "SELECT balance FROM account WHERE id = ?1",
            params![account_id],
            |row| row.get(0),
        )
        .expect("could not read account balance")
}

/// Read a handler response body as JSON.
pub(crate) async fn read_body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("could not read response body");

    serde_json::from_slice(&bytes).expect("response body is not JSON")
}

/// A scripted [GenerativeModel] that counts its calls.
pub(crate) struct StubModel {
    reply: Option<String>,
    calls: Arc<Mutex<usize>>,
}

impl StubModel {
    /// A model that always returns `reply`.
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_owned()),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// A model that always fails with an external-service error.
    pub(crate) fn failing() -> Self {
        Self {
            reply: None,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// The shared call counter.
    pub(crate) fn calls(&self) -> Arc<Mutex<usize>> {
        self.calls.clone()
    }

    fn respond(&self) -> Result<String, Error> {
        *self.calls.lock().unwrap() += 1;

        self.reply
            .clone()
            .ok_or_else(|| Error::ExternalService("stub model is down".to_owned()))
    }
}

impl GenerativeModel for StubModel {
    fn generate(&self, _prompt: &str) -> Result<String, Error> {
        self.respond()
    }

    fn generate_from_image(
        &self,
        _mime_type: &str,
        _image: &[u8],
        _prompt: &str,
    ) -> Result<String, Error> {
        self.respond()
    }
}

/// One email captured by [RecordingMailer].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// A [Mailer] that records every send.
#[derive(Default)]
pub(crate) struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    pub(crate) fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), Error> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_owned(),
            subject: subject.to_owned(),
            body: html_body.to_owned(),
        });

        Ok(())
    }
}
