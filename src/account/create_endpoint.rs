//! Defines the endpoint for creating a new bank account.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, params};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    account::{
        Account, AccountKind,
        core::{clear_default_flags, count_accounts_for_user, get_account},
    },
    database_id::UserId,
    db::normalize_datetime,
};

/// The state needed to create an account.
#[derive(Clone)]
pub struct CreateAccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateAccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating an account.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// The display name of the account.
    pub name: String,
    /// Whether this is a current or saving account.
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// The opening balance in dollars. Must be greater than zero.
    pub balance: f64,
    /// Whether the account should become the user's default.
    #[serde(default)]
    pub is_default: bool,
}

/// A route handler for creating a new account.
///
/// Responds with 201 and the created account on success.
pub async fn create_account_endpoint(
    State(state): State<CreateAccountState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<CreateAccountRequest>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLock.into_response();
        }
    };

    match create_account(user_id, &request, &connection) {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Create an account for `user_id`.
///
/// The user's first account is always created as the default regardless of
/// the requested flag. When a later account requests the default flag, the
/// flag is cleared on the user's other accounts inside the same SQL
/// transaction, so there is never a moment with zero or two defaults.
///
/// # Errors
/// Returns [Error::Validation] if the opening balance is not positive.
pub fn create_account(
    user_id: UserId,
    request: &CreateAccountRequest,
    connection: &Connection,
) -> Result<Account, Error> {
    if request.balance <= 0.0 {
        return Err(Error::Validation(
            "Balance cannot be smaller or equal to 0.".to_owned(),
        ));
    }

    let transaction = connection.unchecked_transaction()?;

    let is_default = if count_accounts_for_user(user_id, &transaction)? == 0 {
        true
    } else {
        if request.is_default {
            clear_default_flags(user_id, &transaction)?;
        }
        request.is_default
    };

    let created_at = normalize_datetime(OffsetDateTime::now_utc());

    transaction.execute(
        "INSERT INTO account (user_id, name, kind, balance, is_default, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            request.name,
            request.kind,
            request.balance,
            is_default,
            created_at,
        ],
    )?;

    let id = transaction.last_insert_rowid();
    let account = get_account(id, &transaction)?;

    transaction.commit()?;

    Ok(account)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Json, extract::State, http::StatusCode};
    use rusqlite::Connection;

    use crate::{
        Error,
        account::{
            AccountKind,
            core::list_accounts_for_user,
            create_endpoint::{
                CreateAccountRequest, CreateAccountState, create_account, create_account_endpoint,
            },
        },
        db::initialize,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn request(name: &str, balance: f64, is_default: bool) -> CreateAccountRequest {
        CreateAccountRequest {
            name: name.to_owned(),
            kind: AccountKind::Current,
            balance,
            is_default,
        }
    }

    #[tokio::test]
    async fn can_create_account() {
        let state = CreateAccountState {
            db_connection: Arc::new(Mutex::new(get_test_connection())),
        };

        let response = create_account_endpoint(
            State(state.clone()),
            Extension(1),
            Json(request("Everyday", 123.45, false)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);

        let connection = state.db_connection.lock().unwrap();
        let accounts = list_accounts_for_user(1, &connection).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Everyday");
        assert_eq!(accounts[0].balance, 123.45);
    }

    #[test]
    fn first_account_becomes_default_even_if_not_requested() {
        let conn = get_test_connection();

        let account = create_account(1, &request("Everyday", 100.0, false), &conn).unwrap();

        assert!(account.is_default);
    }

    #[test]
    fn new_default_clears_previous_default() {
        let conn = get_test_connection();
        let first = create_account(1, &request("Everyday", 100.0, false), &conn).unwrap();

        let second = create_account(1, &request("Rainy Day", 50.0, true), &conn).unwrap();

        assert!(second.is_default);
        let accounts = list_accounts_for_user(1, &conn).unwrap();
        let first_again = accounts.iter().find(|a| a.id == first.id).unwrap();
        assert!(!first_again.is_default);
        assert_eq!(accounts.iter().filter(|a| a.is_default).count(), 1);
    }

    #[test]
    fn non_default_second_account_leaves_default_alone() {
        let conn = get_test_connection();
        let first = create_account(1, &request("Everyday", 100.0, false), &conn).unwrap();

        let second = create_account(1, &request("Rainy Day", 50.0, false), &conn).unwrap();

        assert!(!second.is_default);
        let accounts = list_accounts_for_user(1, &conn).unwrap();
        assert!(accounts.iter().find(|a| a.id == first.id).unwrap().is_default);
    }

    #[test]
    fn zero_balance_is_rejected() {
        let conn = get_test_connection();

        let result = create_account(1, &request("Everyday", 0.0, false), &conn);

        assert_eq!(
            result,
            Err(Error::Validation(
                "Balance cannot be smaller or equal to 0.".to_owned()
            ))
        );
    }

    #[test]
    fn negative_balance_is_rejected() {
        let conn = get_test_connection();

        assert!(create_account(1, &request("Everyday", -5.0, false), &conn).is_err());
    }
}
