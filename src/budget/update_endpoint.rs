//! Defines the endpoint for creating or updating the caller's budget.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    budget::core::{get_budget_for_user, insert_budget, set_budget_amount},
    database_id::UserId,
};

/// The state needed to update a budget.
#[derive(Clone)]
pub struct UpdateBudgetState {
    /// The database connection for managing budgets.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UpdateBudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for setting the monthly budget.
#[derive(Debug, Deserialize)]
pub struct UpdateBudgetRequest {
    /// The new monthly spending target in dollars.
    pub amount: f64,
}

/// The amount stored after a budget update.
#[derive(Debug, PartialEq, Serialize)]
pub struct UpdatedBudget {
    /// The monthly spending target in dollars.
    pub amount: f64,
}

/// Whether the update created the budget or changed an existing one.
#[derive(Debug, PartialEq, Eq)]
pub enum BudgetChange {
    /// The user had no budget; one was created lazily.
    Created,
    /// The existing budget's amount was replaced.
    Updated,
}

/// A route handler for creating or updating the caller's budget.
///
/// Responds with 201 when the budget was created lazily and 200 when an
/// existing budget was updated.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn update_budget_endpoint(
    State(state): State<UpdateBudgetState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<UpdateBudgetRequest>,
) -> Response {
    let connection = state.db_connection.lock().unwrap();

    match update_budget(user_id, &request, &connection) {
        Ok((amount, BudgetChange::Created)) => {
            (StatusCode::CREATED, Json(UpdatedBudget { amount })).into_response()
        }
        Ok((amount, BudgetChange::Updated)) => Json(UpdatedBudget { amount }).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Set the caller's monthly budget, creating it on first use.
///
/// # Errors
/// Returns [Error::Validation] if the amount is not positive or equals the
/// current budget.
pub fn update_budget(
    user_id: UserId,
    request: &UpdateBudgetRequest,
    connection: &Connection,
) -> Result<(f64, BudgetChange), Error> {
    if request.amount <= 0.0 {
        return Err(Error::Validation("Amount must be greater than 0.".to_owned()));
    }

    match get_budget_for_user(user_id, connection)? {
        Some(budget) => {
            if budget.amount == request.amount {
                return Err(Error::Validation(
                    "Amount is the same as the current budget".to_owned(),
                ));
            }

            set_budget_amount(budget.id, request.amount, connection)?;
            Ok((request.amount, BudgetChange::Updated))
        }
        None => {
            let budget = insert_budget(user_id, request.amount, connection)?;
            Ok((budget.amount, BudgetChange::Created))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Json, extract::State, http::StatusCode};
    use rusqlite::Connection;

    use crate::{
        Error,
        budget::{
            core::get_budget_for_user,
            update_endpoint::{
                BudgetChange, UpdateBudgetRequest, UpdateBudgetState, update_budget,
                update_budget_endpoint,
            },
        },
        db::initialize,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[tokio::test]
    async fn first_update_creates_budget() {
        let state = UpdateBudgetState {
            db_connection: Arc::new(Mutex::new(get_test_connection())),
        };

        let response = update_budget_endpoint(
            State(state.clone()),
            Extension(1),
            Json(UpdateBudgetRequest { amount: 1000.0 }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let connection = state.db_connection.lock().unwrap();
        let budget = get_budget_for_user(1, &connection).unwrap().unwrap();
        assert_eq!(budget.amount, 1000.0);
        assert_eq!(budget.last_alert_sent, None);
    }

    #[test]
    fn second_update_replaces_amount() {
        let conn = get_test_connection();
        update_budget(1, &UpdateBudgetRequest { amount: 1000.0 }, &conn).unwrap();

        let (amount, change) =
            update_budget(1, &UpdateBudgetRequest { amount: 1500.0 }, &conn).unwrap();

        assert_eq!(amount, 1500.0);
        assert_eq!(change, BudgetChange::Updated);
    }

    #[test]
    fn identical_amount_is_rejected() {
        let conn = get_test_connection();
        update_budget(1, &UpdateBudgetRequest { amount: 1000.0 }, &conn).unwrap();

        let result = update_budget(1, &UpdateBudgetRequest { amount: 1000.0 }, &conn);

        assert_eq!(
            result,
            Err(Error::Validation(
                "Amount is the same as the current budget".to_owned()
            ))
        );
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let conn = get_test_connection();

        assert!(update_budget(1, &UpdateBudgetRequest { amount: 0.0 }, &conn).is_err());
        assert!(update_budget(1, &UpdateBudgetRequest { amount: -10.0 }, &conn).is_err());
    }
}
