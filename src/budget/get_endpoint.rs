//! Defines the endpoint for fetching the caller's budget and current-month
//! expenses.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};

use crate::{
    AppState, Error,
    account::get_default_account,
    budget::core::{get_budget_for_user, sum_expenses},
    database_id::UserId,
    timezone::{get_local_offset, start_of_month, start_of_next_month},
};

/// The state needed to fetch a budget.
#[derive(Clone)]
pub struct GetBudgetState {
    /// The database connection for managing budgets.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone used for calendar-month boundaries.
    pub local_timezone: String,
}

impl FromRef<AppState> for GetBudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The caller's budget, if set, and this month's expenses on their default
/// account.
#[derive(Debug, PartialEq, Serialize)]
pub struct BudgetSummary {
    /// The monthly spending target, or `null` when no budget is set.
    pub amount: Option<f64>,
    /// Expense total on the default account since the start of the month.
    pub current_expenses: f64,
}

/// A route handler returning the caller's budget summary.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_budget_endpoint(
    State(state): State<GetBudgetState>,
    Extension(user_id): Extension<UserId>,
) -> Response {
    let connection = state.db_connection.lock().unwrap();
    let offset = get_local_offset(&state.local_timezone).unwrap_or(UtcOffset::UTC);

    match budget_summary(user_id, offset, OffsetDateTime::now_utc(), &connection) {
        Ok(summary) => Json(summary).into_response(),
        Err(error) => error.into_response(),
    }
}

fn budget_summary(
    user_id: UserId,
    offset: UtcOffset,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<BudgetSummary, Error> {
    let account = get_default_account(user_id, connection)?
        .ok_or(Error::NotFound("No default Account found."))?;

    let budget = get_budget_for_user(user_id, connection)?;

    let current_expenses = sum_expenses(
        user_id,
        account.id,
        start_of_month(now, offset),
        Some(start_of_next_month(now, offset)),
        connection,
    )?;

    Ok(BudgetSummary {
        amount: budget.map(|budget| budget.amount),
        current_expenses,
    })
}
