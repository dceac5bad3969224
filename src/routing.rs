//! Application router configuration.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
};

use crate::{
    AppState, Error,
    account::{
        create_account_endpoint, get_account_endpoint, my_accounts_endpoint,
        update_account_endpoint,
    },
    auth::auth_guard,
    budget::{get_budget_endpoint, update_budget_endpoint},
    endpoints,
    receipt::{MAX_RECEIPT_SIZE, scan_receipt_endpoint},
    transaction::{
        create_transaction_endpoint, delete_transactions_endpoint, get_transaction_endpoint,
        list_transactions_endpoint, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Every route sits behind the bearer-token auth guard; the receipt-scan
/// route additionally raises the body limit to fit the largest allowed
/// upload.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::CREATE_ACCOUNT, post(create_account_endpoint))
        .route(endpoints::MY_ACCOUNTS, get(my_accounts_endpoint))
        .route(endpoints::ACCOUNT, get(get_account_endpoint))
        .route(endpoints::UPDATE_ACCOUNT, patch(update_account_endpoint))
        .route(endpoints::TRANSACTIONS, get(list_transactions_endpoint))
        .route(
            endpoints::CREATE_TRANSACTION,
            post(create_transaction_endpoint),
        )
        .route(
            endpoints::DELETE_TRANSACTIONS,
            delete(delete_transactions_endpoint),
        )
        .route(
            endpoints::SCAN_RECEIPT,
            post(scan_receipt_endpoint)
                .layer(DefaultBodyLimit::max(MAX_RECEIPT_SIZE + 16 * 1024)),
        )
        .route(endpoints::TRANSACTION, get(get_transaction_endpoint))
        .route(
            endpoints::UPDATE_TRANSACTION,
            put(update_transaction_endpoint),
        )
        .route(endpoints::BUDGET, get(get_budget_endpoint))
        .route(endpoints::UPDATE_BUDGET, patch(update_budget_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard))
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    Error::NotFound("Not found.").into_response()
}
