//! Expensesync is a personal-finance backend.
//!
//! This library provides a JSON REST API for bank accounts, transactions and
//! budgets, plus the background jobs that materialize recurring transactions,
//! send budget alerts and generate monthly reports. Authentication, email
//! delivery and the generative model used for receipt scanning are external
//! collaborators injected through traits.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod ai;
mod app_state;
mod auth;
mod budget;
mod database_id;
mod db;
mod email;
mod endpoints;
mod logging;
mod rate_limit;
mod receipt;
mod report;
mod routing;
mod scheduler;
#[cfg(test)]
mod test_utils;
mod timezone;
mod transaction;

pub use ai::{DisabledModel, GenerativeModel};
pub use app_state::AppState;
pub use auth::{IdentityProvider, StaticIdentityProvider, UserProfile};
pub use database_id::{AccountId, BudgetId, DatabaseId, TransactionId, UserId};
pub use db::initialize as initialize_db;
pub use email::{Mailer, TracingMailer};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use scheduler::{JobIntervals, spawn_background_jobs};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request contained malformed or out-of-range input.
    ///
    /// The payload is the human-readable detail returned to the client.
    #[error("{0}")]
    Validation(String),

    /// The request conflicts with an invariant the server maintains, e.g.
    /// unsetting the only default account.
    #[error("{0}")]
    Conflict(String),

    /// The referenced entity does not exist.
    ///
    /// The payload is the detail string for the client, e.g. "Account not
    /// found". Internally, this error may occur when a query returns no rows.
    #[error("{0}")]
    NotFound(&'static str),

    /// The caller does not own the entity they tried to act on.
    #[error("permission denied")]
    PermissionDenied,

    /// The request carried no resolvable bearer token.
    #[error("missing or invalid credentials")]
    Unauthenticated,

    /// An external collaborator (generative model or mailer) failed.
    ///
    /// The error string should only be logged for debugging on the server.
    /// Clients receive an opaque internal server error.
    #[error("external service failed: {0}")]
    ExternalService(String),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLock,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => {
                Error::NotFound("The requested resource could not be found.")
            }
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status_code, detail) = match self {
            Error::Validation(detail) | Error::Conflict(detail) => {
                (StatusCode::BAD_REQUEST, detail)
            }
            Error::NotFound(detail) => (StatusCode::NOT_FOUND, detail.to_owned()),
            Error::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "You do not have permissions.".to_owned(),
            ),
            Error::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.".to_owned(),
            ),
            // Internal errors are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred.".to_owned(),
                )
            }
        };

        (status_code, Json(json!({ "detail": detail }))).into_response()
    }
}
