//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Error,
    ai::GenerativeModel,
    auth::IdentityProvider,
    db::initialize,
    email::Mailer,
    rate_limit::RateLimiter,
    receipt::{RECEIPT_CACHE_TTL, ReceiptCache},
    transaction::{RECURRENCE_THROTTLE_LIMIT, RECURRENCE_THROTTLE_WINDOW},
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The external identity provider that resolves bearer tokens.
    pub identity: Arc<dyn IdentityProvider>,

    /// The external generative model used for receipt scanning and insights.
    pub model: Arc<dyn GenerativeModel>,

    /// The external email-sending service.
    pub mailer: Arc<dyn Mailer>,

    /// Cached receipt-scan results keyed by upload content hash.
    pub receipt_cache: Arc<ReceiptCache>,

    /// The per-user throttle for the recurrence processor.
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for
    /// the domain models. `local_timezone` should be a valid, canonical
    /// timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        local_timezone: &str,
        identity: Arc<dyn IdentityProvider>,
        model: Arc<dyn GenerativeModel>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            local_timezone: local_timezone.to_owned(),
            db_connection: Arc::new(Mutex::new(db_connection)),
            identity,
            model,
            mailer,
            receipt_cache: Arc::new(ReceiptCache::new(RECEIPT_CACHE_TTL)),
            rate_limiter: Arc::new(RateLimiter::new(
                RECURRENCE_THROTTLE_LIMIT,
                RECURRENCE_THROTTLE_WINDOW,
            )),
        })
    }
}
