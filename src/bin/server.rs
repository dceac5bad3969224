use std::{
    fs::OpenOptions,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use axum::{
    Router, middleware,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;

use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use expensesync::{
    AppState, DisabledModel, JobIntervals, StaticIdentityProvider, TracingMailer, build_router,
    graceful_shutdown, logging_middleware, spawn_background_jobs,
};

/// The REST API server for expensesync.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// File path to the JSON table of bearer tokens and user profiles.
    #[arg(long)]
    identity_path: PathBuf,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    #[arg(long, default_value = "UTC")]
    timezone: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Seconds between recurrence-processor runs.
    #[arg(long, default_value_t = 60)]
    recurring_interval_secs: u64,

    /// Seconds between budget-alert checks.
    #[arg(long, default_value_t = 3600)]
    budget_alert_interval_secs: u64,

    /// Seconds between monthly-report runs.
    #[arg(long, default_value_t = 86400)]
    report_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let identity = StaticIdentityProvider::from_path(&args.identity_path)
        .expect("Could not load the identity token table.");

    let conn = Connection::open(&args.db_path).expect("Could not open the database.");
    let state = AppState::new(
        conn,
        &args.timezone,
        Arc::new(identity),
        Arc::new(DisabledModel),
        Arc::new(TracingMailer),
    )
    .expect("Could not initialize the database.");

    spawn_background_jobs(
        state.clone(),
        JobIntervals {
            recurring: Duration::from_secs(args.recurring_interval_secs),
            budget_alerts: Duration::from_secs(args.budget_alert_interval_secs),
            monthly_reports: Duration::from_secs(args.report_interval_secs),
        },
    );

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state))
        .layer(middleware::from_fn(logging_middleware));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .unwrap();
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
