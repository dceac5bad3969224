//! Periodic background jobs: recurrence processing, budget alerts and
//! monthly reports.
//!
//! Jobs share the request handlers' database connection, so each run takes
//! the same lock and the same SQL-transaction discipline applies. A job
//! failure is logged and the loop keeps ticking.

use std::time::Duration;

use time::OffsetDateTime;

use crate::{
    AppState, budget::check_budget_alerts, report::generate_monthly_reports,
    transaction::trigger_recurring_transactions,
};

/// How often each periodic job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobIntervals {
    /// The recurrence-processor tick.
    pub recurring: Duration,
    /// The budget-monitor tick.
    pub budget_alerts: Duration,
    /// The report-generator tick.
    pub monthly_reports: Duration,
}

impl Default for JobIntervals {
    fn default() -> Self {
        Self {
            recurring: Duration::from_secs(60),
            budget_alerts: Duration::from_secs(60 * 60),
            monthly_reports: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Spawn the three periodic jobs onto the tokio runtime.
pub fn spawn_background_jobs(state: AppState, intervals: JobIntervals) {
    tokio::spawn(run_periodically(
        state.clone(),
        intervals.recurring,
        run_recurrence_job,
    ));
    tokio::spawn(run_periodically(
        state.clone(),
        intervals.budget_alerts,
        run_budget_alert_job,
    ));
    tokio::spawn(run_periodically(
        state,
        intervals.monthly_reports,
        run_report_job,
    ));
}

async fn run_periodically(state: AppState, period: Duration, job: fn(&AppState)) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        job(&state);
    }
}

fn run_recurrence_job(state: &AppState) {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return;
        }
    };

    match trigger_recurring_transactions(
        &connection,
        &state.rate_limiter,
        OffsetDateTime::now_utc(),
    ) {
        Ok(0) => {}
        Ok(processed) => tracing::info!("materialized {processed} recurring transactions"),
        Err(error) => tracing::error!("recurring transaction scan failed: {error}"),
    }
}

fn run_budget_alert_job(state: &AppState) {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return;
        }
    };

    match check_budget_alerts(
        &connection,
        state.identity.as_ref(),
        state.mailer.as_ref(),
        &state.local_timezone,
        OffsetDateTime::now_utc(),
    ) {
        Ok(0) => {}
        Ok(alerts) => tracing::info!("sent {alerts} budget alerts"),
        Err(error) => tracing::error!("budget alert check failed: {error}"),
    }
}

fn run_report_job(state: &AppState) {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return;
        }
    };

    match generate_monthly_reports(
        &connection,
        state.identity.as_ref(),
        state.model.as_ref(),
        state.mailer.as_ref(),
        OffsetDateTime::now_utc(),
    ) {
        Ok(reports) => tracing::info!("sent {reports} monthly reports"),
        Err(error) => tracing::error!("monthly report generation failed: {error}"),
    }
}
