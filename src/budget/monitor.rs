//! The periodic budget monitor: emails an alert when a user's month-to-date
//! expenses cross the threshold.

use rusqlite::Connection;
use time::{OffsetDateTime, UtcOffset};

use crate::{
    Error,
    account::get_default_account,
    auth::IdentityProvider,
    budget::core::{list_budgets, set_last_alert_sent, sum_expenses},
    email::{Mailer, send_budget_alert},
    timezone::{get_local_offset, start_of_month},
};

/// The percentage of the budget that triggers an alert.
pub const BUDGET_ALERT_THRESHOLD: f64 = 80.0;

fn alert_sent_this_month(
    last_alert_sent: Option<OffsetDateTime>,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> bool {
    match last_alert_sent {
        None => false,
        Some(last) => {
            let last = last.to_offset(offset);
            let now = now.to_offset(offset);

            last.month() == now.month() && last.year() == now.year()
        }
    }
}

/// Check every budget and send at most one alert per user per calendar
/// month.
///
/// A user is considered only when they have a default account. Mail
/// failures are logged and swallowed; the alert timestamp is still stamped
/// so the user is not re-alerted within the month. A failure for one budget
/// never aborts the rest of the batch.
///
/// Returns how many alerts were triggered.
///
/// # Errors
/// Returns an error only if the budget scan itself fails.
pub fn check_budget_alerts(
    connection: &Connection,
    identity: &dyn IdentityProvider,
    mailer: &dyn Mailer,
    local_timezone: &str,
    now: OffsetDateTime,
) -> Result<usize, Error> {
    let offset = get_local_offset(local_timezone).unwrap_or(UtcOffset::UTC);
    let mut alerts_sent = 0;

    for budget in list_budgets(connection)? {
        if budget.amount <= 0.0 {
            continue;
        }

        let result = check_one_budget(&budget, connection, identity, mailer, offset, now);

        match result {
            Ok(true) => alerts_sent += 1,
            Ok(false) => {}
            Err(error) => {
                tracing::error!(
                    "could not check budget alert for user {}: {error}",
                    budget.user_id
                );
            }
        }
    }

    Ok(alerts_sent)
}

fn check_one_budget(
    budget: &crate::budget::Budget,
    connection: &Connection,
    identity: &dyn IdentityProvider,
    mailer: &dyn Mailer,
    offset: UtcOffset,
    now: OffsetDateTime,
) -> Result<bool, Error> {
    let Some(account) = get_default_account(budget.user_id, connection)? else {
        return Ok(false);
    };

    let total_expenses = sum_expenses(
        budget.user_id,
        account.id,
        start_of_month(now, offset),
        None,
        connection,
    )?;

    let percentage_used = total_expenses / budget.amount * 100.0;

    if percentage_used < BUDGET_ALERT_THRESHOLD
        || alert_sent_this_month(budget.last_alert_sent, now, offset)
    {
        return Ok(false);
    }

    let Some(profile) = identity.profile(budget.user_id) else {
        tracing::warn!("no profile for user {}; skipping budget alert", budget.user_id);
        return Ok(false);
    };

    if let Err(error) = send_budget_alert(
        mailer,
        &profile,
        &account.name,
        percentage_used,
        budget.amount,
        total_expenses,
    ) {
        tracing::error!("could not send budget alert to {}: {error}", profile.email);
    }

    set_last_alert_sent(budget.id, now, connection)?;

    Ok(true)
}
