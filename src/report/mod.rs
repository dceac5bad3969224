//! Monthly financial reports: per-user stats, model-generated insights and
//! the report email fan-out.

use rusqlite::Connection;
use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};

use crate::{
    Error,
    ai::{GenerativeModel, strip_markdown_fences},
    auth::IdentityProvider,
    database_id::UserId,
    db::normalize_datetime,
    email::{Mailer, send_monthly_report},
    timezone::{start_of_month, start_of_next_month},
};

/// The canned insights used when the generative model is unavailable or
/// replies with something unusable.
pub const FALLBACK_INSIGHTS: [&str; 3] = [
    "Your highest expense category this month might need attention.",
    "Consider setting up a budget for better financial management.",
    "Track your recurring expenses to identify potential savings.",
];

/// One category's expense total for the report month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// The category label.
    pub category: String,
    /// The summed expense amount in dollars.
    pub total: f64,
}

/// A user's aggregated numbers for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStats {
    /// Summed income in dollars.
    pub total_income: f64,
    /// Summed expenses in dollars.
    pub total_expenses: f64,
    /// Expenses broken down by category, largest first.
    pub by_category: Vec<CategoryTotal>,
}

/// Aggregate a user's income, expenses and per-category expense breakdown
/// for the calendar month containing `anchor`.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_monthly_stats(
    user_id: UserId,
    anchor: OffsetDateTime,
    connection: &Connection,
) -> Result<MonthlyStats, Error> {
    let from = normalize_datetime(start_of_month(anchor, UtcOffset::UTC));
    let to = normalize_datetime(start_of_next_month(anchor, UtcOffset::UTC));

    let sum_for_kind = |kind: &str| -> Result<f64, Error> {
        let total = connection.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM \"transaction\"
             WHERE user_id = ?1 AND kind = ?2 AND date >= ?3 AND date < ?4",
            rusqlite::params![user_id, kind, from, to],
            |row| row.get(0),
        )?;

        Ok(total)
    };

    let total_income = sum_for_kind("income")?;
    let total_expenses = sum_for_kind("expense")?;

    let by_category = connection
        .prepare(
            "SELECT category, SUM(amount) FROM \"transaction\"
             WHERE user_id = ?1 AND kind = 'expense' AND date >= ?2 AND date < ?3
             GROUP BY category ORDER BY SUM(amount) DESC",
        )?
        .query_map(rusqlite::params![user_id, from, to], |row| {
            Ok(CategoryTotal {
                category: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .map(|maybe_total| maybe_total.map_err(Error::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MonthlyStats {
        total_income,
        total_expenses,
        by_category,
    })
}

fn insights_prompt(stats: &MonthlyStats, month_name: &str) -> String {
    let categories = stats
        .by_category
        .iter()
        .map(|category| format!("{}: ${}", category.category, category.total))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Analyze this financial data and provide 3 concise, actionable insights.\n\
         Focus on spending patterns and practical advice.\n\
         Keep it friendly and conversational.\n\n\
         Financial Data for {month_name}:\n\
         - Total Income: ${}\n\
         - Total Expenses: ${}\n\
         - Net Income: ${}\n\
         - Expense Categories: {categories}\n\n\
         Format the response as a JSON array of strings, like this:\n\
         [\"insight 1\", \"insight 2\", \"insight 3\"]",
        stats.total_income,
        stats.total_expenses,
        stats.total_income - stats.total_expenses,
    )
}

/// Ask the generative model for three insights about `stats`.
///
/// Any failure (model error, non-JSON reply) falls back to
/// [FALLBACK_INSIGHTS]; report delivery never depends on the model.
pub fn generate_financial_insights(
    model: &dyn GenerativeModel,
    stats: &MonthlyStats,
    month_name: &str,
) -> Vec<String> {
    let fallback = || FALLBACK_INSIGHTS.map(ToOwned::to_owned).to_vec();

    let reply = match model.generate(&insights_prompt(stats, month_name)) {
        Ok(reply) => reply,
        Err(error) => {
            tracing::error!("Error generating insights: {error}");
            return fallback();
        }
    };

    match serde_json::from_str(&strip_markdown_fences(&reply)) {
        Ok(insights) => insights,
        Err(error) => {
            tracing::error!("insights reply is not a JSON array of strings: {error}");
            fallback()
        }
    }
}

/// Generate and email a monthly report for every known user.
///
/// The report covers the calendar month containing `now − 30 days`. A
/// failure for one user is logged and does not stop the fan-out. Returns
/// how many reports were sent.
///
/// # Errors
/// This function is infallible per user; the `Result` is kept for parity
/// with the other periodic jobs and currently always returns `Ok`.
pub fn generate_monthly_reports(
    connection: &Connection,
    identity: &dyn IdentityProvider,
    model: &dyn GenerativeModel,
    mailer: &dyn Mailer,
    now: OffsetDateTime,
) -> Result<usize, Error> {
    let anchor = now - time::Duration::days(30);
    let month_name = anchor.month().to_string();
    let mut reports_sent = 0;

    for profile in identity.list_users() {
        let stats = match get_monthly_stats(profile.user_id, anchor, connection) {
            Ok(stats) => stats,
            Err(error) => {
                tracing::error!(
                    "could not aggregate monthly stats for user {}: {error}",
                    profile.user_id
                );
                continue;
            }
        };

        let insights = generate_financial_insights(model, &stats, &month_name);

        match send_monthly_report(mailer, &profile, &stats, &month_name, &insights) {
            Ok(()) => reports_sent += 1,
            Err(error) => {
                tracing::error!("could not send monthly report to {}: {error}", profile.email);
            }
        }
    }

    Ok(reports_sent)
}


#[cfg(test)]
mod insights_tests {
    use crate::{
        report::{FALLBACK_INSIGHTS, MonthlyStats, generate_financial_insights},
        test_utils::StubModel,
    };

    fn stats() -> MonthlyStats {
        MonthlyStats {
            total_income: 2000.0,
            total_expenses: 400.0,
            by_category: Vec::new(),
        }
    }

    #[test]
    fn parses_model_reply() {
        let model = StubModel::replying(r#"["a", "b", "c"]"#);

        let insights = generate_financial_insights(&model, &stats(), "February");

        assert_eq!(insights, vec!["a", "b", "c"]);
    }

    #[test]
    fn model_failure_falls_back_to_generic_insights() {
        let model = StubModel::failing();

        let insights = generate_financial_insights(&model, &stats(), "February");

        assert_eq!(insights, FALLBACK_INSIGHTS.map(ToOwned::to_owned).to_vec());
    }

    #[test]
    fn non_json_reply_falls_back() {
        let model = StubModel::replying("here are some thoughts...");

        let insights = generate_financial_insights(&model, &stats(), "February");

        assert_eq!(insights.len(), 3);
        assert_eq!(insights[0], FALLBACK_INSIGHTS[0]);
    }
}
