//! Email notifications: the mailer collaborator and the HTML bodies for
//! budget alerts and monthly reports.

use std::sync::OnceLock;

use maud::{DOCTYPE, Markup, html};
use numfmt::{Formatter, Precision};

use crate::{Error, auth::UserProfile, report::MonthlyStats};

/// The name the emails sign off with.
pub const SITE_NAME: &str = "Expensesync";

/// An external email-sending service.
pub trait Mailer: Send + Sync {
    /// Send an HTML email.
    ///
    /// # Errors
    /// Returns [Error::ExternalService] if the message could not be handed
    /// off for delivery.
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), Error>;
}

/// A [Mailer] that logs messages instead of delivering them.
///
/// Used by deployments without an outbound mail relay and as the default in
/// the server binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMailer;

impl Mailer for TracingMailer {
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), Error> {
        tracing::info!(
            "email to {to}: {subject} ({} byte body)",
            html_body.len()
        );

        Ok(())
    }
}

/// Format a dollar amount for display in an email, e.g. `-$1,234.50`.
pub(crate) fn format_currency(number: f64) -> String {
    static POSITIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let positive_fmt = POSITIVE_FMT.get_or_init(|| {
        Formatter::currency("$")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    static NEGATIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let negative_fmt = NEGATIVE_FMT.get_or_init(|| {
        Formatter::currency("-$")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    let mut formatted_string = if number < 0.0 {
        negative_fmt.fmt_string(number.abs())
    } else if number > 0.0 {
        positive_fmt.fmt_string(number)
    } else {
        // Zero is hardcoded as "0", so we must specify the formatted string for zero
        "$0.00".to_owned()
    };

    // numfmt omits the last trailing zero, so we must add it ourselves
    // For example, "12.30" is rendered as "12.3" so we append "0".
    if formatted_string.as_bytes()[formatted_string.len() - 3] != b'.' {
        formatted_string = format!("{formatted_string}0");
    }

    formatted_string
}

fn email_shell(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head { title { (title) } }
            body {
                (body)
                p { "— " (SITE_NAME) }
            }
        }
    }
}

/// Send a budget alert email to `profile`.
///
/// # Errors
/// Returns [Error::ExternalService] if the mailer fails.
pub fn send_budget_alert(
    mailer: &dyn Mailer,
    profile: &UserProfile,
    account_name: &str,
    percentage_used: f64,
    budget_amount: f64,
    total_expenses: f64,
) -> Result<(), Error> {
    let body = email_shell(
        "Budget Alert",
        html! {
            h1 { "Budget Alert" }
            p { "Hi " (profile.first_name) " " (profile.last_name) "," }
            p {
                "You have used " (format!("{percentage_used:.1}")) "% of your monthly budget of "
                (format_currency(budget_amount)) "."
            }
            p {
                "Expenses on your default account " b { (account_name) } " this month come to "
                (format_currency(total_expenses)) "."
            }
        },
    );

    mailer.send(&profile.email, "Budget Alert", &body.into_string())
}

/// Send the monthly financial report email to `profile`.
///
/// # Errors
/// Returns [Error::ExternalService] if the mailer fails.
pub fn send_monthly_report(
    mailer: &dyn Mailer,
    profile: &UserProfile,
    stats: &MonthlyStats,
    month_name: &str,
    insights: &[String],
) -> Result<(), Error> {
    let net_income = stats.total_income - stats.total_expenses;

    let body = email_shell(
        "Monthly Financial Report",
        html! {
            h1 { "Your Financial Report for " (month_name) }
            p { "Hi " (profile.first_name) " " (profile.last_name) "," }
            table {
                tr { td { "Total income" } td { (format_currency(stats.total_income)) } }
                tr { td { "Total expenses" } td { (format_currency(stats.total_expenses)) } }
                tr { td { "Net income" } td { (format_currency(net_income)) } }
            }
            @if !stats.by_category.is_empty() {
                h2 { "Expenses by category" }
                ul {
                    @for category in &stats.by_category {
                        li { (category.category) ": " (format_currency(category.total)) }
                    }
                }
            }
            h2 { "Insights" }
            ul {
                @for insight in insights {
                    li { (insight) }
                }
            }
        },
    );

    let subject = format!("Your Monthly Financial Report - {month_name}.");

    mailer.send(&profile.email, &subject, &body.into_string())
}
