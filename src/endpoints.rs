//! The API endpoint URIs.

/// The route for creating a bank account.
pub const CREATE_ACCOUNT: &str = "/account/create";
/// The route for listing the caller's bank accounts.
pub const MY_ACCOUNTS: &str = "/account/my-accounts";
/// The route for fetching one account together with its transactions.
pub const ACCOUNT: &str = "/account/{account_id}";
/// The route for updating an account, including its default flag.
pub const UPDATE_ACCOUNT: &str = "/account/{account_id}/update";

/// The route for listing the caller's transactions.
pub const TRANSACTIONS: &str = "/transactions";
/// The route for creating a transaction.
pub const CREATE_TRANSACTION: &str = "/transactions/create-transaction";
/// The route for bulk-deleting transactions.
pub const DELETE_TRANSACTIONS: &str = "/transactions/delete-transactions";
/// The route for scanning a receipt image into transaction fields.
pub const SCAN_RECEIPT: &str = "/transactions/scan-receipt";
/// The route for fetching a single transaction.
pub const TRANSACTION: &str = "/transactions/{transaction_id}";
/// The route for updating a transaction.
pub const UPDATE_TRANSACTION: &str = "/transactions/update/{transaction_id}";

/// The route for the caller's budget and current-month expenses.
pub const BUDGET: &str = "/budget";
/// The route for creating or updating the caller's budget.
pub const UPDATE_BUDGET: &str = "/budget/update";

// These tests are here so that we know the route strings will parse as URIs.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::CREATE_ACCOUNT);
        assert_endpoint_is_valid_uri(endpoints::MY_ACCOUNTS);
        assert_endpoint_is_valid_uri(endpoints::ACCOUNT);
        assert_endpoint_is_valid_uri(endpoints::UPDATE_ACCOUNT);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTIONS);
        assert_endpoint_is_valid_uri(endpoints::CREATE_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::DELETE_TRANSACTIONS);
        assert_endpoint_is_valid_uri(endpoints::SCAN_RECEIPT);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::UPDATE_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::BUDGET);
        assert_endpoint_is_valid_uri(endpoints::UPDATE_BUDGET);
    }
}
