//! Bank accounts: per-user named balances with a single default account.

mod core;
mod create_endpoint;
mod get_endpoint;
mod list_endpoint;
mod update_endpoint;

pub use core::{
    Account, AccountKind, create_account_table, get_account, get_default_account,
    list_accounts_for_user, map_row_to_account,
};
pub use create_endpoint::{CreateAccountRequest, create_account, create_account_endpoint};
pub use get_endpoint::get_account_endpoint;
pub use list_endpoint::my_accounts_endpoint;
pub use update_endpoint::{UpdateAccountRequest, update_account, update_account_endpoint};
