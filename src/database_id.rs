//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// The ID of a bank account row.
pub type AccountId = i64;
/// The ID of a transaction row.
pub type TransactionId = i64;
/// The ID of a budget row.
pub type BudgetId = i64;
/// The opaque user reference issued by the identity provider.
pub type UserId = i64;
