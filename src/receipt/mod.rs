//! Receipt scanning: turns an uploaded receipt image into structured
//! transaction fields via the generative model, with result caching.

mod cache;
mod scan_endpoint;

pub use cache::{RECEIPT_CACHE_TTL, ReceiptCache};
pub use scan_endpoint::{MAX_RECEIPT_SIZE, ScannedReceipt, scan_receipt, scan_receipt_endpoint};
