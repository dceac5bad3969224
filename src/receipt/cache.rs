//! A TTL cache for receipt-scan results, keyed by upload content hash.
//!
//! Re-uploading the same image within the TTL returns the cached structured
//! result without a second model call.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::receipt::ScannedReceipt;

/// How long a scan result stays valid.
pub const RECEIPT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

struct CacheEntry {
    stored_at: Instant,
    receipt: ScannedReceipt,
}

/// An in-memory TTL cache of scan results.
pub struct ReceiptCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ReceiptCache {
    /// Create a cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the cached result for a content hash. Expired entries are
    /// evicted on access.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn get(&self, key: &str) -> Option<ScannedReceipt> {
        let mut entries = self.entries.lock().unwrap();

        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.receipt.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store the result for a content hash.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn insert(&self, key: &str, receipt: ScannedReceipt) {
        let mut entries = self.entries.lock().unwrap();

        entries.insert(
            key.to_owned(),
            CacheEntry {
                stored_at: Instant::now(),
                receipt,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::receipt::ScannedReceipt;

    use super::ReceiptCache;

    fn receipt() -> ScannedReceipt {
        ScannedReceipt {
            amount: 12.5,
            date: Some("2025-03-10".to_owned()),
            description: Some("coffee and cake".to_owned()),
            merchant_name: Some("Corner Cafe".to_owned()),
            category: Some("food".to_owned()),
        }
    }

    #[test]
    fn stores_and_returns_results() {
        let cache = ReceiptCache::new(Duration::from_secs(60));

        cache.insert("abc123", receipt());

        assert_eq!(cache.get("abc123"), Some(receipt()));
    }

    #[test]
    fn missing_key_is_none() {
        let cache = ReceiptCache::new(Duration::from_secs(60));

        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn expired_entries_are_evicted() {
        let cache = ReceiptCache::new(Duration::ZERO);

        cache.insert("abc123", receipt());

        assert_eq!(cache.get("abc123"), None);
    }
}
