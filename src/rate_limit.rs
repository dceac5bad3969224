//! A fixed-window rate limiter keyed by user.
//!
//! The recurrence processor uses this to cap how many recurring occurrences
//! it materializes per user per window. The limiter is an explicit component
//! injected into the processor rather than ambient shared state.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::database_id::UserId;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// A fixed-window counter per user.
///
/// A user's window starts on their first acquisition and is replenished at
/// most once per window duration: the next acquisition after the window has
/// elapsed resets the count and starts a new window.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    windows: Mutex<HashMap<UserId, Window>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_per_window` acquisitions per `window`.
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Try to take one slot for `user_id` in the current window.
    ///
    /// Returns `false` when the user has exhausted their window.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn try_acquire(&self, user_id: UserId) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();

        let window = windows.entry(user_id).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.max_per_window {
            return false;
        }

        window.count += 1;
        true
    }
}
