use std::sync::Arc;
use tokio::time::Instant;

/// A stored message together with its lifetime bounds
#[derive(Debug, Clone)]
pub struct Entry {
    content: Arc<str>,
    created_at: Instant,
    expires_at: Instant,
    generation: u64,
}

impl Entry {
    /// Creates a new entry written at `created_at` that stops being observable at `expires_at`
    pub fn new(content: Arc<str>, created_at: Instant, expires_at: Instant, generation: u64) -> Self {
        Self {
            content,
            created_at,
            expires_at,
            generation,
        }
    }

    /// Returns the stored content as a string slice
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the instant the entry was written
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns the expiration time
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Returns the store-wide write sequence number of this entry.
    ///
    /// Every `put` gets a fresh generation, so two entries stored under the
    /// same identifier never share one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Checks if this entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Checks if this entry is expired at the given instant
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Time left until expiry, zero once expired
    pub fn remaining(&self) -> std::time::Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}
