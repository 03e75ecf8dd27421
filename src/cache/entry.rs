//! Cache Entry Module
//!
//! A stored value together with its deadline and integrity checksum.

use std::time::Duration;

use tokio::time::Instant;

/// Lifetime used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

// == Cache Entry ==
/// A single cache entry: serialized payload, absolute deadline and checksum.
///
/// Entries are read-only after creation. A later `set` replaces the whole entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// JSON-serialized value
    pub(crate) payload: Vec<u8>,
    /// Instant after which the entry is no longer visible
    pub expires_at: Instant,
    /// CRC-32 of `payload` computed at write time
    pub checksum: u32,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry that expires `ttl` from now.
    ///
    /// A TTL too large to represent is capped at roughly thirty years.
    pub fn new(payload: Vec<u8>, ttl: Duration) -> Self {
        let checksum = compute_checksum(&payload);
        let now = Instant::now();
        Self {
            payload,
            expires_at: now.checked_add(ttl).unwrap_or(now + FAR_FUTURE),
            checksum,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is visible only while `now < expires_at`, so it is expired from
    /// the deadline instant onwards.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    // == Verify ==
    /// Recomputes the checksum and compares it with the one recorded at write time.
    pub fn verify(&self) -> bool {
        self.current_checksum() == self.checksum
    }

    /// Checksum of the payload as it is now.
    pub fn current_checksum(&self) -> u32 {
        compute_checksum(&self.payload)
    }

    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

// == Utility Functions ==
/// Fast non-cryptographic checksum over serialized bytes.
pub fn compute_checksum(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}
