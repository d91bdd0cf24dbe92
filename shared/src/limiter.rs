/// Per-destination admission control for outbound fetches.
///
/// Each destination owns a fair tokio Semaphore: once saturated, a released
/// slot is handed straight to the longest-waiting acquirer.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{AcquireError, Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Concurrent fetches allowed per destination.
pub const DESTINATION_CAPACITY: usize = 128;

/// A rate-limit domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// One per remote hostname.
    Host(String),
    /// Shared by every fallback fetch against an original URL.
    Retry,
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Host(host) => write!(f, "{}", host),
            Destination::Retry => write!(f, "retry"),
        }
    }
}

/// A held slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl Permit {
    /// Release explicitly; same as dropping.
    pub fn release(self) {}
}

/// Decrements the waiting counter even if the acquire future is dropped.
struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed-capacity FIFO limiter for a single destination.
#[derive(Debug, Clone)]
pub struct AdmissionLimiter {
    semaphore: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    capacity: usize,
}

impl AdmissionLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            waiting: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Wait (without timeout) for a free slot.
    pub async fn acquire(&self) -> Result<Permit, AcquireError> {
        if let Some(permit) = self.try_acquire() {
            return Ok(permit);
        }

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = WaitGuard(&self.waiting);
        let permit = self.semaphore.clone().acquire_owned().await?;
        Ok(Permit { _permit: permit })
    }

    /// Take a slot only if one is free right now and nobody is queued ahead.
    pub fn try_acquire(&self) -> Option<Permit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| Permit { _permit: permit })
    }

    /// Free slots.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }

    /// Callers suspended in `acquire`.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

/// Lazily created limiters, one per destination, living for the whole run.
#[derive(Clone)]
pub struct Destinations {
    limiters: Arc<Mutex<HashMap<Destination, AdmissionLimiter>>>,
    capacity: usize,
}

impl Destinations {
    pub fn new() -> Self {
        Self::with_capacity(DESTINATION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            limiters: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    /// Limiter for a destination, created on first use.
    pub async fn limiter(&self, destination: &Destination) -> AdmissionLimiter {
        let mut limiters = self.limiters.lock().await;
        limiters
            .entry(destination.clone())
            .or_insert_with(|| {
                debug!("Creating limiter for destination {}", destination);
                AdmissionLimiter::new(self.capacity)
            })
            .clone()
    }

    /// Wait for a slot on the given destination.
    pub async fn acquire(&self, destination: &Destination) -> Result<Permit, AcquireError> {
        // The map lock is released before waiting on the semaphore.
        let limiter = self.limiter(destination).await;
        limiter.acquire().await
    }

    /// Number of destinations seen so far.
    pub async fn len(&self) -> usize {
        self.limiters.lock().await.len()
    }

    /// Per-destination snapshot, sorted by name.
    pub async fn stats(&self) -> Vec<DestinationStats> {
        let limiters = self.limiters.lock().await;
        let mut stats: Vec<DestinationStats> = limiters
            .iter()
            .map(|(destination, limiter)| DestinationStats {
                destination: destination.to_string(),
                in_flight: limiter.in_flight(),
                waiting: limiter.waiting(),
            })
            .collect();
        stats.sort_by(|a, b| a.destination.cmp(&b.destination));
        stats
    }
}

impl Default for Destinations {
    fn default() -> Self {
        Self::new()
    }
}

/// Destination statistics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationStats {
    pub destination: String,
    pub in_flight: usize,
    pub waiting: usize,
}
