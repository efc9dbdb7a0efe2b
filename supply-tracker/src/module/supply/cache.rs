//! Single-entry TTL cache in front of the upstream provider
//!
//! Expiry is measured from the last *successful* fetch. A failed refresh
//! never touches the stored entry and is reported to the caller rather than
//! answered with stale data.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::fetcher::SupplySource;
use super::types::SupplyReading;
use crate::error::{SupplyError, SupplyResult};

/// How long a successful reading is served before the next call refreshes it
pub const SUPPLY_TTL: Duration = Duration::from_secs(30);

struct CacheEntry {
    reading: SupplyReading,
    expires_at: Instant,
}

/// Outcome of the most recent upstream fetch
#[derive(Default)]
struct Flight {
    generation: u64,
    failure: Option<SupplyError>,
}

pub struct SupplyCache {
    source: Arc<dyn SupplySource>,
    ttl: Duration,
    /// Replaced wholesale on refresh, never mutated in place
    entry: RwLock<Option<Arc<CacheEntry>>>,
    /// Held for the duration of an upstream fetch
    flight: Mutex<Flight>,
    /// Mirror of `Flight::generation`, readable without queueing on the fetch
    completed: AtomicU64,
}

impl SupplyCache {
    pub fn new(source: Arc<dyn SupplySource>) -> Self {
        Self::with_ttl(source, SUPPLY_TTL)
    }

    pub fn with_ttl(source: Arc<dyn SupplySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entry: RwLock::new(None),
            flight: Mutex::new(Flight::default()),
            completed: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached reading while fresh, otherwise one upstream fetch.
    ///
    /// Callers that queue behind an in-flight fetch take its outcome, success
    /// or failure, instead of starting another one. No caller waits on more
    /// than one upstream request.
    pub async fn get_supply(&self) -> SupplyResult<SupplyReading> {
        let seen = self.completed.load(Ordering::Acquire);
        if let Some(reading) = self.fresh_reading().await {
            return Ok(reading);
        }

        let mut flight = self.flight.lock().await;

        if flight.generation != seen {
            if let Some(reading) = self.fresh_reading().await {
                return Ok(reading);
            }
            if let Some(e) = &flight.failure {
                tracing::debug!("Sharing failed refresh with a waiting caller");
                return Err(SupplyError::RefreshFailed(Box::new(e.clone())));
            }
        }

        let outcome = self.source.fetch_supply().await;
        flight.generation += 1;

        let result = match outcome {
            Ok(reading) => {
                let entry = Arc::new(CacheEntry {
                    reading: reading.clone(),
                    expires_at: Instant::now() + self.ttl,
                });
                *self.entry.write().await = Some(entry);
                flight.failure = None;

                tracing::info!(
                    "Supply cache refreshed: {} BTC (valid for {:?})",
                    reading.display_units,
                    self.ttl
                );
                Ok(reading)
            }
            Err(e) => {
                tracing::warn!("Supply cache refresh failed: {}", e);
                flight.failure = Some(e.clone());
                Err(SupplyError::RefreshFailed(Box::new(e)))
            }
        };

        self.completed.store(flight.generation, Ordering::Release);
        result
    }

    /// Current entry regardless of expiry.
    pub async fn peek(&self) -> Option<SupplyReading> {
        self.entry.read().await.as_ref().map(|entry| entry.reading.clone())
    }

    async fn fresh_reading(&self) -> Option<SupplyReading> {
        let entry = self.entry.read().await.clone()?;
        if Instant::now() < entry.expires_at {
            Some(entry.reading.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::supply::testing::ScriptedSource;

    fn cache_over(source: &Arc<ScriptedSource>) -> SupplyCache {
        SupplyCache::new(source.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let source = Arc::new(ScriptedSource::new([Some(100), Some(200)]));
        let cache = cache_over(&source);

        let first = cache.get_supply().await.unwrap();
        tokio::time::advance(Duration::from_secs(29)).await;
        let second = cache.get_supply().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_ttl() {
        let source = Arc::new(ScriptedSource::new([Some(100), Some(200)]));
        let cache = cache_over(&source);

        assert_eq!(cache.get_supply().await.unwrap().base_units, 100);
        tokio::time::advance(SUPPLY_TTL).await;

        let refreshed = cache.get_supply().await.unwrap();
        assert_eq!(refreshed.base_units, 200);
        assert_eq!(source.calls(), 2);

        // New entry gets a full TTL of its own
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get_supply().await.unwrap().base_units, 200);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_failure_propagates() {
        let source = Arc::new(ScriptedSource::failing());
        let cache = cache_over(&source);

        let err = cache.get_supply().await.unwrap_err();
        assert!(matches!(err, SupplyError::RefreshFailed(_)));
        assert!(matches!(err.root(), SupplyError::UpstreamUnavailable(_)));
        assert!(cache.peek().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_old_entry() {
        let source = Arc::new(ScriptedSource::new([Some(100), None, None, Some(300)]));
        let cache = cache_over(&source);

        let original = cache.get_supply().await.unwrap();
        tokio::time::advance(SUPPLY_TTL + Duration::from_secs(1)).await;

        // No serve-stale: the caller sees the failure
        assert!(cache.get_supply().await.is_err());
        assert_eq!(cache.peek().await, Some(original.clone()));

        // Expiry was not advanced by the failure, so the next call retries
        assert!(cache.get_supply().await.is_err());
        assert_eq!(source.calls(), 3);
        assert_eq!(cache.peek().await, Some(original));

        assert_eq!(cache.get_supply().await.unwrap().base_units, 300);
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_fetch() {
        let source = Arc::new(ScriptedSource::always(100).with_delay(Duration::from_millis(50)));
        let cache = cache_over(&source);

        let (a, b, c) = tokio::join!(cache.get_supply(), cache.get_supply(), cache.get_supply());
        assert_eq!(a.unwrap(), b.as_ref().unwrap().clone());
        assert_eq!(b.unwrap(), c.unwrap());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_failure() {
        let source = Arc::new(ScriptedSource::failing().with_delay(Duration::from_secs(10)));
        let cache = cache_over(&source);
        let started = Instant::now();

        let cache = &cache;
        let timed = move || async move {
            let result = cache.get_supply().await;
            (result, started.elapsed())
        };
        let ((a, ta), (b, tb), (c, tc)) = tokio::join!(timed(), timed(), timed());

        for (result, waited) in [(a, ta), (b, tb), (c, tc)] {
            let err = result.unwrap_err();
            assert!(matches!(err.root(), SupplyError::UpstreamUnavailable(_)));
            assert!(waited <= Duration::from_secs(10), "caller waited {:?}", waited);
        }
        assert_eq!(source.calls(), 1);

        // A caller arriving after the failed flight tries upstream again
        assert!(cache.get_supply().await.is_err());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_behind_failure_do_not_mask_later_success() {
        let source = Arc::new(
            ScriptedSource::new([None, Some(500)]).with_delay(Duration::from_secs(1)),
        );
        let cache = cache_over(&source);

        let (a, b) = tokio::join!(cache.get_supply(), cache.get_supply());
        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(source.calls(), 1);

        assert_eq!(cache.get_supply().await.unwrap().base_units, 500);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readings_never_decrease_with_growing_upstream() {
        let source = Arc::new(ScriptedSource::new([Some(100), Some(150), Some(150), Some(175)]));
        let cache = cache_over(&source);

        let mut previous = 0;
        for _ in 0..4 {
            let reading = cache.get_supply().await.unwrap();
            assert!(reading.base_units >= previous);
            assert_eq!(reading.display_units, reading.base_units as f64 / 1e8);
            previous = reading.base_units;
            tokio::time::advance(SUPPLY_TTL).await;
        }
        assert_eq!(source.calls(), 4);
    }
}
