//! Scripted supply source for unit tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::fetcher::SupplySource;
use super::types::SupplyReading;
use crate::error::{SupplyError, SupplyResult};

/// Replays queued outcomes in order; repeats the last one once drained.
pub struct ScriptedSource {
    outcomes: Mutex<VecDeque<Option<u64>>>,
    last: Mutex<Option<u64>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedSource {
    /// `Some(sats)` succeeds, `None` fails with `UpstreamUnavailable`.
    pub fn new(outcomes: impl IntoIterator<Item = Option<u64>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            last: Mutex::new(None),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(sats: u64) -> Self {
        Self::new([Some(sats)])
    }

    pub fn failing() -> Self {
        Self::new([None])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SupplySource for ScriptedSource {
    async fn fetch_supply(&self) -> SupplyResult<SupplyReading> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = {
            let mut outcomes = self.outcomes.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = outcomes.pop_front() {
                *last = next;
            }
            *last
        };

        match outcome {
            Some(sats) => Ok(SupplyReading::new(sats, Utc::now())),
            None => Err(SupplyError::UpstreamUnavailable("scripted failure".to_string())),
        }
    }
}
