//! Folds blade states into one lightpath summary.
//!
//! A snapshot with any blade that has not reported yet cannot be trusted, so
//! it yields a degraded result (inserted *and* removed, full transmission) and
//! schedules a single deferred re-evaluation. The guard that prevents a pile
//! of retries is shared with the scheduled task.

use crate::blade::BladeState;
use satt_traits::TaskScheduler;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateResult {
    pub inserted: bool,
    pub removed: bool,
    pub transmission: f64,
    pub num_in: usize,
    pub num_out: usize,
}

impl AggregateResult {
    /// Reported while any blade is uninitialized.
    pub const DEGRADED: Self = Self {
        inserted: true,
        removed: true,
        transmission: 1.0,
        num_in: 0,
        num_out: 0,
    };
}

/// Aggregate a fully initialized snapshot.
///
/// `per_blade` maps one-based blade indices to transmission factors; blades
/// without an entry use their state default.
pub fn fold_states(states: &[BladeState], per_blade: &BTreeMap<usize, f64>) -> AggregateResult {
    let mut num_in = 0;
    let mut num_out = 0;
    let mut transmission = 1.0;
    for (i, s) in states.iter().enumerate() {
        if s.is_inserted() {
            num_in += 1;
        }
        if s.is_removed() {
            num_out += 1;
        }
        transmission *= per_blade
            .get(&(i + 1))
            .copied()
            .unwrap_or_else(|| s.default_transmission());
    }
    AggregateResult {
        inserted: num_in > 0,
        removed: num_out == states.len(),
        transmission,
        num_in,
        num_out,
    }
}

type RetryHook = Arc<dyn Fn() + Send + Sync>;

pub struct BladeArrayAggregator {
    scheduler: Arc<dyn TaskScheduler + Send + Sync>,
    retry_delay: Duration,
    /// Armed while no retry is pending.
    retry_armed: Arc<AtomicBool>,
    /// Set by a fired retry so the next cached read recomputes.
    stale: Arc<AtomicBool>,
    cached: Option<AggregateResult>,
    on_retry: Option<RetryHook>,
}

impl core::fmt::Debug for BladeArrayAggregator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BladeArrayAggregator")
            .field("retry_delay", &self.retry_delay)
            .field("retry_armed", &self.retry_armed.load(Ordering::Relaxed))
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}

impl BladeArrayAggregator {
    pub fn new(scheduler: Arc<dyn TaskScheduler + Send + Sync>, retry_delay: Duration) -> Self {
        Self {
            scheduler,
            retry_delay,
            retry_armed: Arc::new(AtomicBool::new(true)),
            stale: Arc::new(AtomicBool::new(false)),
            cached: None,
            on_retry: None,
        }
    }

    /// Callback run by the deferred retry after it re-arms the guard.
    pub fn set_on_retry(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.on_retry = Some(Arc::new(hook));
    }

    pub fn retry_pending(&self) -> bool {
        !self.retry_armed.load(Ordering::Acquire)
    }

    pub fn cached(&self) -> Option<AggregateResult> {
        self.cached
    }

    /// Aggregate one snapshot; `None` entries are blades with no readback yet.
    ///
    /// The result, degraded or not, replaces the cached one.
    pub fn aggregate(
        &mut self,
        states: &[Option<BladeState>],
        per_blade: &BTreeMap<usize, f64>,
    ) -> AggregateResult {
        let result = match states.iter().copied().collect::<Option<Vec<_>>>() {
            Some(ready) => {
                self.retry_armed.store(true, Ordering::Release);
                fold_states(&ready, per_blade)
            }
            None => {
                self.schedule_retry();
                AggregateResult::DEGRADED
            }
        };
        tracing::trace!(
            blades = states.len(),
            inserted = result.inserted,
            removed = result.removed,
            transmission = result.transmission,
            "aggregated blade states"
        );
        self.cached = Some(result);
        self.stale.store(false, Ordering::Release);
        result
    }

    /// Return the cached result when allowed, otherwise read and aggregate.
    ///
    /// A fired retry invalidates the cache even for cached reads.
    pub fn get_or_aggregate<E>(
        &mut self,
        use_cache: bool,
        read: impl FnOnce() -> Result<(Vec<Option<BladeState>>, BTreeMap<usize, f64>), E>,
    ) -> Result<AggregateResult, E> {
        if use_cache && !self.stale.load(Ordering::Acquire) {
            if let Some(r) = self.cached {
                return Ok(r);
            }
        }
        let (states, per_blade) = read()?;
        Ok(self.aggregate(&states, &per_blade))
    }

    fn schedule_retry(&self) {
        // Only the caller that flips the guard schedules.
        if self
            .retry_armed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        tracing::debug!(
            delay_ms = self.retry_delay.as_millis() as u64,
            "uninitialized blade state; scheduling lightpath retry"
        );
        let armed = Arc::clone(&self.retry_armed);
        let stale = Arc::clone(&self.stale);
        let hook = self.on_retry.clone();
        self.scheduler.schedule(
            Box::new(move || {
                armed.store(true, Ordering::Release);
                stale.store(true, Ordering::Release);
                if let Some(h) = hook {
                    h();
                }
            }),
            self.retry_delay,
        );
    }
}
