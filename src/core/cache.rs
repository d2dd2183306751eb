//! Read-through memoization for projection runs.
//!
//! Projections are pure functions of their inputs, so a result can be reused
//! whenever the exact same inputs come back. Keys compare floats by bit
//! pattern: `0.04` and `0.040000000000000001` are the same key, `0.0` and
//! `-0.0` are not. Errors are returned to the caller and never stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use super::engine::{project_constant, project_from_series};
use super::error::ProjectionError;
use super::types::{
    HistoricalYear, ProjectionParameters, ProjectionRow, SeriesParameters, WithdrawalAdjustment,
};

pub type SharedRows = Arc<[ProjectionRow]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Constant {
        principal: u64,
        return_rate: u64,
        horizon: u32,
        withdrawal_rate: u64,
        inflation_rate: u64,
        adjustment: WithdrawalAdjustment,
    },
    Series {
        principal: u64,
        withdrawal_rate: u64,
        horizon: u32,
        adjustment: WithdrawalAdjustment,
        years: Vec<(i32, u64, u64)>,
    },
}

impl CacheKey {
    pub fn constant(params: &ProjectionParameters) -> Self {
        CacheKey::Constant {
            principal: params.initial_principal.to_bits(),
            return_rate: params.annual_return_rate.to_bits(),
            horizon: params.horizon_periods,
            withdrawal_rate: params.initial_withdrawal_rate.to_bits(),
            inflation_rate: params.inflation_rate.to_bits(),
            adjustment: params.adjustment,
        }
    }

    /// Only the years the projection reads take part in the key, so two
    /// series sharing a prefix share cached horizons.
    pub fn series(params: &SeriesParameters, series: &[HistoricalYear]) -> Self {
        let used = series.len().min(params.horizon_periods as usize);
        CacheKey::Series {
            principal: params.initial_principal.to_bits(),
            withdrawal_rate: params.initial_withdrawal_rate.to_bits(),
            horizon: params.horizon_periods,
            adjustment: params.adjustment,
            years: series[..used]
                .iter()
                .map(|y| {
                    (
                        y.year,
                        y.annual_return_percent.to_bits(),
                        y.annual_inflation_percent.to_bits(),
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    rows: SharedRows,
    last_used: u64,
}

/// Bounded least-recently-used map from exact inputs to projected rows.
/// A capacity of 0 disables storage; every call projects afresh.
#[derive(Debug)]
pub struct ProjectionCache {
    capacity: usize,
    entries: HashMap<CacheKey, CacheEntry>,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl ProjectionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get_or_project_constant(
        &mut self,
        params: &ProjectionParameters,
    ) -> Result<SharedRows, ProjectionError> {
        let key = CacheKey::constant(params);
        if let Some(rows) = self.lookup(&key) {
            return Ok(rows);
        }
        let rows: SharedRows = project_constant(params)?.into();
        self.insert(key, rows.clone());
        Ok(rows)
    }

    pub fn get_or_project_series(
        &mut self,
        params: &SeriesParameters,
        series: &[HistoricalYear],
    ) -> Result<SharedRows, ProjectionError> {
        let key = CacheKey::series(params, series);
        if let Some(rows) = self.lookup(&key) {
            return Ok(rows);
        }
        let rows: SharedRows = project_from_series(params, series)?.into();
        self.insert(key, rows.clone());
        Ok(rows)
    }

    /// Returns the cached rows for `key`, marking them most recently used.
    /// Counts a hit or a miss.
    pub fn lookup(&mut self, key: &CacheKey) -> Option<SharedRows> {
        self.clock += 1;
        let stored = self.entries.len();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = self.clock;
                self.hits += 1;
                debug!("projection cache hit ({stored} entries)");
                Some(entry.rows.clone())
            }
            None => {
                self.misses += 1;
                debug!("projection cache miss ({stored} entries)");
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, rows: SharedRows) {
        if self.capacity == 0 {
            return;
        }
        self.clock += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }
        self.entries.insert(
            key,
            CacheEntry {
                rows,
                last_used: self.clock,
            },
        );
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            debug!("projection cache evicted least recent entry");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// [`ProjectionCache`] behind a mutex for handlers running on many threads.
///
/// The lock covers lookup and insert only; projecting happens with the lock
/// released, so distinct requests never queue behind each other's work.
/// Identical requests racing on a miss both compute and the later insert wins.
#[derive(Debug, Clone)]
pub struct SharedProjectionCache {
    inner: Arc<Mutex<ProjectionCache>>,
}

impl SharedProjectionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProjectionCache::new(capacity))),
        }
    }

    pub fn get_or_project_constant(
        &self,
        params: &ProjectionParameters,
    ) -> Result<SharedRows, ProjectionError> {
        self.read_through(CacheKey::constant(params), || project_constant(params))
    }

    pub fn get_or_project_series(
        &self,
        params: &SeriesParameters,
        series: &[HistoricalYear],
    ) -> Result<SharedRows, ProjectionError> {
        self.read_through(CacheKey::series(params, series), || {
            project_from_series(params, series)
        })
    }

    pub fn len(&self) -> usize {
        self.with_cache(|cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.with_cache(|cache| cache.is_empty())
    }

    fn read_through<F>(&self, key: CacheKey, project: F) -> Result<SharedRows, ProjectionError>
    where
        F: FnOnce() -> Result<Vec<ProjectionRow>, ProjectionError>,
    {
        if let Some(rows) = self.with_cache(|cache| cache.lookup(&key)) {
            return Ok(rows);
        }
        let rows: SharedRows = project()?.into();
        self.with_cache(|cache| cache.insert(key, rows.clone()));
        Ok(rows)
    }

    fn with_cache<T>(&self, f: impl FnOnce(&mut ProjectionCache) -> T) -> T {
        // Stored rows are never mutated, so a poisoned map is still consistent.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
