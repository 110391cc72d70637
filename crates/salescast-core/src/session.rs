//! Per-session state
//!
//! A [`Session`] belongs to one user interaction and is passed explicitly to
//! every pipeline call. It holds at most one series with its fitted model and
//! forecast (the [`SessionCache`] entry) and the last insight result.

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::forecast::FittedModel;
use crate::models::{Forecast, InsightResult, SeriesKey, TimeSeries};

/// The cached (series, model, forecast) triple
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: SeriesKey,
    pub horizon: u32,
    pub series: TimeSeries,
    pub model: FittedModel,
    pub forecast: Forecast,
}

/// Hit and miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Single-entry cache keyed by series identity and horizon
///
/// Writes are replace-on-complete: the entry only changes once a computation
/// has fully succeeded, so a failed run leaves the previous entry in place.
#[derive(Debug, Default)]
pub struct SessionCache {
    entry: Option<CacheEntry>,
    stats: CacheStats,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `(key, horizon)`, computing it on a miss
    ///
    /// `compute` receives the current entry (if any) so it can reuse parts of
    /// it, such as the fitted model when only the horizon changed. The bool
    /// is true on a hit.
    pub fn get_or_compute<F>(
        &mut self,
        key: &SeriesKey,
        horizon: u32,
        compute: F,
    ) -> Result<(&CacheEntry, bool)>
    where
        F: FnOnce(Option<&CacheEntry>) -> Result<CacheEntry>,
    {
        let hit = self
            .entry
            .as_ref()
            .is_some_and(|e| &e.key == key && e.horizon == horizon);

        if hit {
            self.stats.hits += 1;
            debug!(series = %key.short(), horizon, "Session cache hit");
        } else {
            self.stats.misses += 1;
            debug!(series = %key.short(), horizon, "Session cache miss");

            let entry = compute(self.entry.as_ref())?;
            if &entry.key != key || entry.horizon != horizon {
                return Err(Error::InvalidData(format!(
                    "computed entry for {}/{} does not match requested {}/{}",
                    entry.key.short(),
                    entry.horizon,
                    key.short(),
                    horizon
                )));
            }
            self.entry = Some(entry);
        }

        match self.entry.as_ref() {
            Some(entry) => Ok((entry, hit)),
            None => Err(Error::InvalidData("session cache is empty".into())),
        }
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    pub fn key(&self) -> Option<&SeriesKey> {
        self.entry.as_ref().map(|e| &e.key)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}

/// State of one interactive session
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) cache: SessionCache,
    pub(crate) insight: Option<InsightResult>,
    pub(crate) used_synthetic_data: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn series(&self) -> Option<&TimeSeries> {
        self.cache.entry().map(|e| &e.series)
    }

    pub fn model(&self) -> Option<&FittedModel> {
        self.cache.entry().map(|e| &e.model)
    }

    pub fn forecast(&self) -> Option<&Forecast> {
        self.cache.entry().map(|e| &e.forecast)
    }

    pub fn horizon(&self) -> Option<u32> {
        self.cache.entry().map(|e| e.horizon)
    }

    pub fn insight(&self) -> Option<&InsightResult> {
        self.insight.as_ref()
    }

    /// Whether the loaded series is the synthetic one
    pub fn used_synthetic_data(&self) -> bool {
        self.used_synthetic_data
    }

    /// Drop everything; the next run starts from scratch
    pub fn reset(&mut self) {
        self.cache.clear();
        self.insight = None;
        self.used_synthetic_data = false;
    }
}
