//! Caller-owned memoization of [`analyze_flight`] results.
//!
//! The analysis functions never look at this cache. An application that
//! re-opens the same file (or re-renders with unchanged settings) keeps an
//! [`AnalysisCache`] and goes through [`AnalysisCache::get_or_analyze`].

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::NaiveDate;
use log::debug;

use crate::error::Result;
use crate::{analyze_flight, AnalysisConfig, FlightAnalysis};

/// Bounded cache of flight analyses keyed by content hash.
///
/// When full, the oldest inserted entry is evicted.
#[derive(Debug)]
pub struct AnalysisCache {
    capacity: usize,
    entries: HashMap<u64, Arc<FlightAnalysis>>,
    order: VecDeque<u64>,
}

impl AnalysisCache {
    /// Create a cache holding at most `capacity` analyses (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Key for an input: a hash of the IGC text, the date hint and every
    /// configuration value.
    pub fn content_key(igc_text: &str, date_hint: Option<NaiveDate>, config: &AnalysisConfig) -> u64 {
        let mut hasher = DefaultHasher::new();
        igc_text.hash(&mut hasher);
        date_hint.hash(&mut hasher);
        // f64 fields have no Hash impl; the Debug form covers every field
        format!("{:?}", config).hash(&mut hasher);
        hasher.finish()
    }

    /// Return the cached analysis or run [`analyze_flight`] and store it.
    ///
    /// Parse errors are returned and not cached.
    pub fn get_or_analyze(
        &mut self,
        igc_text: &str,
        date_hint: Option<NaiveDate>,
        config: &AnalysisConfig,
    ) -> Result<Arc<FlightAnalysis>> {
        let key = Self::content_key(igc_text, date_hint, config);
        if let Some(hit) = self.entries.get(&key) {
            debug!("[cache] hit {:016x}", key);
            return Ok(Arc::clone(hit));
        }

        let analysis = Arc::new(analyze_flight(igc_text, date_hint, config)?);
        self.insert(key, Arc::clone(&analysis));
        Ok(analysis)
    }

    pub fn get(&self, key: u64) -> Option<Arc<FlightAnalysis>> {
        self.entries.get(&key).cloned()
    }

    fn insert(&mut self, key: u64, analysis: Arc<FlightAnalysis>) {
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    debug!("[cache] evicted {:016x}", oldest);
                }
                None => break,
            }
        }
        self.entries.insert(key, analysis);
        self.order.push_back(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::synthetic_igc;

    #[test]
    fn test_hit_returns_same_analysis() {
        let igc = synthetic_igc(&[1000, 1010, 1020, 1030]);
        let mut cache = AnalysisCache::new(4);
        let config = AnalysisConfig::default();

        let a = cache.get_or_analyze(&igc, None, &config).unwrap();
        let b = cache.get_or_analyze(&igc, None, &config).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert!(cache
            .get(AnalysisCache::content_key(&igc, None, &config))
            .is_some());
    }

    #[test]
    fn test_config_change_is_a_miss() {
        let igc = synthetic_igc(&[1000, 1010, 1020, 1030]);
        let mut cache = AnalysisCache::new(4);
        let config = AnalysisConfig::default();
        let mut wider = AnalysisConfig::default();
        wider.smoothing_window_sec = 20.0;

        let a = cache.get_or_analyze(&igc, None, &config).unwrap();
        let b = cache.get_or_analyze(&igc, None, &wider).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_oldest_entry_evicted() {
        let config = AnalysisConfig::default();
        let flights: Vec<String> = (0..3)
            .map(|i| synthetic_igc(&[1000 + i, 1010, 1020]))
            .collect();
        let mut cache = AnalysisCache::new(2);
        for igc in &flights {
            cache.get_or_analyze(igc, None, &config).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert!(cache
            .get(AnalysisCache::content_key(&flights[0], None, &config))
            .is_none());
        assert!(cache
            .get(AnalysisCache::content_key(&flights[2], None, &config))
            .is_some());
    }

    #[test]
    fn test_errors_not_cached() {
        let mut cache = AnalysisCache::new(2);
        assert!(cache
            .get_or_analyze("HFPLTPILOT:Nobody\n", None, &AnalysisConfig::default())
            .is_err());
        assert!(cache.is_empty());
    }
}
