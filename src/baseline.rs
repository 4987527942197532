//! Baseline management
//!
//! Maintains, per user and per feature type, a rolling statistical baseline
//! (mean/std over a bounded time window with a minimum sample count) and
//! scores deviations of new observations against it.
//!
//! Updates for the same `(user_id, feature_type)` series are serialized by a
//! per-series writer lock and applied all-or-nothing; reads are served from
//! the last committed snapshot without touching the writer lock. Retried
//! updates are deduplicated by an idempotency key so they never double-count.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BaselineConfig;
use crate::error::EngineError;
use crate::types::{BaselineState, DeviationRecord, DeviationSeverity, FeatureType, UserBaseline};

/// Idempotency key for one baseline sample: retried `update` calls carrying
/// the same key are no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub session_id: String,
    pub sample_sequence: u32,
}

impl IdempotencyKey {
    pub fn new(session_id: impl Into<String>, sample_sequence: u32) -> Self {
        Self {
            session_id: session_id.into(),
            sample_sequence,
        }
    }
}

/// Numerically stable streaming mean/variance (Welford's method)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct WelfordAccumulator {
    count: u32,
    mean: f64,
    m2: f64,
}

impl WelfordAccumulator {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    fn from_values<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> Self {
        let mut acc = Self::default();
        for &v in values {
            acc.add(v);
        }
        acc
    }

    /// Population standard deviation over the accumulated samples
    fn std(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0).sqrt()
        }
    }
}

/// One retained sample with its observation time and dedup key
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sample {
    value: f64,
    observed_at: DateTime<Utc>,
    key: IdempotencyKey,
}

/// Mutable state of one `(user_id, feature_type)` series
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SeriesState {
    samples: VecDeque<Sample>,
    applied_keys: HashSet<IdempotencyKey>,
    stats: WelfordAccumulator,
    established_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

struct Series {
    /// Serializes updates for this series
    writer: Mutex<SeriesState>,
    /// Last committed state, readable without the writer lock
    committed: RwLock<BaselineState>,
}

impl Series {
    fn new() -> Self {
        Self {
            writer: Mutex::new(SeriesState::default()),
            committed: RwLock::new(BaselineState::Insufficient { sample_count: 0 }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    user_id: String,
    feature_type: FeatureType,
}

/// Per-user, per-feature-type rolling baseline store
pub struct BaselineManager {
    config: BaselineConfig,
    series: RwLock<HashMap<SeriesKey, Arc<Series>>>,
}

impl BaselineManager {
    pub fn new(config: BaselineConfig) -> Self {
        Self {
            config,
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Incorporate one sample into a user's baseline.
    ///
    /// Samples older than the retention window (relative to the newest
    /// observation time the series has seen) are pruned and the statistic
    /// recomputed over the retained samples; an incoming sample already
    /// observed before the window start is skipped without touching the
    /// statistic. The update is atomic: state is
    /// rebuilt on a working copy and committed in one assignment, so a
    /// failure partway never leaves mean/std/sample_count partially applied.
    pub fn update(
        &self,
        user_id: &str,
        feature_type: FeatureType,
        value: f64,
        observed_at: DateTime<Utc>,
        key: IdempotencyKey,
    ) -> Result<BaselineState, EngineError> {
        if !value.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "non-finite baseline sample for {}",
                feature_type.as_str()
            )));
        }

        let series = self.series_for(user_id, feature_type);
        let mut state = series.writer.lock();

        if state.applied_keys.contains(&key) {
            debug!(
                user_id,
                feature_type = feature_type.as_str(),
                session_id = %key.session_id,
                sample_sequence = key.sample_sequence,
                "replayed baseline update ignored"
            );
            return Ok(series.committed.read().clone());
        }

        // Work on a copy; commit only a fully rebuilt state
        let mut next = state.clone();
        let newest = next
            .samples
            .iter()
            .map(|s| s.observed_at)
            .max()
            .map_or(observed_at, |t| t.max(observed_at));
        let cutoff = newest - Duration::days(self.config.window_days);

        // A late retry observed before the window start is never admitted
        if observed_at < cutoff {
            debug!(
                user_id,
                feature_type = feature_type.as_str(),
                session_id = %key.session_id,
                sample_sequence = key.sample_sequence,
                "sample observed before the retention window skipped"
            );
            return Ok(series.committed.read().clone());
        }

        // Samples arrive in any order; prune by observation time, not position
        let before = next.samples.len();
        let applied_keys = &mut next.applied_keys;
        next.samples.retain(|s| {
            if s.observed_at < cutoff {
                applied_keys.remove(&s.key);
                false
            } else {
                true
            }
        });

        next.samples.push_back(Sample {
            value,
            observed_at,
            key: key.clone(),
        });
        next.applied_keys.insert(key);

        if next.samples.len() != before + 1 {
            // Window pruning invalidated the running statistic; rebuild it
            next.stats =
                WelfordAccumulator::from_values(next.samples.iter().map(|s| &s.value));
        } else {
            next.stats.add(value);
        }

        next.updated_at = Some(newest);
        if next.established_at.is_none() && next.stats.count >= self.config.min_samples {
            next.established_at = Some(observed_at);
        }

        let snapshot = self.snapshot_of(user_id, feature_type, &next);
        *state = next;
        *series.committed.write() = snapshot.clone();
        Ok(snapshot)
    }

    /// Current baseline for a user/feature, or the `Insufficient` sentinel.
    ///
    /// Served from the last committed snapshot; never blocks on a concurrent
    /// update.
    pub fn get_baseline(&self, user_id: &str, feature_type: FeatureType) -> BaselineState {
        let key = SeriesKey {
            user_id: user_id.to_string(),
            feature_type,
        };
        match self.series.read().get(&key) {
            Some(series) => series.committed.read().clone(),
            None => BaselineState::Insufficient { sample_count: 0 },
        }
    }

    /// Score one observation against the user's baseline.
    ///
    /// An unestablished baseline yields deviation 0 and unknown severity;
    /// a baseline is never fabricated. A zero-std baseline treats any
    /// difference as maximal deviation.
    pub fn deviation(
        &self,
        user_id: &str,
        session_id: &str,
        feature_type: FeatureType,
        current_value: f64,
    ) -> DeviationRecord {
        let detected_at = Utc::now();
        match self.get_baseline(user_id, feature_type) {
            BaselineState::Established(baseline) => {
                let raw = if baseline.std == 0.0 {
                    f64::INFINITY
                } else {
                    (current_value - baseline.mean).abs() / baseline.std
                };
                let deviation_score = (raw / self.config.deviation_normalizer).min(1.0);
                let severity = self.severity_of(deviation_score);

                DeviationRecord {
                    user_id: user_id.to_string(),
                    session_id: session_id.to_string(),
                    feature_type,
                    baseline_value: Some(baseline.mean),
                    current_value,
                    deviation_score,
                    severity,
                    detected_at,
                }
            }
            BaselineState::Insufficient { .. } => DeviationRecord {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                feature_type,
                baseline_value: None,
                current_value,
                deviation_score: 0.0,
                severity: DeviationSeverity::Unknown,
                detected_at,
            },
        }
    }

    fn severity_of(&self, deviation_score: f64) -> DeviationSeverity {
        if deviation_score < self.config.severity_low_max {
            DeviationSeverity::Low
        } else if deviation_score <= self.config.severity_medium_max {
            DeviationSeverity::Medium
        } else {
            DeviationSeverity::High
        }
    }

    fn snapshot_of(
        &self,
        user_id: &str,
        feature_type: FeatureType,
        state: &SeriesState,
    ) -> BaselineState {
        if state.stats.count < self.config.min_samples {
            return BaselineState::Insufficient {
                sample_count: state.stats.count,
            };
        }
        BaselineState::Established(UserBaseline {
            user_id: user_id.to_string(),
            feature_type,
            mean: state.stats.mean,
            std: state.stats.std(),
            sample_count: state.stats.count,
            established_at: state.established_at.unwrap_or_else(Utc::now),
            updated_at: state.updated_at.unwrap_or_else(Utc::now),
        })
    }

    fn series_for(&self, user_id: &str, feature_type: FeatureType) -> Arc<Series> {
        let key = SeriesKey {
            user_id: user_id.to_string(),
            feature_type,
        };
        if let Some(series) = self.series.read().get(&key) {
            return Arc::clone(series);
        }
        let mut map = self.series.write();
        Arc::clone(map.entry(key).or_insert_with(|| Arc::new(Series::new())))
    }

    /// Serialize all series for the external persistence collaborator
    pub fn to_json(&self) -> Result<String, EngineError> {
        let map = self.series.read();
        let mut entries = Vec::with_capacity(map.len());
        for (key, series) in map.iter() {
            entries.push(SeriesSnapshot {
                user_id: key.user_id.clone(),
                feature_type: key.feature_type,
                state: series.writer.lock().clone(),
            });
        }
        // Stable ordering keeps snapshots diffable
        entries.sort_by(|a, b| {
            (a.user_id.as_str(), a.feature_type.as_str())
                .cmp(&(b.user_id.as_str(), b.feature_type.as_str()))
        });
        serde_json::to_string(&entries).map_err(|e| EngineError::EncodingError(e.to_string()))
    }

    /// Restore series from a snapshot produced by [`BaselineManager::to_json`]
    pub fn load_json(&self, json: &str) -> Result<(), EngineError> {
        let entries: Vec<SeriesSnapshot> =
            serde_json::from_str(json).map_err(|e| EngineError::ParseError(e.to_string()))?;
        let mut map = self.series.write();
        map.clear();
        for entry in entries {
            let committed = self.snapshot_of(&entry.user_id, entry.feature_type, &entry.state);
            let key = SeriesKey {
                user_id: entry.user_id,
                feature_type: entry.feature_type,
            };
            map.insert(
                key,
                Arc::new(Series {
                    writer: Mutex::new(entry.state),
                    committed: RwLock::new(committed),
                }),
            );
        }
        Ok(())
    }

    /// Number of tracked series
    pub fn series_count(&self) -> usize {
        self.series.read().len()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SeriesSnapshot {
    user_id: String,
    feature_type: FeatureType,
    state: SeriesState,
}
