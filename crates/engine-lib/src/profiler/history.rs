//! Per-source access history
//!
//! Arena of `SourceHistory` records with a url index. Owned by one writer
//! (the profiler, through the engine coordinator); serializable so callers
//! can persist it however they like.

use crate::models::{clamp_score, CollectionMethod};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Quality scores kept per source
const MAX_QUALITY_SCORES: usize = 50;
/// Failure records kept per source
const MAX_FAILURES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    /// 403 / 429 or a bot challenge page
    Blocked,
    HttpError,
    Unreachable,
    Extraction,
}

impl FailureKind {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16) -> Self {
        match status {
            403 | 429 => FailureKind::Blocked,
            _ => FailureKind::HttpError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceHistory {
    pub url: String,
    pub attempts: u64,
    pub successes: u64,
    pub failures: Vec<FailureRecord>,
    pub avg_response_ms: f64,
    pub last_accessed_at: Option<i64>,
    /// Observed data quality per collection, oldest first
    pub quality_scores: Vec<f64>,
    pub last_method: Option<CollectionMethod>,
}

impl SourceHistory {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// Failures over attempts; 1.0 with no attempts
    pub fn failure_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 1.0;
        }
        (self.attempts - self.successes) as f64 / self.attempts as f64
    }

    pub fn blocked_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.kind == FailureKind::Blocked)
            .count()
    }

    /// Mean of the most recent `n` quality scores
    pub fn recent_quality(&self, n: usize) -> Option<f64> {
        if self.quality_scores.is_empty() {
            return None;
        }
        let start = self.quality_scores.len().saturating_sub(n);
        let recent = &self.quality_scores[start..];
        Some(recent.iter().sum::<f64>() / recent.len() as f64)
    }

    /// Fold a later record for the same url into this one
    fn absorb(&mut self, other: SourceHistory) {
        let successes = self.successes.saturating_add(other.successes);
        if successes > 0 {
            self.avg_response_ms = (self.avg_response_ms * self.successes as f64
                + other.avg_response_ms * other.successes as f64)
                / successes as f64;
        }
        self.attempts = self.attempts.saturating_add(other.attempts);
        self.successes = successes;

        self.failures.extend(other.failures);
        if self.failures.len() > MAX_FAILURES {
            let excess = self.failures.len() - MAX_FAILURES;
            self.failures.drain(0..excess);
        }
        self.quality_scores.extend(other.quality_scores);
        if self.quality_scores.len() > MAX_QUALITY_SCORES {
            let excess = self.quality_scores.len() - MAX_QUALITY_SCORES;
            self.quality_scores.drain(0..excess);
        }
        self.last_accessed_at = self.last_accessed_at.max(other.last_accessed_at);
        if other.last_method.is_some() {
            self.last_method = other.last_method;
        }
    }
}

/// Store of per-url history records. The url index is rebuilt on
/// deserialize; records sharing a url are merged into the first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "StoredHistory")]
pub struct SourceHistoryStore {
    records: Vec<SourceHistory>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// Serialized form: records only
#[derive(Deserialize)]
struct StoredHistory {
    #[serde(default)]
    records: Vec<SourceHistory>,
}

impl From<StoredHistory> for SourceHistoryStore {
    fn from(stored: StoredHistory) -> Self {
        let mut store = SourceHistoryStore::default();
        for record in stored.records {
            match store.index.get(&record.url) {
                Some(&i) => store.records[i].absorb(record),
                None => {
                    store.index.insert(record.url.clone(), store.records.len());
                    store.records.push(record);
                }
            }
        }
        store
    }
}

impl SourceHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the url index, merging records that share a url
    pub fn reindex(&mut self) {
        let records = std::mem::take(&mut self.records);
        *self = StoredHistory { records }.into();
    }

    pub fn get(&self, url: &str) -> Option<&SourceHistory> {
        self.index.get(url).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceHistory> {
        self.records.iter()
    }

    fn entry(&mut self, url: &str) -> &mut SourceHistory {
        let idx = match self.index.get(url) {
            Some(&i) => i,
            None => {
                self.records.push(SourceHistory::new(url));
                let i = self.records.len() - 1;
                self.index.insert(url.to_string(), i);
                i
            }
        };
        &mut self.records[idx]
    }

    pub fn record_success(&mut self, url: &str, response_ms: u64, at: i64) {
        let record = self.entry(url);
        record.attempts += 1;
        record.successes += 1;
        let n = record.successes as f64;
        record.avg_response_ms += (response_ms as f64 - record.avg_response_ms) / n;
        record.last_accessed_at = Some(at);
    }

    pub fn record_failure(&mut self, url: &str, kind: FailureKind, status: Option<u16>, at: i64) {
        let record = self.entry(url);
        record.attempts += 1;
        record.failures.push(FailureRecord { kind, status, at });
        if record.failures.len() > MAX_FAILURES {
            let excess = record.failures.len() - MAX_FAILURES;
            record.failures.drain(0..excess);
        }
        record.last_accessed_at = Some(at);
    }

    /// Record one HTTP probe, classifying it by status
    pub fn record_probe(&mut self, url: &str, status: u16, response_ms: u64, at: i64) {
        if status < 400 {
            self.record_success(url, response_ms, at);
        } else {
            self.record_failure(url, FailureKind::from_status(status), Some(status), at);
        }
    }

    pub fn record_quality(&mut self, url: &str, score: f64, method: CollectionMethod, at: i64) {
        let record = self.entry(url);
        record.quality_scores.push(clamp_score(score));
        if record.quality_scores.len() > MAX_QUALITY_SCORES {
            record.quality_scores.remove(0);
        }
        record.last_method = Some(method);
        record.last_accessed_at = Some(at);
    }
}
