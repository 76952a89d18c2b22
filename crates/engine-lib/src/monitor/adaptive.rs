//! Adaptive manager
//!
//! Learns which method works best per kind of site and time of day from the
//! outcomes the engine records, and keeps a ranking of failure types.

use crate::models::{clamp_score, CollectionMethod};
use crate::profiler::FailureKind;
use crate::sources::{has_url_token, matches_domain, FINANCE_URL_TOKENS, FX_URL_TOKENS};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CENTRAL_BANK_DOMAINS: &[&str] = &[
    "federalreserve.gov",
    "ecb.europa.eu",
    "boj.or.jp",
    "bankofengland.co.uk",
];

const NEWS_URL_TOKENS: &[&str] = &["news", "article", "articles", "story"];

pub const TOP_FAILURES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    CentralBank,
    Forex,
    Financial,
    News,
    General,
}

impl SiteType {
    pub fn classify(url: &str) -> Self {
        if matches_domain(url, CENTRAL_BANK_DOMAINS) {
            SiteType::CentralBank
        } else if has_url_token(url, FX_URL_TOKENS) {
            SiteType::Forex
        } else if has_url_token(url, NEWS_URL_TOKENS) {
            SiteType::News
        } else if has_url_token(url, FINANCE_URL_TOKENS) {
            SiteType::Financial
        } else {
            SiteType::General
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Weekdays 13:00-21:00 UTC
    MarketHours,
    OffPeak,
    Weekend,
}

impl TimeRange {
    pub fn at(at: DateTime<Utc>) -> Self {
        match at.weekday() {
            Weekday::Sat | Weekday::Sun => TimeRange::Weekend,
            _ if (13..21).contains(&at.hour()) => TimeRange::MarketHours,
            _ => TimeRange::OffPeak,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionSignature {
    pub method: CollectionMethod,
    pub site_type: SiteType,
    pub time_range: TimeRange,
}

impl ExecutionSignature {
    pub fn new(method: CollectionMethod, url: &str, at: DateTime<Utc>) -> Self {
        Self {
            method,
            site_type: SiteType::classify(url),
            time_range: TimeRange::at(at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub signature: ExecutionSignature,
    pub samples: u64,
    pub successes: u64,
    /// Running mean over every sample
    pub avg_quality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePattern {
    pub kind: FailureKind,
    pub count: u64,
    pub prevention: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPractice {
    pub name: String,
    pub description: String,
    /// Samples backing the practice
    pub evidence: u64,
}

/// Turns accumulated performance records into best practices.
pub trait PracticeEvolver: Send + Sync + std::fmt::Debug {
    fn evolve(&self, records: &[PerformanceRecord]) -> Vec<BestPractice>;
}

/// Placeholder evolver that ignores the records.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPractices;

impl PracticeEvolver for StaticPractices {
    fn evolve(&self, _records: &[PerformanceRecord]) -> Vec<BestPractice> {
        vec![BestPractice {
            name: "best_known_method".to_string(),
            description: "Use the best-known method for the site type and time range".to_string(),
            evidence: 0,
        }]
    }
}

fn prevention_for(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Timeout => "raise per-task timeout and schedule the source off-peak",
        FailureKind::Blocked => "switch to playwright_stealth and lower request rate",
        FailureKind::HttpError => "retry with backoff and verify the endpoint",
        FailureKind::Unreachable => "check DNS and connectivity before scheduling",
        FailureKind::Extraction => "upgrade to a rendering method and review selectors",
    }
}

#[derive(Debug)]
pub struct AdaptiveManager {
    records: Vec<PerformanceRecord>,
    index: HashMap<ExecutionSignature, usize>,
    failures: HashMap<FailureKind, u64>,
    evolver: Box<dyn PracticeEvolver>,
}

impl Default for AdaptiveManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveManager {
    pub fn new() -> Self {
        Self::with_evolver(Box::new(StaticPractices))
    }

    pub fn with_evolver(evolver: Box<dyn PracticeEvolver>) -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            failures: HashMap::new(),
            evolver,
        }
    }

    pub fn records(&self) -> &[PerformanceRecord] {
        &self.records
    }

    pub fn record_execution(&mut self, signature: ExecutionSignature, quality: f64, success: bool) {
        let slot = match self.index.get(&signature) {
            Some(&slot) => slot,
            None => {
                self.records.push(PerformanceRecord {
                    signature,
                    samples: 0,
                    successes: 0,
                    avg_quality: 0.0,
                });
                self.index.insert(signature, self.records.len() - 1);
                self.records.len() - 1
            }
        };
        let record = &mut self.records[slot];
        let n = record.samples as f64;
        record.avg_quality = (record.avg_quality * n + clamp_score(quality)) / (n + 1.0);
        record.samples += 1;
        if success {
            record.successes += 1;
        }
    }

    pub fn record_failure(&mut self, kind: FailureKind) {
        *self.failures.entry(kind).or_insert(0) += 1;
    }

    pub fn average_quality(&self, signature: &ExecutionSignature) -> Option<f64> {
        self.index.get(signature).map(|&i| self.records[i].avg_quality)
    }

    /// Method with the highest average quality for this kind of site and time.
    /// Ties go to the method with more samples.
    pub fn best_method(&self, site_type: SiteType, time_range: TimeRange) -> Option<CollectionMethod> {
        self.records
            .iter()
            .filter(|r| r.signature.site_type == site_type && r.signature.time_range == time_range)
            .max_by(|a, b| {
                a.avg_quality
                    .total_cmp(&b.avg_quality)
                    .then(a.samples.cmp(&b.samples))
                    .then(b.signature.method.cmp(&a.signature.method))
            })
            .map(|r| r.signature.method)
    }

    /// Most frequent failure types with a prevention strategy each
    pub fn top_failures(&self) -> Vec<FailurePattern> {
        let mut counts: Vec<(FailureKind, u64)> = self.failures.iter().map(|(k, c)| (*k, *c)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then((a.0 as u8).cmp(&(b.0 as u8))));
        counts
            .into_iter()
            .take(TOP_FAILURES)
            .map(|(kind, count)| FailurePattern {
                kind,
                count,
                prevention: prevention_for(kind).to_string(),
            })
            .collect()
    }

    pub fn evolve_best_practices(&self) -> Vec<BestPractice> {
        self.evolver.evolve(&self.records)
    }
}
