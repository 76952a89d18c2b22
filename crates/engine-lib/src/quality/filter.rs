//! Source screening against access history

use super::QualityMaximizer;
use crate::models::{clamp_score, CollectionMethod};
use crate::profiler::{SourceHistory, SourceHistoryStore};
use crate::sources::{has_url_token, matches_domain, FINANCE_URL_TOKENS, FX_URL_TOKENS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score estimates for sources with no quality history
pub const HIGH_VALUE_ESTIMATE: f64 = 85.0;
pub const FX_ESTIMATE: f64 = 70.0;
pub const FINANCE_ESTIMATE: f64 = 65.0;
pub const UNKNOWN_ESTIMATE: f64 = 50.0;

const HOUR: i64 = 3_600;

/// Bonus for how recently the source was accessed
pub fn recency_bonus(last_accessed_at: Option<i64>, now: DateTime<Utc>) -> f64 {
    let Some(at) = last_accessed_at else {
        return 0.0;
    };
    let age = now.timestamp() - at;
    if age < HOUR {
        15.0
    } else if age < 6 * HOUR {
        10.0
    } else if age < 24 * HOUR {
        5.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceVerdict {
    Approved,
    Conditional,
    Rejected,
}

/// Why a conditionally approved source needs watching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCondition {
    NoHistory,
    LimitedHistory,
    StaleData,
    LowReliability,
    BotProtection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAssessment {
    pub url: String,
    pub score: f64,
    pub verdict: SourceVerdict,
    pub conditions: Vec<SourceCondition>,
    /// One-step upgrade for conditional sources, when one exists
    pub suggested_method: Option<CollectionMethod>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFilterResult {
    pub approved: Vec<SourceAssessment>,
    pub conditional: Vec<SourceAssessment>,
    pub rejected: Vec<SourceAssessment>,
}

impl SourceFilterResult {
    pub fn len(&self) -> usize {
        self.approved.len() + self.conditional.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QualityMaximizer {
    /// Keyword estimate for a url with no quality history
    pub fn estimate_from_url(&self, url: &str) -> f64 {
        let domains: Vec<&str> = self.config().high_value_domains.iter().map(String::as_str).collect();
        if matches_domain(url, &domains) {
            HIGH_VALUE_ESTIMATE
        } else if has_url_token(url, FX_URL_TOKENS) {
            FX_ESTIMATE
        } else if has_url_token(url, FINANCE_URL_TOKENS) {
            FINANCE_ESTIMATE
        } else {
            UNKNOWN_ESTIMATE
        }
    }

    pub fn source_score(&self, url: &str, history: Option<&SourceHistory>, now: DateTime<Utc>) -> f64 {
        let config = self.config();
        let Some((h, recent)) = history.and_then(|h| h.recent_quality(config.history_window).map(|q| (h, q)))
        else {
            return self.estimate_from_url(url);
        };

        let mut score = recent;
        if self.reliability.calculate(url, Some(h)).score > config.reliability_bonus_threshold {
            score += config.reliability_bonus;
        }
        score += recency_bonus(h.last_accessed_at, now);
        clamp_score(score)
    }

    fn conditions(&self, url: &str, history: Option<&SourceHistory>, now: DateTime<Utc>) -> Vec<SourceCondition> {
        let config = self.config();
        let Some(h) = history else {
            return vec![SourceCondition::NoHistory];
        };

        let mut conditions = Vec::new();
        if h.quality_scores.len() < config.history_window {
            conditions.push(SourceCondition::LimitedHistory);
        }
        if recency_bonus(h.last_accessed_at, now) == 0.0 {
            conditions.push(SourceCondition::StaleData);
        }
        if self.reliability.calculate(url, Some(h)).score <= config.reliability_bonus_threshold {
            conditions.push(SourceCondition::LowReliability);
        }
        if h.blocked_failures() > 0 {
            conditions.push(SourceCondition::BotProtection);
        }
        conditions
    }

    /// Partition `urls` into approved, conditional and rejected sources.
    pub fn filter_low_quality_sources(
        &self,
        urls: &[String],
        history: &SourceHistoryStore,
        now: DateTime<Utc>,
    ) -> SourceFilterResult {
        let config = self.config();
        let mut result = SourceFilterResult::default();

        for url in urls {
            let record = history.get(url);
            let score = self.source_score(url, record, now);

            if score >= config.approve_threshold {
                result.approved.push(SourceAssessment {
                    url: url.clone(),
                    score,
                    verdict: SourceVerdict::Approved,
                    conditions: Vec::new(),
                    suggested_method: None,
                });
            } else if score < config.reject_threshold {
                result.rejected.push(SourceAssessment {
                    url: url.clone(),
                    score,
                    verdict: SourceVerdict::Rejected,
                    conditions: Vec::new(),
                    suggested_method: None,
                });
            } else {
                let current = record
                    .and_then(|h| h.last_method)
                    .unwrap_or(CollectionMethod::SimpleHttp);
                result.conditional.push(SourceAssessment {
                    url: url.clone(),
                    score,
                    verdict: SourceVerdict::Conditional,
                    conditions: self.conditions(url, record, now),
                    suggested_method: current.upgrade(),
                });
            }
        }

        tracing::info!(
            event = "sources_filtered",
            approved = result.approved.len(),
            conditional = result.conditional.len(),
            rejected = result.rejected.len(),
            "Filtered sources by quality"
        );

        result
    }
}
