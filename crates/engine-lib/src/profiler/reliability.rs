//! Source reliability scoring and availability prediction

use super::history::SourceHistory;
use crate::models::clamp_score;
use crate::sources::{matches_domain, TRUSTED_DOMAINS};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

pub const UPTIME_WEIGHT: f64 = 0.3;
pub const FAILURE_WEIGHT: f64 = 0.3;
pub const DOMAIN_WEIGHT: f64 = 0.2;
pub const BOT_FRIENDLINESS_WEIGHT: f64 = 0.2;

/// Bot-friendliness lost per blocked request
pub const BLOCK_PENALTY: f64 = 25.0;

pub const MAINTENANCE_FACTOR: f64 = 0.85;
pub const WEEKEND_FACTOR: f64 = 0.9;
pub const MARKET_HOURS_FACTOR: f64 = 1.05;

/// Reliability score and its components, each 0-100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityScore {
    pub score: f64,
    pub uptime: f64,
    pub failure_score: f64,
    pub domain_bonus: f64,
    pub bot_friendliness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityPrediction {
    /// 0-1
    pub probability: f64,
    /// 0-1
    pub confidence: f64,
    pub factors: Vec<String>,
}

/// Weighted reliability from access history
#[derive(Debug, Clone)]
pub struct ReliabilityCalculator {
    trusted_domains: Vec<String>,
}

impl Default for ReliabilityCalculator {
    fn default() -> Self {
        Self {
            trusted_domains: TRUSTED_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl ReliabilityCalculator {
    pub fn new(trusted_domains: Vec<String>) -> Self {
        Self { trusted_domains }
    }

    /// Score a source. Without history every component takes its worst value
    /// except the domain bonus.
    pub fn calculate(&self, url: &str, history: Option<&SourceHistory>) -> ReliabilityScore {
        let (uptime, failure_score, bot_friendliness) = match history {
            Some(h) if h.attempts > 0 => {
                let uptime = h.successes as f64 / h.attempts as f64 * 100.0;
                let failure_score = 100.0 - h.failure_rate() * 100.0;
                let bot = 100.0 - h.blocked_failures() as f64 * BLOCK_PENALTY;
                (uptime, failure_score, bot.max(0.0))
            }
            _ => (0.0, 0.0, 0.0),
        };

        let domains: Vec<&str> = self.trusted_domains.iter().map(String::as_str).collect();
        let domain_bonus = if matches_domain(url, &domains) { 100.0 } else { 0.0 };

        let score = UPTIME_WEIGHT * uptime
            + FAILURE_WEIGHT * failure_score
            + DOMAIN_WEIGHT * domain_bonus
            + BOT_FRIENDLINESS_WEIGHT * bot_friendliness;

        ReliabilityScore {
            score: clamp_score(score),
            uptime,
            failure_score,
            domain_bonus,
            bot_friendliness,
        }
    }

    /// Probability that the source answers at `at`, adjusted by fixed
    /// maintenance-window, weekend and market-hours heuristics (all UTC).
    pub fn predict_service_availability(
        &self,
        url: &str,
        history: Option<&SourceHistory>,
        at: DateTime<Utc>,
    ) -> AvailabilityPrediction {
        let reliability = self.calculate(url, history);
        let mut probability = reliability.score / 100.0;
        let mut factors = vec![format!("reliability={:.1}", reliability.score)];

        let hour = at.hour();
        let weekend = matches!(at.weekday(), Weekday::Sat | Weekday::Sun);

        if (2..4).contains(&hour) {
            probability *= MAINTENANCE_FACTOR;
            factors.push("maintenance_window".to_string());
        }
        if weekend {
            probability *= WEEKEND_FACTOR;
            factors.push("weekend".to_string());
        } else if (13..21).contains(&hour) {
            probability *= MARKET_HOURS_FACTOR;
            factors.push("market_hours".to_string());
        }

        let attempts = history.map(|h| h.attempts).unwrap_or(0);
        let confidence = (0.3 + 0.05 * attempts as f64).min(0.95);

        AvailabilityPrediction {
            probability: probability.clamp(0.0, 1.0),
            confidence,
            factors,
        }
    }
}
