//! Marginal utility of additional resources

use super::EfficiencyOptimizer;
use crate::models::clamp_score;
use serde::{Deserialize, Serialize};

pub const VALUE_TIME_COEFF: f64 = 0.8;
pub const VALUE_MEMORY_COEFF: f64 = 0.3;
pub const VALUE_CPU_COEFF: f64 = 0.5;
pub const COST_TIME_COEFF: f64 = 1.0;
pub const COST_MEMORY_COEFF: f64 = 0.5;
pub const COST_CPU_COEFF: f64 = 0.8;

/// Quality points per unit of headroom scaling
pub const HEADROOM_DIVISOR: f64 = 25.0;

const MS_PER_UNIT: f64 = 1_000.0;
const MB_PER_UNIT: f64 = 100.0;
const CPU_PER_UNIT: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalResources {
    pub time_ms: f64,
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityBand {
    HighlyRecommended,
    Recommended,
    Marginal,
    NotRecommended,
}

impl UtilityBand {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 2.0 {
            UtilityBand::HighlyRecommended
        } else if ratio > 1.0 {
            UtilityBand::Recommended
        } else if ratio > 0.5 {
            UtilityBand::Marginal
        } else {
            UtilityBand::NotRecommended
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginalUtility {
    pub value: f64,
    pub cost: f64,
    pub ratio: f64,
    pub recommendation: UtilityBand,
}

impl EfficiencyOptimizer {
    pub fn calculate_marginal_utility(
        &self,
        current_quality: f64,
        additional: &AdditionalResources,
    ) -> MarginalUtility {
        let time = additional.time_ms.max(0.0) / MS_PER_UNIT;
        let memory = additional.memory_mb.max(0.0) / MB_PER_UNIT;
        let cpu = additional.cpu_percent.max(0.0) / CPU_PER_UNIT;

        let headroom = (100.0 - clamp_score(current_quality)) / HEADROOM_DIVISOR;
        let value = (VALUE_TIME_COEFF * time + VALUE_MEMORY_COEFF * memory + VALUE_CPU_COEFF * cpu)
            * headroom;
        let cost = COST_TIME_COEFF * time + COST_MEMORY_COEFF * memory + COST_CPU_COEFF * cpu;
        let ratio = if cost > 0.0 { value / cost } else { 0.0 };

        MarginalUtility {
            value,
            cost,
            ratio,
            recommendation: UtilityBand::from_ratio(ratio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(UtilityBand::from_ratio(2.5), UtilityBand::HighlyRecommended);
        assert_eq!(UtilityBand::from_ratio(2.0), UtilityBand::Recommended);
        assert_eq!(UtilityBand::from_ratio(1.0), UtilityBand::Marginal);
        assert_eq!(UtilityBand::from_ratio(0.5), UtilityBand::NotRecommended);
    }

    #[test]
    fn test_utility_falls_as_quality_rises() {
        let optimizer = EfficiencyOptimizer::default();
        let extra = AdditionalResources {
            time_ms: 5_000.0,
            memory_mb: 0.0,
            cpu_percent: 0.0,
        };

        let low = optimizer.calculate_marginal_utility(0.0, &extra);
        assert!((low.ratio - 3.2).abs() < 1e-9);
        assert_eq!(low.recommendation, UtilityBand::HighlyRecommended);

        let high = optimizer.calculate_marginal_utility(75.0, &extra);
        assert!((high.ratio - 0.8).abs() < 1e-9);
        assert_eq!(high.recommendation, UtilityBand::Marginal);

        let saturated = optimizer.calculate_marginal_utility(100.0, &extra);
        assert_eq!(saturated.ratio, 0.0);
        assert_eq!(saturated.recommendation, UtilityBand::NotRecommended);
    }

    #[test]
    fn test_no_extra_resources() {
        let utility =
            EfficiencyOptimizer::default().calculate_marginal_utility(50.0, &AdditionalResources::default());
        assert_eq!(utility.cost, 0.0);
        assert_eq!(utility.recommendation, UtilityBand::NotRecommended);
    }
}
