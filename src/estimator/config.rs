// Configuration for the route statistics estimators
//
// The confidence level decides how strong the evidence must be before a
// route's own sample replaces the global baseline.

use serde::{Deserialize, Serialize};

/// Configuration shared by the route and delay-differential estimators
///
/// # Example
/// ```
/// use delayscope::estimator::EstimatorConfig;
///
/// let config = EstimatorConfig::default();
/// assert_eq!(config.confidence, 95.0);
/// assert!((config.significance_level() - 0.05).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Confidence level in percent for the one-sample t-test
    ///
    /// A route keeps its local mean/std only when the test's p-value is
    /// strictly below `(100 - confidence) / 100`.
    ///
    /// - 95 (default): local estimates need p < 0.05
    /// - 99: stricter, more routes shrink to the baseline
    /// - 90: looser, more routes keep their own estimate
    pub confidence: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self { confidence: 95.0 }
    }
}

impl EstimatorConfig {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }

    /// 99% confidence: only very clear deviations keep a local estimate
    pub fn strict() -> Self {
        Self { confidence: 99.0 }
    }

    /// 90% confidence
    pub fn permissive() -> Self {
        Self { confidence: 90.0 }
    }

    /// p-value threshold below which a route is significantly different
    pub fn significance_level(&self) -> f64 {
        (100.0 - self.confidence) / 100.0
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.confidence.is_finite() || self.confidence <= 0.0 || self.confidence >= 100.0 {
            return Err(format!(
                "confidence must be in (0, 100), got {}",
                self.confidence
            ));
        }
        Ok(())
    }
}
