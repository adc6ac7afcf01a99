// Descriptive statistics and the one-sample t-test
//
// Thin wrappers over statrs so the estimators can treat a route sample and
// the global baseline the same way. Standard deviations here are sample
// standard deviations (n - 1 denominator) unless stated otherwise.

use crate::estimator::error::EstimatorError;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

/// Descriptive statistics of a sample with missing values already dropped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample variance, NaN when `count < 2`
    pub variance: f64,
    /// Sample standard deviation, NaN when `count < 2`
    pub std_dev: f64,
}

impl SampleSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let variance = values.iter().variance();
        Self {
            count: values.len(),
            mean: values.iter().mean(),
            variance,
            std_dev: variance.sqrt(),
        }
    }

    /// Enough spread to run a t-test: two or more values and non-zero variance
    pub fn is_testable(&self) -> bool {
        self.count > 1 && self.variance > 0.0
    }
}

/// Population standard deviation (n denominator), NaN for an empty sample
pub fn population_std_dev(values: &[f64]) -> f64 {
    values.iter().population_std_dev()
}

/// Result of a two-sided one-sample t-test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneSampleTTest {
    /// t-statistic value
    pub statistic: f64,

    /// Two-tailed p-value
    pub pvalue: f64,

    /// Degrees of freedom (`n - 1`)
    pub df: f64,
}

/// Test whether the mean of `sample` differs from `popmean`
///
/// Uses the sample's own variance for the standard error.
///
/// # Example
/// ```
/// use delayscope::estimator::ttest_1samp;
///
/// let late = [30.0, 32.0, 31.0, 29.0, 33.0];
/// let result = ttest_1samp(&late, 10.0).unwrap();
/// assert!(result.pvalue < 0.05);
/// ```
pub fn ttest_1samp(sample: &[f64], popmean: f64) -> Result<OneSampleTTest, EstimatorError> {
    let summary = SampleSummary::from_values(sample);
    if !summary.is_testable() {
        return Err(EstimatorError::Distribution(format!(
            "t-test needs at least 2 values with non-zero variance (n={}, var={})",
            summary.count, summary.variance
        )));
    }

    let n = summary.count as f64;
    let df = n - 1.0;
    let standard_error = summary.std_dev / n.sqrt();
    let statistic = (summary.mean - popmean) / standard_error;

    let t_dist =
        StudentsT::new(0.0, 1.0, df).map_err(|e| EstimatorError::Distribution(e.to_string()))?;
    let pvalue = (2.0 * t_dist.sf(statistic.abs())).min(1.0);

    Ok(OneSampleTTest {
        statistic,
        pvalue,
        df,
    })
}
