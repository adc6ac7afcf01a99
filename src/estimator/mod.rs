// Robust route delay estimation with shrinkage to a global prior
//
// Per-route delay samples are noisy: many routes have a handful of flights.
// Instead of trusting every local mean, each route is tested against the
// global distribution with a one-sample t-test and keeps its own statistics
// only when the difference is significant at the configured confidence level.
//
// Implementation:
// - Uses statrs for the Student's t distribution and descriptive statistics
// - Fallback cells record why the baseline was used (see `route_table`)

mod config;
mod delay_diff;
mod error;
mod route_stats;
mod statistics;

pub use config::EstimatorConfig;
pub use delay_diff::get_delay_statistics;
pub use error::EstimatorError;
pub use route_stats::{get_delays, Baseline, RouteDelays};
pub use statistics::{population_std_dev, ttest_1samp, OneSampleTTest, SampleSummary};
