// In-flight delay growth: spread of ARR_DELAY - DEP_DELAY per route
//
// Same grouping and shrinkage as the route estimator, with two differences:
// the baseline is the population standard deviation of the differential over
// the whole table, and each route's mean differential is tested against that
// standard deviation rather than against a mean. Only a standard deviation
// table is produced.

use crate::estimator::config::EstimatorConfig;
use crate::estimator::error::EstimatorError;
use crate::estimator::route_stats::{decide_route, group_route_samples, RouteDecision};
use crate::estimator::statistics::population_std_dev;
use crate::flights::{DelayMetric, FlightTable};
use crate::route_table::{unique_labels, FallbackReason, Provenance, RouteStat, RouteStatsTable};

/// Per-route standard deviation of the arrival-minus-departure differential
///
/// The differential is derived per record on the fly; the caller's table is
/// never modified. Fallback cells hold the global standard deviation of the
/// differential, and the significance test for each route uses that same
/// value as its null-hypothesis mean.
pub fn get_delay_statistics<S: AsRef<str>>(
    flights: &FlightTable,
    destinations: &[S],
    origins: &[S],
    config: &EstimatorConfig,
) -> Result<RouteStatsTable, EstimatorError> {
    config.validate().map_err(EstimatorError::InvalidConfig)?;

    let metric = DelayMetric::DelayDifferential;
    let differentials = flights.metric_values(metric);
    if differentials.is_empty() {
        return Err(EstimatorError::EmptyBaseline {
            metric: metric.column_name(),
        });
    }
    let overall_std_diff = population_std_dev(&differentials);
    let baseline_count = differentials.len();

    let destinations = unique_labels(destinations);
    let origins = unique_labels(origins);

    let fallback = |reason: FallbackReason| RouteStat {
        value: overall_std_diff,
        sample_size: baseline_count,
        provenance: Provenance::GlobalFallback(reason),
    };

    let mut std_diff =
        RouteStatsTable::filled(&destinations, &origins, fallback(FallbackReason::NoFlights));

    let significance_level = config.significance_level();
    for ((destination, origin), samples) in
        group_route_samples(flights, &destinations, &origins, metric)
    {
        let cell = match decide_route(&samples, overall_std_diff, significance_level)? {
            RouteDecision::Local { summary, p_value } => RouteStat {
                value: summary.std_dev,
                sample_size: summary.count,
                provenance: Provenance::LocalEstimate { p_value },
            },
            RouteDecision::Fallback(reason) => fallback(reason),
        };
        std_diff.set(&destination, &origin, cell);
    }

    tracing::info!(
        "DELAY_DIFF route statistics: {} of {} cells use local estimates (global std {:.3})",
        std_diff.local_count(),
        std_diff.len(),
        overall_std_diff
    );

    Ok(std_diff)
}
