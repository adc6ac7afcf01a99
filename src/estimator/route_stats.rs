// Robust per-route delay statistics with shrinkage to a global baseline
//
// For every (destination, origin) pair the route's own sample is compared to
// the global baseline with a one-sample t-test. Only routes whose mean differs
// significantly keep their local mean/std; every other cell, including pairs
// with no flights at all, takes the global statistic.

use crate::estimator::config::EstimatorConfig;
use crate::estimator::error::EstimatorError;
use crate::estimator::statistics::{ttest_1samp, SampleSummary};
use crate::flights::{DelayMetric, FlightTable};
use crate::route_table::{unique_labels, FallbackReason, Provenance, RouteStat, RouteStatsTable};
use std::collections::{HashMap, HashSet};

/// Global statistics of a delay metric over the entire flight table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

impl Baseline {
    /// Baseline over every non-missing value of `metric`, before any filtering
    ///
    /// A single observation gives a defined mean and a NaN sample std; only a
    /// table without any value of `metric` is rejected.
    pub fn compute(flights: &FlightTable, metric: DelayMetric) -> Result<Self, EstimatorError> {
        let values = flights.metric_values(metric);
        if values.is_empty() {
            return Err(EstimatorError::EmptyBaseline {
                metric: metric.column_name(),
            });
        }

        let summary = SampleSummary::from_values(&values);
        if summary.count < 2 {
            tracing::warn!(
                "Global {} baseline has a single observation, std is undefined",
                metric.column_name()
            );
        } else if summary.variance == 0.0 {
            tracing::warn!(
                "Global {} baseline has zero variance over {} flights",
                metric.column_name(),
                summary.count
            );
        }

        Ok(Self {
            mean: summary.mean,
            std_dev: summary.std_dev,
            count: summary.count,
        })
    }
}

/// Mean and standard deviation tables produced by [`get_delays`]
#[derive(Debug, Clone)]
pub struct RouteDelays {
    pub mean: RouteStatsTable,
    pub std_dev: RouteStatsTable,
    pub baseline: Baseline,
}

/// Outcome of testing one route sample against the baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RouteDecision {
    Local { summary: SampleSummary, p_value: f64 },
    Fallback(FallbackReason),
}

/// Decide whether a route sample is significantly different from `null_mean`
///
/// The p-value must be strictly below `significance_level`; a tie keeps the
/// baseline.
pub(crate) fn decide_route(
    samples: &[f64],
    null_mean: f64,
    significance_level: f64,
) -> Result<RouteDecision, EstimatorError> {
    let summary = SampleSummary::from_values(samples);

    if summary.count < 2 {
        return Ok(RouteDecision::Fallback(FallbackReason::InsufficientSamples));
    }
    if !summary.is_testable() {
        return Ok(RouteDecision::Fallback(FallbackReason::ZeroVariance));
    }

    let test = ttest_1samp(samples, null_mean)?;
    if test.pvalue < significance_level {
        Ok(RouteDecision::Local {
            summary,
            p_value: test.pvalue,
        })
    } else {
        Ok(RouteDecision::Fallback(FallbackReason::NotSignificant))
    }
}

/// Non-missing metric values grouped by (destination, origin)
///
/// Only pairs in `destinations × origins` are kept. A pair whose flights all
/// lack the metric is still present with an empty sample, which separates
/// "insufficient samples" from "no flights".
pub(crate) fn group_route_samples(
    flights: &FlightTable,
    destinations: &[String],
    origins: &[String],
    metric: DelayMetric,
) -> HashMap<(String, String), Vec<f64>> {
    let destination_set: HashSet<&str> = destinations.iter().map(String::as_str).collect();
    let origin_set: HashSet<&str> = origins.iter().map(String::as_str).collect();

    let mut groups: HashMap<(String, String), Vec<f64>> = HashMap::new();
    for record in flights.records() {
        if !destination_set.contains(record.destination.as_str())
            || !origin_set.contains(record.origin.as_str())
        {
            continue;
        }

        let samples = groups
            .entry((record.destination.clone(), record.origin.clone()))
            .or_default();
        if let Some(value) = metric.value(record) {
            samples.push(value);
        }
    }
    groups
}

/// Robust per-route mean and standard deviation of `metric`
///
/// Returns destination × origin tables that are total over the requested
/// cross-product. Duplicate airport codes in either list are ignored and the
/// two lists may overlap.
///
/// # Example
/// ```
/// use delayscope::estimator::{get_delays, EstimatorConfig};
/// use delayscope::flights::{DelayMetric, FlightRecord, FlightTable};
///
/// let flights = FlightTable::new(vec![
///     FlightRecord::new("JFK", "LAX", Some(0.0), Some(5.0)),
///     FlightRecord::new("JFK", "LAX", Some(0.0), Some(7.0)),
///     FlightRecord::new("SFO", "LAX", Some(0.0), Some(6.0)),
/// ]);
///
/// let delays = get_delays(
///     &flights,
///     &["LAX"],
///     &["JFK", "ORD"],
///     &EstimatorConfig::default(),
///     DelayMetric::ArrivalDelay,
/// )
/// .unwrap();
///
/// // ORD -> LAX has no flights: global mean
/// assert_eq!(delays.mean.value("LAX", "ORD"), Some(6.0));
/// ```
pub fn get_delays<S: AsRef<str>>(
    flights: &FlightTable,
    destinations: &[S],
    origins: &[S],
    config: &EstimatorConfig,
    metric: DelayMetric,
) -> Result<RouteDelays, EstimatorError> {
    config.validate().map_err(EstimatorError::InvalidConfig)?;

    let baseline = Baseline::compute(flights, metric)?;
    let destinations = unique_labels(destinations);
    let origins = unique_labels(origins);

    let fallback = |value: f64, reason: FallbackReason| RouteStat {
        value,
        sample_size: baseline.count,
        provenance: Provenance::GlobalFallback(reason),
    };

    let mut mean = RouteStatsTable::filled(
        &destinations,
        &origins,
        fallback(baseline.mean, FallbackReason::NoFlights),
    );
    let mut std_dev = RouteStatsTable::filled(
        &destinations,
        &origins,
        fallback(baseline.std_dev, FallbackReason::NoFlights),
    );

    let significance_level = config.significance_level();
    let groups = group_route_samples(flights, &destinations, &origins, metric);

    for ((destination, origin), samples) in &groups {
        let decision = decide_route(samples, baseline.mean, significance_level)?;

        let (mean_cell, std_cell) = match decision {
            RouteDecision::Local { summary, p_value } => {
                tracing::debug!(
                    "{} -> {}: local estimate (n={}, p={:.4})",
                    origin,
                    destination,
                    summary.count,
                    p_value
                );
                let local = |value| RouteStat {
                    value,
                    sample_size: summary.count,
                    provenance: Provenance::LocalEstimate { p_value },
                };
                (local(summary.mean), local(summary.std_dev))
            }
            RouteDecision::Fallback(reason) => {
                tracing::debug!("{} -> {}: global fallback ({:?})", origin, destination, reason);
                (
                    fallback(baseline.mean, reason),
                    fallback(baseline.std_dev, reason),
                )
            }
        };

        mean.set(destination, origin, mean_cell);
        std_dev.set(destination, origin, std_cell);
    }

    tracing::info!(
        "{} route statistics: {} of {} cells use local estimates ({} routes with flights)",
        metric.column_name(),
        mean.local_count(),
        mean.len(),
        groups.len()
    );

    Ok(RouteDelays {
        mean,
        std_dev,
        baseline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flights::FlightRecord;

    fn arrivals(origin: &str, dest: &str, delays: &[f64]) -> Vec<FlightRecord> {
        delays
            .iter()
            .map(|d| FlightRecord::new(origin, dest, Some(0.0), Some(*d)))
            .collect()
    }

    #[test]
    fn test_decide_route_insufficient_samples() {
        let decision = decide_route(&[5.0], 0.0, 0.05).unwrap();
        assert_eq!(
            decision,
            RouteDecision::Fallback(FallbackReason::InsufficientSamples)
        );

        let decision = decide_route(&[], 0.0, 0.05).unwrap();
        assert_eq!(
            decision,
            RouteDecision::Fallback(FallbackReason::InsufficientSamples)
        );
    }

    #[test]
    fn test_decide_route_zero_variance() {
        let decision = decide_route(&[90.0, 90.0, 90.0], 0.0, 0.05).unwrap();
        assert_eq!(decision, RouteDecision::Fallback(FallbackReason::ZeroVariance));
    }

    #[test]
    fn test_decide_route_tie_keeps_baseline() {
        // p-value for this sample is ~0.2302; a threshold equal to the
        // p-value itself must not select the local estimate
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0];
        let p = ttest_1samp(&samples, 2.0).unwrap().pvalue;

        let decision = decide_route(&samples, 2.0, p).unwrap();
        assert_eq!(
            decision,
            RouteDecision::Fallback(FallbackReason::NotSignificant)
        );

        let decision = decide_route(&samples, 2.0, p + 1e-9).unwrap();
        assert!(matches!(decision, RouteDecision::Local { .. }));
    }

    #[test]
    fn test_group_route_samples_filters_and_keeps_empty_groups() {
        let mut records = arrivals("JFK", "LAX", &[1.0, 2.0]);
        records.push(FlightRecord::new("JFK", "SFO", Some(1.0), None));
        records.push(FlightRecord::new("ORD", "LAX", Some(1.0), Some(3.0)));
        let flights = FlightTable::new(records);

        let groups = group_route_samples(
            &flights,
            &["LAX".to_string(), "SFO".to_string()],
            &["JFK".to_string()],
            DelayMetric::ArrivalDelay,
        );

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&("LAX".to_string(), "JFK".to_string())], vec![1.0, 2.0]);
        assert!(groups[&("SFO".to_string(), "JFK".to_string())].is_empty());
    }

    #[test]
    fn test_empty_baseline_rejected() {
        let flights = FlightTable::new(vec![FlightRecord::new("JFK", "LAX", Some(1.0), None)]);
        let err = Baseline::compute(&flights, DelayMetric::ArrivalDelay).unwrap_err();
        assert_eq!(err, EstimatorError::EmptyBaseline { metric: "ARR_DELAY" });
    }

    #[test]
    fn test_single_observation_fills_global_mean_and_nan_std() {
        let flights = FlightTable::new(vec![FlightRecord::new("JFK", "LAX", Some(1.0), Some(4.0))]);
        let delays = get_delays(
            &flights,
            &["LAX", "SFO"],
            &["JFK"],
            &EstimatorConfig::default(),
            DelayMetric::ArrivalDelay,
        )
        .unwrap();

        assert_eq!(delays.baseline.count, 1);
        assert_eq!(delays.baseline.mean, 4.0);
        assert!(delays.baseline.std_dev.is_nan());

        for (_, _, cell) in delays.mean.iter() {
            assert_eq!(cell.value, 4.0);
            assert!(!cell.is_local());
        }
        for (_, _, cell) in delays.std_dev.iter() {
            assert!(cell.value.is_nan());
        }
        assert_eq!(
            delays.mean.get("LAX", "JFK").unwrap().provenance,
            Provenance::GlobalFallback(FallbackReason::InsufficientSamples)
        );
        assert_eq!(
            delays.mean.get("SFO", "JFK").unwrap().provenance,
            Provenance::GlobalFallback(FallbackReason::NoFlights)
        );
    }

    #[test]
    fn test_invalid_confidence_rejected() {
        let flights = FlightTable::new(arrivals("JFK", "LAX", &[4.0, 5.0]));
        let result = get_delays(
            &flights,
            &["LAX"],
            &["JFK"],
            &EstimatorConfig::new(120.0),
            DelayMetric::ArrivalDelay,
        );
        assert!(matches!(result, Err(EstimatorError::InvalidConfig(_))));
    }
}
