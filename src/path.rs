//! Delay propagation along multi-leg itineraries
//!
//! A path `[A, B, C]` is flown leg by leg. The first leg contributes its full
//! arrival delay; every later leg adds the ground delay accrued at the
//! connecting airport plus the delay gained or recovered in the air on that
//! leg. Both the deterministic expectation and the Monte Carlo simulation
//! follow this decomposition.
//!
//! All route lookups use `(destination, origin)` keys, so the leg
//! `path[i] -> path[i + 1]` is read from `table.get(path[i + 1], path[i])`.

use crate::route_table::RouteStatsTable;
use crate::sampler::{AirportGenerators, DelayGenerator, GeneratorTable};
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Errors raised while composing path delays
///
/// Every variant is a caller contract violation: the supplied tables must
/// cover every leg and connecting airport of the path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("Path needs at least 2 airports, got {0}")]
    TooShort(usize),

    #[error("Missing route statistic for {origin} -> {destination} in {table}")]
    MissingRouteStatistic {
        table: &'static str,
        destination: String,
        origin: String,
    },

    #[error("Missing ground delay statistic for airport {0}")]
    MissingAirportStatistic(String),

    #[error("Missing delay generator for {origin} -> {destination} in {table}")]
    MissingRouteGenerator {
        table: &'static str,
        destination: String,
        origin: String,
    },

    #[error("Missing ground delay generator for airport {0}")]
    MissingAirportGenerator(String),

    #[error("Generator for {generator} returned {found} values, expected {expected}")]
    GeneratorLengthMismatch {
        generator: String,
        expected: usize,
        found: usize,
    },

    #[error("Initial state has {found} values, expected {expected}")]
    InitialStateLengthMismatch { expected: usize, found: usize },
}

/// Ordered itinerary of at least two airports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path {
    airports: Vec<String>,
}

impl Path {
    pub fn new<S: Into<String>>(airports: impl IntoIterator<Item = S>) -> Result<Self, PathError> {
        let airports: Vec<String> = airports.into_iter().map(Into::into).collect();
        if airports.len() < 2 {
            return Err(PathError::TooShort(airports.len()));
        }
        Ok(Self { airports })
    }

    /// Parse `"JFK-ORD-LAX"` style itineraries
    pub fn parse(spec: &str) -> Result<Self, PathError> {
        Self::new(
            spec.split(['-', ',', '>'])
                .map(str::trim)
                .filter(|code| !code.is_empty()),
        )
    }

    pub fn airports(&self) -> &[String] {
        &self.airports
    }

    /// `(origin, destination)` pairs in flying order
    pub fn legs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.airports
            .windows(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
    }

    pub fn leg_count(&self) -> usize {
        self.airports.len() - 1
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.airports.join(" -> "))
    }
}

fn route_value(
    table: &RouteStatsTable,
    table_name: &'static str,
    origin: &str,
    destination: &str,
) -> Result<f64, PathError> {
    table
        .value(destination, origin)
        .ok_or_else(|| PathError::MissingRouteStatistic {
            table: table_name,
            destination: destination.to_string(),
            origin: origin.to_string(),
        })
}

/// Expected total delay at the end of `path`
///
/// - first leg: mean arrival delay of `path[0] -> path[1]`
/// - each later leg `i`: mean ground delay at `path[i]` plus mean in-flight
///   delay of `path[i] -> path[i + 1]`
///
/// # Example
/// ```
/// use delayscope::path::{calculate_expected_delay, Path};
/// use delayscope::route_table::{FallbackReason, Provenance, RouteStat, RouteStatsTable};
/// use std::collections::HashMap;
///
/// let cell = |value| RouteStat {
///     value,
///     sample_size: 10,
///     provenance: Provenance::GlobalFallback(FallbackReason::NoFlights),
/// };
/// let arrival = RouteStatsTable::filled(&["B"], &["A"], cell(12.5));
/// let in_flight = RouteStatsTable::filled(&["B"], &["A"], cell(0.0));
///
/// let path = Path::new(["A", "B"]).unwrap();
/// let delay = calculate_expected_delay(&path, &HashMap::new(), &arrival, &in_flight).unwrap();
/// assert_eq!(delay, 12.5);
/// ```
pub fn calculate_expected_delay(
    path: &Path,
    airport_mean_delay: &HashMap<String, f64>,
    mean_arrival: &RouteStatsTable,
    mean_in_flight: &RouteStatsTable,
) -> Result<f64, PathError> {
    let mut expected_delay = 0.0;

    for (i, (origin, destination)) in path.legs().enumerate() {
        if i == 0 {
            expected_delay += route_value(mean_arrival, "mean arrival table", origin, destination)?;
        } else {
            expected_delay += airport_mean_delay
                .get(origin)
                .copied()
                .ok_or_else(|| PathError::MissingAirportStatistic(origin.to_string()))?;
            expected_delay +=
                route_value(mean_in_flight, "mean in-flight table", origin, destination)?;
        }
    }

    tracing::debug!("Expected delay for {}: {:.3}", path, expected_delay);
    Ok(expected_delay)
}

/// Starting point of a stochastic path simulation
#[derive(Debug, Clone, PartialEq)]
pub enum InitialState {
    /// Samples from a previous simulation, used verbatim
    Samples(Vec<f64>),
    /// Known delay already accrued, the same for every sample
    Constant(f64),
}

fn draw(
    generator: &dyn DelayGenerator,
    rng: &mut dyn RngCore,
    sample_size: usize,
    describe: impl FnOnce() -> String,
) -> Result<Vec<f64>, PathError> {
    let values = generator.generate(rng, sample_size);
    if values.len() != sample_size {
        return Err(PathError::GeneratorLengthMismatch {
            generator: describe(),
            expected: sample_size,
            found: values.len(),
        });
    }
    Ok(values)
}

fn route_generator<'a>(
    table: &'a GeneratorTable,
    table_name: &'static str,
    origin: &str,
    destination: &str,
) -> Result<&'a dyn DelayGenerator, PathError> {
    table
        .get(destination, origin)
        .ok_or_else(|| PathError::MissingRouteGenerator {
            table: table_name,
            destination: destination.to_string(),
            origin: origin.to_string(),
        })
}

fn accumulate(total: &mut [f64], increment: &[f64]) {
    for (acc, value) in total.iter_mut().zip(increment) {
        *acc += value;
    }
}

/// Monte Carlo sample of the total delay at the end of `path`
///
/// - first leg: `initial_state` when given, otherwise a draw from
///   `first_leg[path[1], path[0]]`
/// - each later leg `i`: elementwise sum of a draw from `ground[path[i]]` and
///   a draw from `in_flight[path[i + 1], path[i]]`
///
/// Every generator must return exactly `sample_size` values; the result is
/// the elementwise sum, with no resampling.
pub fn distribution_delay(
    rng: &mut dyn RngCore,
    path: &Path,
    first_leg: &GeneratorTable,
    in_flight: &GeneratorTable,
    ground: &AirportGenerators,
    sample_size: usize,
    mut initial_state: Option<InitialState>,
) -> Result<Vec<f64>, PathError> {
    let mut delay: Vec<f64> = Vec::new();

    for (i, (origin, destination)) in path.legs().enumerate() {
        if i == 0 {
            delay = match initial_state.take() {
                Some(InitialState::Samples(samples)) => {
                    if samples.len() != sample_size {
                        return Err(PathError::InitialStateLengthMismatch {
                            expected: sample_size,
                            found: samples.len(),
                        });
                    }
                    samples
                }
                Some(InitialState::Constant(value)) => vec![value; sample_size],
                None => {
                    let generator =
                        route_generator(first_leg, "first-leg generators", origin, destination)?;
                    draw(generator, rng, sample_size, || {
                        format!("first leg {} -> {}", origin, destination)
                    })?
                }
            };
        } else {
            let ground_generator = ground
                .get(origin)
                .ok_or_else(|| PathError::MissingAirportGenerator(origin.to_string()))?;
            let ground_delay = draw(ground_generator.as_ref(), rng, sample_size, || {
                format!("ground delay at {}", origin)
            })?;
            accumulate(&mut delay, &ground_delay);

            let leg_generator =
                route_generator(in_flight, "in-flight generators", origin, destination)?;
            let leg_delay = draw(leg_generator, rng, sample_size, || {
                format!("in-flight {} -> {}", origin, destination)
            })?;
            accumulate(&mut delay, &leg_delay);
        }
    }

    tracing::debug!(
        "Simulated {} samples over {} legs of {}",
        sample_size,
        path.leg_count(),
        path
    );
    Ok(delay)
}

/// Summary of a simulated delay distribution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelaySummary {
    pub samples: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub p05: f64,
    pub median: f64,
    pub p95: f64,
}

/// Mean, sample std and 5/50/95 percentiles (nearest-rank) of `samples`
///
/// NaN samples are ignored; `None` when nothing is left.
pub fn summarize(samples: &[f64]) -> Option<DelaySummary> {
    use statrs::statistics::Statistics;

    let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let percentile = |p: f64| {
        let rank = (p * (sorted.len() - 1) as f64).round() as usize;
        sorted[rank]
    };

    Some(DelaySummary {
        samples: sorted.len(),
        mean: sorted.iter().mean(),
        std_dev: if sorted.len() > 1 {
            sorted.iter().std_dev()
        } else {
            0.0
        },
        p05: percentile(0.05),
        median: percentile(0.5),
        p95: percentile(0.95),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_table::{FallbackReason, Provenance, RouteStat};
    use crate::sampler::ConstantGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn cell(value: f64) -> RouteStat {
        RouteStat {
            value,
            sample_size: 10,
            provenance: Provenance::GlobalFallback(FallbackReason::NoFlights),
        }
    }

    fn table_with(entries: &[(&str, &str, f64)]) -> RouteStatsTable {
        let airports = ["A", "B", "C", "D"];
        let mut table = RouteStatsTable::filled(&airports, &airports, cell(0.0));
        for (destination, origin, value) in entries {
            table.set(destination, origin, cell(*value));
        }
        table
    }

    #[test]
    fn test_path_requires_two_airports() {
        assert_eq!(Path::new(["A"]).unwrap_err(), PathError::TooShort(1));
        assert_eq!(
            Path::new(Vec::<String>::new()).unwrap_err(),
            PathError::TooShort(0)
        );
        assert_eq!(Path::new(["A", "B"]).unwrap().leg_count(), 1);
    }

    #[test]
    fn test_path_parse() {
        let path = Path::parse("JFK-ORD - LAX").unwrap();
        assert_eq!(path.airports(), &["JFK", "ORD", "LAX"]);
        assert_eq!(path.to_string(), "JFK -> ORD -> LAX");
        assert!(Path::parse("JFK").is_err());
    }

    #[test]
    fn test_expected_delay_two_nodes() {
        let arrival = table_with(&[("B", "A", 12.5)]);
        let in_flight = table_with(&[]);
        let path = Path::new(["A", "B"]).unwrap();

        let delay = calculate_expected_delay(&path, &HashMap::new(), &arrival, &in_flight).unwrap();
        assert_eq!(delay, 12.5);
    }

    #[test]
    fn test_expected_delay_three_nodes() {
        let arrival = table_with(&[("B", "A", 10.0), ("C", "B", 99.0)]);
        let in_flight = table_with(&[("C", "B", 7.0), ("B", "A", 99.0)]);
        let ground = HashMap::from([("B".to_string(), 3.0), ("A".to_string(), 99.0)]);
        let path = Path::new(["A", "B", "C"]).unwrap();

        let delay = calculate_expected_delay(&path, &ground, &arrival, &in_flight).unwrap();
        assert_eq!(delay, 20.0);
    }

    #[test]
    fn test_expected_delay_uses_destination_then_origin() {
        // Transposed entry must not be picked up
        let arrival = table_with(&[("A", "B", 50.0)]);
        let in_flight = table_with(&[]);
        let path = Path::new(["A", "B"]).unwrap();

        let delay = calculate_expected_delay(&path, &HashMap::new(), &arrival, &in_flight).unwrap();
        assert_eq!(delay, 0.0);
    }

    #[test]
    fn test_expected_delay_missing_route() {
        let arrival = RouteStatsTable::filled(&["B"], &["A"], cell(1.0));
        let in_flight = RouteStatsTable::filled(&["B"], &["A"], cell(1.0));
        let ground = HashMap::from([("B".to_string(), 3.0)]);
        let path = Path::new(["A", "B", "Z"]).unwrap();

        let err = calculate_expected_delay(&path, &ground, &arrival, &in_flight).unwrap_err();
        assert_eq!(
            err,
            PathError::MissingRouteStatistic {
                table: "mean in-flight table",
                destination: "Z".to_string(),
                origin: "B".to_string(),
            }
        );
    }

    #[test]
    fn test_expected_delay_missing_airport() {
        let arrival = table_with(&[]);
        let in_flight = table_with(&[]);
        let path = Path::new(["A", "B", "C"]).unwrap();

        let err = calculate_expected_delay(&path, &HashMap::new(), &arrival, &in_flight)
            .unwrap_err();
        assert_eq!(err, PathError::MissingAirportStatistic("B".to_string()));
    }

    fn constant_tables() -> (GeneratorTable, GeneratorTable, AirportGenerators) {
        let mut first_leg = GeneratorTable::new();
        first_leg.insert("B", "A", Box::new(ConstantGenerator(10.0)));

        let mut in_flight = GeneratorTable::new();
        in_flight.insert("C", "B", Box::new(ConstantGenerator(7.0)));
        in_flight.insert("D", "C", Box::new(ConstantGenerator(-2.0)));

        let mut ground: AirportGenerators = HashMap::new();
        ground.insert("B".to_string(), Box::new(ConstantGenerator(3.0)));
        ground.insert("C".to_string(), Box::new(ConstantGenerator(1.0)));

        (first_leg, in_flight, ground)
    }

    #[test]
    fn test_distribution_delay_sums_legs() {
        let (first_leg, in_flight, ground) = constant_tables();
        let mut rng = StdRng::seed_from_u64(0);
        let path = Path::new(["A", "B", "C", "D"]).unwrap();

        let samples =
            distribution_delay(&mut rng, &path, &first_leg, &in_flight, &ground, 1000, None)
                .unwrap();

        assert_eq!(samples.len(), 1000);
        // 10 + (3 + 7) + (1 - 2)
        assert!(samples.iter().all(|&v| v == 19.0));
    }

    #[test]
    fn test_distribution_delay_initial_state() {
        let (first_leg, in_flight, ground) = constant_tables();
        let mut rng = StdRng::seed_from_u64(0);
        let path = Path::new(["A", "B", "C"]).unwrap();

        let samples = distribution_delay(
            &mut rng,
            &path,
            &GeneratorTable::new(),
            &in_flight,
            &ground,
            3,
            Some(InitialState::Samples(vec![0.0, 1.0, 2.0])),
        )
        .unwrap();
        assert_eq!(samples, vec![10.0, 11.0, 12.0]);

        let samples = distribution_delay(
            &mut rng,
            &path,
            &first_leg,
            &in_flight,
            &ground,
            2,
            Some(InitialState::Constant(5.0)),
        )
        .unwrap();
        assert_eq!(samples, vec![15.0, 15.0]);
    }

    #[test]
    fn test_distribution_delay_initial_state_length_checked() {
        let (first_leg, in_flight, ground) = constant_tables();
        let mut rng = StdRng::seed_from_u64(0);
        let path = Path::new(["A", "B"]).unwrap();

        let err = distribution_delay(
            &mut rng,
            &path,
            &first_leg,
            &in_flight,
            &ground,
            4,
            Some(InitialState::Samples(vec![1.0])),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PathError::InitialStateLengthMismatch {
                expected: 4,
                found: 1
            }
        );
    }

    #[test]
    fn test_distribution_delay_rejects_short_generator() {
        let (first_leg, in_flight, mut ground) = constant_tables();
        ground.insert(
            "B".to_string(),
            Box::new(|_rng: &mut dyn RngCore, _size: usize| vec![1.0]),
        );
        let mut rng = StdRng::seed_from_u64(0);
        let path = Path::new(["A", "B", "C"]).unwrap();

        let err = distribution_delay(&mut rng, &path, &first_leg, &in_flight, &ground, 5, None)
            .unwrap_err();
        assert!(matches!(
            err,
            PathError::GeneratorLengthMismatch {
                expected: 5,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_distribution_delay_missing_generators() {
        let (first_leg, in_flight, ground) = constant_tables();
        let mut rng = StdRng::seed_from_u64(0);

        let path = Path::new(["B", "A"]).unwrap();
        let err = distribution_delay(&mut rng, &path, &first_leg, &in_flight, &ground, 5, None)
            .unwrap_err();
        assert!(matches!(err, PathError::MissingRouteGenerator { .. }));

        let path = Path::new(["A", "B", "C", "D", "A"]).unwrap();
        let err = distribution_delay(&mut rng, &path, &first_leg, &in_flight, &ground, 5, None)
            .unwrap_err();
        assert_eq!(err, PathError::MissingAirportGenerator("D".to_string()));
    }

    #[test]
    fn test_summarize() {
        let samples: Vec<f64> = (0..=100).map(f64::from).collect();
        let summary = summarize(&samples).unwrap();
        assert_eq!(summary.samples, 101);
        assert_eq!(summary.mean, 50.0);
        assert_eq!(summary.median, 50.0);
        assert_eq!(summary.p05, 5.0);
        assert_eq!(summary.p95, 95.0);

        assert!(summarize(&[]).is_none());
        assert!(summarize(&[f64::NAN]).is_none());
    }
}
