//! Student's t delay sampling
//!
//! A route or airport summarized by a mean, a standard deviation and a sample
//! size is turned into a random delay generator. Draws come from a Student's t
//! distribution located at the mean with the standard error of the mean as
//! scale and `n - 1` degrees of freedom, which widens the spread for routes
//! backed by only a few flights.
//!
//! Randomness is always passed in explicitly, so seeding the caller's RNG
//! makes every simulation reproducible.

use crate::estimator::SampleSummary;
use crate::flights::{DelayMetric, FlightTable};
use crate::route_table::RouteStatsTable;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, StudentT};
use std::collections::HashMap;

/// Draw `size` delays around `mean` with Student's t sampling noise
///
/// Returns `None` when `sample_count <= 1`: the standard error of a mean
/// backed by a single observation is undefined, and callers are expected to
/// substitute a fallback.
///
/// # Example
/// ```
/// use delayscope::sampler::sample_from_t;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(7);
/// assert_eq!(sample_from_t(&mut rng, 10.0, 2.0, 25, 4).map(|s| s.len()), Some(4));
/// assert!(sample_from_t(&mut rng, 10.0, 2.0, 1, 4).is_none());
/// ```
pub fn sample_from_t<R: Rng + ?Sized>(
    rng: &mut R,
    mean: f64,
    std_dev: f64,
    sample_count: usize,
    size: usize,
) -> Option<Vec<f64>> {
    StudentTGenerator::new(mean, std_dev, sample_count).map(|g| g.sample(rng, size))
}

/// Produces `size` random delay values per call
///
/// Implemented for [`StudentTGenerator`], [`ConstantGenerator`] and any
/// closure `Fn(&mut dyn RngCore, usize) -> Vec<f64>`.
pub trait DelayGenerator {
    fn generate(&self, rng: &mut dyn RngCore, size: usize) -> Vec<f64>;
}

impl<F> DelayGenerator for F
where
    F: Fn(&mut dyn RngCore, usize) -> Vec<f64>,
{
    fn generate(&self, rng: &mut dyn RngCore, size: usize) -> Vec<f64> {
        self(rng, size)
    }
}

/// Student's t generator bound to a mean, std and sample size
#[derive(Debug, Clone)]
pub struct StudentTGenerator {
    mean: f64,
    scale: f64,
    degrees_of_freedom: f64,
    dist: StudentT<f64>,
}

impl StudentTGenerator {
    /// `None` when `sample_count <= 1`
    pub fn new(mean: f64, std_dev: f64, sample_count: usize) -> Option<Self> {
        if sample_count <= 1 {
            return None;
        }
        let n = sample_count as f64;
        let degrees_of_freedom = n - 1.0;
        let dist = StudentT::new(degrees_of_freedom).ok()?;

        Some(Self {
            mean,
            scale: std_dev / n.sqrt(),
            degrees_of_freedom,
            dist,
        })
    }

    pub fn degrees_of_freedom(&self) -> f64 {
        self.degrees_of_freedom
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R, size: usize) -> Vec<f64> {
        (0..size)
            .map(|_| self.mean + self.scale * self.dist.sample(rng))
            .collect()
    }
}

impl DelayGenerator for StudentTGenerator {
    fn generate(&self, rng: &mut dyn RngCore, size: usize) -> Vec<f64> {
        self.sample(rng, size)
    }
}

/// Always emits the same delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantGenerator(pub f64);

impl DelayGenerator for ConstantGenerator {
    fn generate(&self, _rng: &mut dyn RngCore, size: usize) -> Vec<f64> {
        vec![self.0; size]
    }
}

/// Student's t generator, or a constant at `mean` when the sample is too small
fn generator_or_constant(mean: f64, std_dev: f64, sample_count: usize) -> Box<dyn DelayGenerator> {
    match StudentTGenerator::new(mean, std_dev, sample_count) {
        Some(generator) => Box::new(generator),
        None => Box::new(ConstantGenerator(mean)),
    }
}

/// Per-airport delay generators, keyed by airport code
pub type AirportGenerators = HashMap<String, Box<dyn DelayGenerator>>;

/// Per-route delay generators keyed like a [`RouteStatsTable`]
///
/// The leg `A -> B` is stored under `(destination = B, origin = A)`.
#[derive(Default)]
pub struct GeneratorTable {
    routes: HashMap<String, HashMap<String, Box<dyn DelayGenerator>>>,
}

impl GeneratorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        destination: impl Into<String>,
        origin: impl Into<String>,
        generator: Box<dyn DelayGenerator>,
    ) {
        self.routes
            .entry(destination.into())
            .or_default()
            .insert(origin.into(), generator);
    }

    /// Generator for the leg `origin -> destination`
    pub fn get(&self, destination: &str, origin: &str) -> Option<&dyn DelayGenerator> {
        self.routes
            .get(destination)?
            .get(origin)
            .map(|generator| generator.as_ref())
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One generator per cell of matching mean/std tables
    ///
    /// The sample size recorded in each mean cell drives the degrees of
    /// freedom. Cells backed by a single observation emit their mean as a
    /// constant; cells missing from `std_dev` are skipped.
    pub fn from_route_stats(mean: &RouteStatsTable, std_dev: &RouteStatsTable) -> Self {
        let mut table = Self::new();
        for (destination, origin, cell) in mean.iter() {
            let Some(std_value) = std_dev.value(destination, origin) else {
                tracing::warn!("No std for {} -> {}, skipping generator", origin, destination);
                continue;
            };
            table.insert(
                destination,
                origin,
                generator_or_constant(cell.value, std_value, cell.sample_size),
            );
        }
        table
    }
}

/// Ground delay generators per origin airport
///
/// Groups flights by origin and fits one generator per airport from the
/// airport's own mean, std and count of `metric`.
pub fn ground_delay_generators(flights: &FlightTable, metric: DelayMetric) -> AirportGenerators {
    let mut samples: HashMap<&str, Vec<f64>> = HashMap::new();
    for record in flights.records() {
        if let Some(value) = metric.value(record) {
            samples.entry(record.origin.as_str()).or_default().push(value);
        }
    }

    samples
        .into_iter()
        .map(|(airport, values)| {
            let summary = SampleSummary::from_values(&values);
            (
                airport.to_string(),
                generator_or_constant(summary.mean, summary.std_dev, summary.count),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_table::{FallbackReason, Provenance, RouteStat};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_single_observation_returns_sentinel() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_from_t(&mut rng, 10.0, 2.0, 1, 5).is_none());
        assert!(sample_from_t(&mut rng, 10.0, 2.0, 0, 5).is_none());
    }

    #[test]
    fn test_parameters() {
        let generator = StudentTGenerator::new(10.0, 2.0, 16).unwrap();
        assert_eq!(generator.degrees_of_freedom(), 15.0);
        assert_eq!(generator.scale(), 0.5);
    }

    #[test]
    fn test_samples_centered_on_mean() {
        let mut rng = StdRng::seed_from_u64(42);
        let samples = sample_from_t(&mut rng, 10.0, 2.0, 100, 20_000).unwrap();
        assert_eq!(samples.len(), 20_000);

        // scale = 0.2, so the sample mean should sit very close to 10
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((mean - 10.0).abs() < 0.05, "mean = {}", mean);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let a = sample_from_t(&mut StdRng::seed_from_u64(9), 5.0, 3.0, 4, 10).unwrap();
        let b = sample_from_t(&mut StdRng::seed_from_u64(9), 5.0, 3.0, 4, 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_std_collapses_to_mean() {
        let mut rng = StdRng::seed_from_u64(3);
        let samples = sample_from_t(&mut rng, 7.0, 0.0, 10, 5).unwrap();
        assert!(samples.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_closure_generator() {
        let generator = |_rng: &mut dyn RngCore, size: usize| vec![1.5; size];
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(generator.generate(&mut rng, 3), vec![1.5, 1.5, 1.5]);
    }

    #[test]
    fn test_generator_table_from_route_stats() {
        let cell = |value, sample_size| RouteStat {
            value,
            sample_size,
            provenance: Provenance::GlobalFallback(FallbackReason::NoFlights),
        };
        let mut mean = RouteStatsTable::filled(&["LAX"], &["JFK", "SFO"], cell(12.0, 30));
        mean.set("LAX", "SFO", cell(4.0, 1));
        let std_dev = RouteStatsTable::filled(&["LAX"], &["JFK", "SFO"], cell(3.0, 30));

        let table = GeneratorTable::from_route_stats(&mean, &std_dev);
        assert_eq!(table.len(), 2);
        assert!(table.get("JFK", "LAX").is_none());

        let mut rng = StdRng::seed_from_u64(5);
        // Single observation: constant at the mean
        let sfo = table.get("LAX", "SFO").unwrap().generate(&mut rng, 4);
        assert_eq!(sfo, vec![4.0; 4]);

        let jfk = table.get("LAX", "JFK").unwrap().generate(&mut rng, 4);
        assert_eq!(jfk.len(), 4);
    }

    #[test]
    fn test_ground_delay_generators() {
        let flights = FlightTable::new(vec![
            crate::flights::FlightRecord::new("JFK", "LAX", Some(10.0), None),
            crate::flights::FlightRecord::new("JFK", "SFO", Some(20.0), None),
            crate::flights::FlightRecord::new("ORD", "SFO", Some(8.0), None),
        ]);
        let generators = ground_delay_generators(&flights, DelayMetric::DepartureDelay);

        assert_eq!(generators.len(), 2);
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(generators["ORD"].generate(&mut rng, 2), vec![8.0, 8.0]);
        assert_eq!(generators["JFK"].generate(&mut rng, 6).len(), 6);
    }
}
