#![no_main]

use delayscope::estimator::{get_delays, EstimatorConfig};
use delayscope::flights::{DelayMetric, FlightTable};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed CSV must surface as an error, never a panic
    let Ok(flights) = FlightTable::from_csv_reader(data) else {
        return;
    };

    let airports = flights.airports();
    let config = EstimatorConfig::default();
    if let Ok(delays) = get_delays(
        &flights,
        &airports,
        &airports,
        &config,
        DelayMetric::ArrivalDelay,
    ) {
        assert_eq!(delays.mean.len(), airports.len() * airports.len());
    }
});
