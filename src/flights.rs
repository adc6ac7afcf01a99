//! Flight records and the in-memory flight table
//!
//! The flight table is the only dataset the estimators read. It is loaded once
//! (usually from a CSV export with `ORIGIN`, `DEST`, `ARR_DELAY` and `DEP_DELAY`
//! columns) and then treated as an immutable snapshot for the whole analysis run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading flight records
#[derive(Error, Debug)]
pub enum FlightDataError {
    #[error("Failed to read flight records: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One observed flight leg
///
/// Delays are in minutes. Cancelled or diverted flights usually carry no
/// delay values, so both fields are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    #[serde(rename = "ORIGIN")]
    pub origin: String,

    #[serde(rename = "DEST")]
    pub destination: String,

    #[serde(rename = "DEP_DELAY", default)]
    pub departure_delay: Option<f64>,

    #[serde(rename = "ARR_DELAY", default)]
    pub arrival_delay: Option<f64>,
}

impl FlightRecord {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure_delay: Option<f64>,
        arrival_delay: Option<f64>,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            departure_delay,
            arrival_delay,
        }
    }
}

/// Which delay quantity an estimator summarizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DelayMetric {
    /// `ARR_DELAY`
    ArrivalDelay,
    /// `DEP_DELAY`
    DepartureDelay,
    /// `ARR_DELAY - DEP_DELAY`: delay gained or recovered in the air
    DelayDifferential,
}

impl DelayMetric {
    /// Extract the metric from a record, `None` when any input is missing or NaN
    pub fn value(&self, record: &FlightRecord) -> Option<f64> {
        let value = match self {
            DelayMetric::ArrivalDelay => record.arrival_delay?,
            DelayMetric::DepartureDelay => record.departure_delay?,
            DelayMetric::DelayDifferential => record.arrival_delay? - record.departure_delay?,
        };
        (!value.is_nan()).then_some(value)
    }

    /// Column name used in flight CSV exports
    pub fn column_name(&self) -> &'static str {
        match self {
            DelayMetric::ArrivalDelay => "ARR_DELAY",
            DelayMetric::DepartureDelay => "DEP_DELAY",
            DelayMetric::DelayDifferential => "DELAY_DIFF",
        }
    }
}

/// Which side of a flight an airport is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirportRole {
    Origin,
    Destination,
}

/// Immutable table of flight records
#[derive(Debug, Clone, Default)]
pub struct FlightTable {
    records: Vec<FlightRecord>,
}

impl FlightTable {
    pub fn new(records: Vec<FlightRecord>) -> Self {
        Self { records }
    }

    /// Load records from any CSV source with a header row
    ///
    /// Extra columns are ignored and empty delay cells become missing values.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, FlightDataError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let records = reader
            .deserialize::<FlightRecord>()
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded {} flight records", records.len());
        Ok(Self { records })
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, FlightDataError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn records(&self) -> &[FlightRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All non-missing values of `metric` across the whole table
    pub fn metric_values(&self, metric: DelayMetric) -> Vec<f64> {
        self.records.iter().filter_map(|r| metric.value(r)).collect()
    }

    /// Sorted distinct airport codes appearing as origin or destination
    pub fn airports(&self) -> Vec<String> {
        self.records
            .iter()
            .flat_map(|r| [r.origin.as_str(), r.destination.as_str()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Mean of `metric` per airport, grouping flights by `role`
    ///
    /// Typical use is the mean departure delay per origin, which serves as the
    /// expected ground delay accrued at an intermediate airport of a path.
    /// Airports without any valid observation are omitted.
    pub fn mean_delay_by_airport(
        &self,
        metric: DelayMetric,
        role: AirportRole,
    ) -> HashMap<String, f64> {
        let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();

        for record in &self.records {
            let Some(value) = metric.value(record) else {
                continue;
            };
            let airport = match role {
                AirportRole::Origin => record.origin.as_str(),
                AirportRole::Destination => record.destination.as_str(),
            };
            let entry = sums.entry(airport).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }

        sums.into_iter()
            .map(|(airport, (sum, count))| (airport.to_string(), sum / count as f64))
            .collect()
    }
}
