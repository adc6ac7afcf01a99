//! Per-route statistics tables
//!
//! A `RouteStatsTable` is a dense destination × origin matrix of statistics
//! with a lookup from airport code to row/column index. Rows are destinations,
//! columns are origins, so the leg `A -> B` lives at `get("B", "A")`.
//!
//! Every cell carries the provenance of its value: either a local estimate that
//! differed significantly from the global baseline, or the global baseline
//! itself together with the reason the local sample was not used.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Why a cell holds the global statistic instead of a local estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FallbackReason {
    /// No flights at all for this (destination, origin) pair
    NoFlights,
    /// Fewer than two non-missing observations
    InsufficientSamples,
    /// All observations identical (zero sample variance)
    ZeroVariance,
    /// p-value not strictly below the significance level
    NotSignificant,
}

/// Where a cell's value came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Provenance {
    /// Route sample differed significantly from the baseline
    LocalEstimate { p_value: f64 },
    /// Global baseline used for this route
    GlobalFallback(FallbackReason),
}

/// One cell of a route statistics table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteStat {
    pub value: f64,

    /// Observations backing `value`: the route's own count for a local
    /// estimate, the baseline's count for a fallback
    pub sample_size: usize,

    pub provenance: Provenance,
}

impl RouteStat {
    pub fn is_local(&self) -> bool {
        matches!(self.provenance, Provenance::LocalEstimate { .. })
    }
}

/// Deduplicate airport codes while keeping first-seen order
pub(crate) fn unique_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .iter()
        .map(AsRef::as_ref)
        .filter(|label| seen.insert(*label))
        .map(str::to_string)
        .collect()
}

fn index_of(labels: &[String]) -> HashMap<String, usize> {
    labels
        .iter()
        .enumerate()
        .map(|(idx, label)| (label.clone(), idx))
        .collect()
}

/// Destination × origin table of route statistics
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStatsTable {
    destinations: Vec<String>,
    origins: Vec<String>,
    destination_index: HashMap<String, usize>,
    origin_index: HashMap<String, usize>,
    cells: Vec<RouteStat>,
}

impl RouteStatsTable {
    /// Create a table where every cell holds `fill`
    ///
    /// Duplicate labels are collapsed, so the table is total over the
    /// requested cross-product with exactly one cell per pair.
    pub fn filled<S: AsRef<str>>(destinations: &[S], origins: &[S], fill: RouteStat) -> Self {
        let destinations = unique_labels(destinations);
        let origins = unique_labels(origins);
        let cells = vec![fill; destinations.len() * origins.len()];

        Self {
            destination_index: index_of(&destinations),
            origin_index: index_of(&origins),
            destinations,
            origins,
            cells,
        }
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    fn offset(&self, destination: &str, origin: &str) -> Option<usize> {
        let row = *self.destination_index.get(destination)?;
        let col = *self.origin_index.get(origin)?;
        Some(row * self.origins.len() + col)
    }

    /// Cell for the leg `origin -> destination`
    pub fn get(&self, destination: &str, origin: &str) -> Option<&RouteStat> {
        self.offset(destination, origin).map(|idx| &self.cells[idx])
    }

    /// Value for the leg `origin -> destination`
    pub fn value(&self, destination: &str, origin: &str) -> Option<f64> {
        self.get(destination, origin).map(|cell| cell.value)
    }

    /// Overwrite a cell; returns `false` when either label is not in the table
    pub(crate) fn set(&mut self, destination: &str, origin: &str, stat: RouteStat) -> bool {
        match self.offset(destination, origin) {
            Some(idx) => {
                self.cells[idx] = stat;
                true
            }
            None => false,
        }
    }

    /// Builder-style cell replacement; unknown labels leave the table unchanged
    pub fn with_cell(mut self, destination: &str, origin: &str, stat: RouteStat) -> Self {
        if !self.set(destination, origin, stat) {
            tracing::warn!("No cell for {} -> {}, ignoring", origin, destination);
        }
        self
    }

    /// Iterate `(destination, origin, cell)` in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &RouteStat)> {
        let width = self.origins.len();
        self.cells.iter().enumerate().map(move |(idx, cell)| {
            (
                self.destinations[idx / width].as_str(),
                self.origins[idx % width].as_str(),
                cell,
            )
        })
    }

    /// Number of cells backed by a local estimate
    pub fn local_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_local()).count()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Values only, one row per destination
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        if self.origins.is_empty() {
            return vec![Vec::new(); self.destinations.len()];
        }
        self.cells
            .chunks(self.origins.len())
            .map(|row| row.iter().map(|c| c.value).collect())
            .collect()
    }

    /// Human-readable matrix with destination rows and origin columns
    pub fn to_report_string(&self, title: &str) -> String {
        let mut report = format!("{} (rows = destination, columns = origin)\n", title);

        report.push_str(&format!("{:>8}", ""));
        for origin in &self.origins {
            report.push_str(&format!(" {:>10}", origin));
        }
        report.push('\n');

        for (destination, row) in self.destinations.iter().zip(self.to_rows()) {
            report.push_str(&format!("{:>8}", destination));
            for value in row {
                report.push_str(&format!(" {:>10.3}", value));
            }
            report.push('\n');
        }

        report.push_str(&format!(
            "Local estimates: {} of {} cells\n",
            self.local_count(),
            self.len()
        ));
        report
    }
}

/// JSON shape: `{"destinations": [...], "origins": [...], "values": [[...]], "local": [[...]]}`
impl Serialize for RouteStatsTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let local: Vec<Vec<bool>> = self
            .destinations
            .iter()
            .map(|d| {
                self.origins
                    .iter()
                    .map(|o| self.get(d, o).is_some_and(RouteStat::is_local))
                    .collect()
            })
            .collect();

        let mut state = serializer.serialize_struct("RouteStatsTable", 4)?;
        state.serialize_field("destinations", &self.destinations)?;
        state.serialize_field("origins", &self.origins)?;
        state.serialize_field("values", &self.to_rows())?;
        state.serialize_field("local", &local)?;
        state.end()
    }
}
