//! Airport influence ranking via singular value decomposition
//!
//! The route graph is represented as a destination × origin weight matrix
//! (flight counts, mean delays, ...). Its SVD `W = U · Σ · Vᵗ` exposes the
//! dominant structural modes of the network; scaling the singular vectors by
//! the singular spectrum and taking Euclidean norms gives one impact score per
//! origin (column) and per destination (row).
//!
//! # Algorithm
//!
//! ```text
//! W (M × N) = U (M × M) · Σ (M × N) · Vᵗ (N × N)
//! origin_influences      = Vᵗ · diag_N(σ)      -> row norms,    length N
//! destination_influences = U  · diag_M(σ)      -> column norms, length M
//! ```
//!
//! Singular values are sorted in descending order and padded with zeros so
//! `diag_N` / `diag_M` are square; the identity matrix therefore scores 1.0 for
//! every airport on both axes.

use crate::flights::{DelayMetric, FlightTable};
use crate::route_table::unique_labels;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by the influence ranker
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InfluenceError {
    #[error("Invalid matrix: {0}")]
    InvalidMatrix(String),
}

/// Per-origin and per-destination impact scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Influences {
    /// One score per column (origin), length N
    pub origin_impacts: Vec<f64>,
    /// One score per row (destination), length M
    pub destination_impacts: Vec<f64>,
}

/// Destination × origin route weights with airport labels
#[derive(Debug, Clone, PartialEq)]
pub struct RouteWeightMatrix {
    destinations: Vec<String>,
    origins: Vec<String>,
    weights: DMatrix<f64>,
}

impl RouteWeightMatrix {
    /// Build from row-major weights, one row per destination
    pub fn from_rows<S: AsRef<str>>(
        destinations: &[S],
        origins: &[S],
        rows: &[Vec<f64>],
    ) -> Result<Self, InfluenceError> {
        let destinations = unique_labels(destinations);
        let origins = unique_labels(origins);

        if rows.len() != destinations.len() {
            return Err(InfluenceError::InvalidMatrix(format!(
                "{} rows for {} destinations",
                rows.len(),
                destinations.len()
            )));
        }
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != origins.len())
        {
            return Err(InfluenceError::InvalidMatrix(format!(
                "row {} has {} columns, expected {}",
                idx,
                row.len(),
                origins.len()
            )));
        }

        let weights = DMatrix::from_fn(destinations.len(), origins.len(), |r, c| rows[r][c]);
        Ok(Self {
            destinations,
            origins,
            weights,
        })
    }

    /// Number of flights per (destination, origin) among `airports`
    ///
    /// The same airport list labels rows and columns.
    pub fn flight_counts<S: AsRef<str>>(flights: &FlightTable, airports: &[S]) -> Self {
        let airports = unique_labels(airports);
        let index: HashMap<&str, usize> = airports
            .iter()
            .enumerate()
            .map(|(idx, code)| (code.as_str(), idx))
            .collect();

        let mut weights = DMatrix::zeros(airports.len(), airports.len());
        for record in flights.records() {
            if let (Some(&row), Some(&col)) = (
                index.get(record.destination.as_str()),
                index.get(record.origin.as_str()),
            ) {
                weights[(row, col)] += 1.0;
            }
        }

        Self {
            destinations: airports.clone(),
            origins: airports,
            weights,
        }
    }

    /// Mean of `metric` per (destination, origin) among `airports`
    ///
    /// Routes without any valid observation weigh 0.
    pub fn mean_delays<S: AsRef<str>>(
        flights: &FlightTable,
        airports: &[S],
        metric: DelayMetric,
    ) -> Self {
        let airports = unique_labels(airports);
        let index: HashMap<&str, usize> = airports
            .iter()
            .enumerate()
            .map(|(idx, code)| (code.as_str(), idx))
            .collect();

        let n = airports.len();
        let mut sums = DMatrix::<f64>::zeros(n, n);
        let mut counts = DMatrix::<f64>::zeros(n, n);
        for record in flights.records() {
            let (Some(&row), Some(&col)) = (
                index.get(record.destination.as_str()),
                index.get(record.origin.as_str()),
            ) else {
                continue;
            };
            if let Some(value) = metric.value(record) {
                sums[(row, col)] += value;
                counts[(row, col)] += 1.0;
            }
        }

        let weights = sums.zip_map(&counts, |sum, count| if count > 0.0 { sum / count } else { 0.0 });
        Self {
            destinations: airports.clone(),
            origins: airports,
            weights,
        }
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// Impact scores paired with airport labels
    ///
    /// Origin scores are row norms of `Vᵗ · diag(σ)` and destination scores
    /// are the singular values in descending order. Both are indexed by
    /// singular direction rather than by airport, so the i-th label simply
    /// receives the i-th score and destinations rank in table order.
    pub fn rank(&self) -> Result<ImpactScores, InfluenceError> {
        let influences = get_influences(&self.weights)?;
        Ok(ImpactScores {
            origins: label(&self.origins, influences.origin_impacts),
            destinations: label(&self.destinations, influences.destination_impacts),
        })
    }
}

fn label(airports: &[String], scores: Vec<f64>) -> Vec<(String, f64)> {
    airports.iter().cloned().zip(scores).collect()
}

/// Labelled impact scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactScores {
    pub origins: Vec<(String, f64)>,
    pub destinations: Vec<(String, f64)>,
}

impl ImpactScores {
    /// Origins sorted by descending impact
    pub fn top_origins(&self, limit: usize) -> Vec<(String, f64)> {
        top(&self.origins, limit)
    }

    /// Destinations sorted by descending impact
    ///
    /// See [`RouteWeightMatrix::rank`]: destination scores follow the singular
    /// spectrum, so this keeps table order.
    pub fn top_destinations(&self, limit: usize) -> Vec<(String, f64)> {
        top(&self.destinations, limit)
    }
}

fn top(scores: &[(String, f64)], limit: usize) -> Vec<(String, f64)> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(limit);
    sorted
}

fn validate(weights: &DMatrix<f64>) -> Result<(), InfluenceError> {
    if weights.nrows() == 0 || weights.ncols() == 0 {
        return Err(InfluenceError::InvalidMatrix(format!(
            "matrix is empty ({}x{})",
            weights.nrows(),
            weights.ncols()
        )));
    }
    if let Some(idx) = weights.iter().position(|w| !w.is_finite()) {
        // nalgebra storage is column-major
        return Err(InfluenceError::InvalidMatrix(format!(
            "non-finite entry at ({}, {})",
            idx % weights.nrows(),
            idx / weights.nrows()
        )));
    }
    Ok(())
}

/// Per-origin and per-destination impact scores of a weight matrix
///
/// `weights` is M × N with destinations as rows and origins as columns. Any
/// finite, non-empty matrix is accepted, including rank-deficient, all-zero
/// and non-square ones.
///
/// `destination_impacts[i]` is `‖U[.., i]‖ · σ_i`, which for the columns of an
/// orthonormal `U` is the i-th largest singular value: an ordered spectrum,
/// not a score tied to the i-th destination row.
///
/// # Example
/// ```
/// use delayscope::influence::get_influences;
/// use nalgebra::DMatrix;
///
/// let influences = get_influences(&DMatrix::identity(3, 3)).unwrap();
/// assert!(influences.origin_impacts.iter().all(|s| (s - 1.0).abs() < 1e-9));
/// ```
pub fn get_influences(weights: &DMatrix<f64>) -> Result<Influences, InfluenceError> {
    validate(weights)?;

    let (m, n) = weights.shape();

    // Thin SVD of an M × N matrix only yields a square Vᵗ when N <= M. Padding
    // zero rows keeps the right singular vectors and completes Vᵗ to N × N.
    let padded;
    let decomposed = if n > m {
        padded = weights.clone().resize_vertically(n, 0.0);
        &padded
    } else {
        weights
    };

    let svd = decomposed.clone().svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(InfluenceError::InvalidMatrix(
            "SVD did not produce singular vectors".to_string(),
        ));
    };

    // Descending singular values; permute U columns and Vᵗ rows to match
    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

    let k = order.len();
    let sigma = DVector::from_fn(k, |i, _| svd.singular_values[order[i]]);
    let u = DMatrix::from_fn(u.nrows(), k, |r, c| u[(r, order[c])]);
    let v_t = DMatrix::from_fn(k, v_t.ncols(), |r, c| v_t[(order[r], c)]);

    // Vᵗ is N × N here; scale column j by σ_j (zero beyond the spectrum)
    let sigma_n = DVector::from_fn(n, |j, _| if j < k { sigma[j] } else { 0.0 });
    let origin_influences = DMatrix::from_fn(n, n, |r, c| v_t[(r, c)] * sigma_n[c]);
    let origin_impacts = origin_influences
        .row_iter()
        .map(|row| row.norm())
        .collect();

    // Only the first M rows of U belong to the input matrix; columns past
    // the spectrum are scaled by zero
    let destination_impacts = (0..m)
        .map(|i| {
            if i < k {
                u.view((0, i), (m, 1)).norm() * sigma[i]
            } else {
                0.0
            }
        })
        .collect();

    Ok(Influences {
        origin_impacts,
        destination_impacts,
    })
}
