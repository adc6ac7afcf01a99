//! Delayscope - robust flight delay statistics and propagation
//!
//! This library estimates per-route delay distributions that shrink toward
//! the network-wide distribution unless a route is significantly different,
//! propagates those distributions along multi-leg itineraries (as an
//! expected value or a Monte Carlo sample), and ranks airports by their
//! influence on the route graph through a singular value decomposition.

pub mod cli;
pub mod config;
pub mod estimator;
pub mod flights;
pub mod influence;
pub mod path;
pub mod route_table;
pub mod sampler;
