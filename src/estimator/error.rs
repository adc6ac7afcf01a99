use thiserror::Error;

/// Errors raised by the route statistics estimators
///
/// Thin or constant samples are not errors: route cells silently take the
/// global baseline, and a one-value baseline yields a NaN sample std. These
/// variants cover inputs with no observations at all or an unusable
/// configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("Invalid estimator configuration: {0}")]
    InvalidConfig(String),

    #[error("No {metric} observations to build a global baseline from")]
    EmptyBaseline { metric: &'static str },

    #[error("Failed to build Student's t distribution: {0}")]
    Distribution(String),
}
