//! Strategies for accumulating values

use std::fmt;

use trainmetrics_core::UpdateError;

/// Defines how a new observation is folded into an accumulated scalar.
///
/// Used by [`crate::AccumulatedMetric`]. The accumulated value starts at `0.0` after every
/// reset, so strategies see `0.0` as `accum` for the first observation of a period.
///
/// # Example
///
/// ```rust
/// use trainmetrics_aggregation::{AccumulateStrategy, AccumulatedMetric};
/// use trainmetrics_core::{Aggregator, AggregatorExt, Report, UpdateError};
///
/// // Counts observations above a threshold
/// #[derive(Default)]
/// struct AboveOne;
///
/// impl AccumulateStrategy for AboveOne {
///     fn accumulate(&self, accum: f64, value: f64) -> Result<f64, UpdateError> {
///         Ok(if value > 1.0 { accum + 1.0 } else { accum })
///     }
/// }
///
/// let mut metric = AccumulatedMetric::<AboveOne>::new();
/// for value in [0.5, 1.5, 2.5] {
///     metric.update(value).unwrap();
/// }
/// assert_eq!(metric.report(false), Report::Value(2.0));
/// ```
pub trait AccumulateStrategy: Send {
    /// Combine the accumulated value with a new observation.
    fn accumulate(&self, accum: f64, value: f64) -> Result<f64, UpdateError>;
}

/// Sums values when accumulating
///
/// Use for episode counts, environment steps, or anything else that should be totalled
/// over a reporting period.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl AccumulateStrategy for Sum {
    fn accumulate(&self, accum: f64, value: f64) -> Result<f64, UpdateError> {
        Ok(accum + value)
    }
}

/// Accumulation strategy that preserves the most recently seen value
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepLast;

impl AccumulateStrategy for KeepLast {
    fn accumulate(&self, _accum: f64, value: f64) -> Result<f64, UpdateError> {
        Ok(value)
    }
}

/// Keeps the running maximum.
///
/// The fold starts from `0.0`, so a period that only saw negative values reports `0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl AccumulateStrategy for Max {
    fn accumulate(&self, accum: f64, value: f64) -> Result<f64, UpdateError> {
        Ok(accum.max(value))
    }
}

/// Keeps the running minimum.
///
/// The fold starts from `0.0`, so a period that only saw positive values reports `0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

impl AccumulateStrategy for Min {
    fn accumulate(&self, accum: f64, value: f64) -> Result<f64, UpdateError> {
        Ok(accum.min(value))
    }
}

/// A caller-supplied combine function.
///
/// The [`Default`] value holds no function; accumulating through it fails with
/// [`UpdateError::MissingAccumulateFn`].
#[derive(Default)]
pub struct AccumulateFn(Option<Box<dyn Fn(f64, f64) -> f64 + Send>>);

impl AccumulateFn {
    /// Wrap `f`, called as `f(accumulated, new)`.
    pub fn new(f: impl Fn(f64, f64) -> f64 + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// Whether a combine function was supplied.
    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for AccumulateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccumulateFn")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl AccumulateStrategy for AccumulateFn {
    fn accumulate(&self, accum: f64, value: f64) -> Result<f64, UpdateError> {
        match &self.0 {
            Some(f) => Ok(f(accum, value)),
            None => Err(UpdateError::MissingAccumulateFn),
        }
    }
}
