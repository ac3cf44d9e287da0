//! Fold accumulation of scalar observations.

use trainmetrics_core::{Aggregator, Report, Tensor, UpdateError};

use crate::value::{AccumulateFn, AccumulateStrategy, KeepLast};

/// Folds every observation into one scalar through an [`AccumulateStrategy`].
///
/// The state starts at `0.0` and returns there on every reset. Each observation must reduce
/// to a single element, and weights are rejected. Full-stats reporting has no effect: the
/// accumulated scalar is always reported as is.
///
/// The combine behavior is part of the type. A variant with a built-in strategy, such as
/// [`LastValue`], has no way to be handed a different function. A closure-driven metric is
/// built with [`AccumulatedMetric::from_fn`]; one created through `new()` or `default()`
/// without a closure fails on its first update.
///
/// # Example
///
/// ```rust
/// use trainmetrics_aggregation::{AccumulatedMetric, Max};
/// use trainmetrics_core::{Aggregator, AggregatorExt, Report};
///
/// let mut best_return = AccumulatedMetric::<Max>::new();
/// best_return.update(3.0).unwrap();
/// best_return.update(7.0).unwrap();
/// best_return.update(5.0).unwrap();
/// assert_eq!(best_return.report(false), Report::Value(7.0));
///
/// let mut product = AccumulatedMetric::from_fn(|accum, value| {
///     if accum == 0.0 { value } else { accum * value }
/// });
/// product.update(2.0).unwrap();
/// product.update(4.0).unwrap();
/// assert_eq!(product.report(false), Report::Value(8.0));
/// ```
#[derive(Debug, Default)]
pub struct AccumulatedMetric<S = AccumulateFn> {
    strategy: S,
    value: f64,
    is_distributed: bool,
}

/// Holds the most recent observation, ignoring everything before it.
pub type LastValue = AccumulatedMetric<KeepLast>;

impl<S: AccumulateStrategy> AccumulatedMetric<S> {
    /// A local (not distributed) metric using `strategy`.
    pub fn with_strategy(strategy: S) -> Self {
        Self {
            strategy,
            value: 0.0,
            is_distributed: false,
        }
    }

    /// A metric using `strategy` whose value is averaged across processes on collect.
    pub fn distributed_with_strategy(strategy: S) -> Self {
        Self {
            is_distributed: true,
            ..Self::with_strategy(strategy)
        }
    }

    /// The accumulated value so far.
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl<S: AccumulateStrategy + Default> AccumulatedMetric<S> {
    /// A local (not distributed) metric with the strategy's default.
    pub fn new() -> Self {
        Self::with_strategy(S::default())
    }

    /// A metric with the strategy's default, averaged across processes on collect.
    pub fn distributed() -> Self {
        Self::distributed_with_strategy(S::default())
    }
}

impl AccumulatedMetric<AccumulateFn> {
    /// A local metric folding with `f(accumulated, new)`.
    pub fn from_fn(f: impl Fn(f64, f64) -> f64 + Send + 'static) -> Self {
        Self::with_strategy(AccumulateFn::new(f))
    }

    /// A distributed metric folding with `f(accumulated, new)`.
    pub fn distributed_from_fn(f: impl Fn(f64, f64) -> f64 + Send + 'static) -> Self {
        Self::distributed_with_strategy(AccumulateFn::new(f))
    }
}

impl<S: AccumulateStrategy> Aggregator for AccumulatedMetric<S> {
    fn is_distributed(&self) -> bool {
        self.is_distributed
    }

    fn reset_states(&mut self) {
        self.value = 0.0;
    }

    fn update_state(&mut self, value: Tensor, weight: Option<Tensor>) -> Result<(), UpdateError> {
        if weight.is_some() {
            return Err(UpdateError::UnexpectedWeight {
                aggregator: "AccumulatedMetric",
            });
        }
        self.value = self.strategy.accumulate(self.value, value.item()?)?;
        Ok(())
    }

    fn report(&self, _full_stats: bool) -> Report {
        Report::Value(self.value)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use trainmetrics_core::{Aggregator, AggregatorExt, Report, ShapeError, UpdateError};

    use super::{AccumulatedMetric, LastValue};
    use crate::value::{AccumulateFn, Max, Sum};

    #[test]
    fn last_value_keeps_most_recent() {
        let mut metric = LastValue::new();
        for value in [1.0, -4.0, 9.0, 5.0] {
            metric.update(value).unwrap();
        }
        check!(metric.report(false) == Report::Value(5.0));
        check!(metric.report(true) == Report::Value(5.0));
    }

    #[test]
    fn max_is_a_running_maximum() {
        let mut metric = AccumulatedMetric::<Max>::new();
        for value in [3.0, 8.0, 2.0] {
            metric.update(value).unwrap();
        }
        check!(metric.value() == 8.0);

        let mut metric = AccumulatedMetric::from_fn(f64::max);
        for value in [3.0, 8.0, 2.0] {
            metric.update(value).unwrap();
        }
        check!(metric.value() == 8.0);
    }

    #[test]
    fn unconfigured_metric_fails_on_first_update() {
        let mut metric = AccumulatedMetric::<AccumulateFn>::default();
        check!(metric.update(1.0) == Err(UpdateError::MissingAccumulateFn));
        check!(metric.report(false) == Report::Value(0.0));
    }

    #[test]
    fn weights_are_rejected() {
        let mut metric = AccumulatedMetric::<Sum>::new();
        let_assert!(Err(UpdateError::UnexpectedWeight { .. }) = metric.update_weighted(1.0, 2.0));
        check!(metric.value() == 0.0);
    }

    #[test]
    fn batches_must_be_single_elements() {
        let mut metric = LastValue::new();
        check!(
            metric.update(vec![1.0, 2.0])
                == Err(UpdateError::Shape(ShapeError::NotAScalar { numel: 2 }))
        );
        metric.update(vec![3.0]).unwrap();
        check!(metric.value() == 3.0);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut metric = AccumulatedMetric::<Sum>::distributed();
        check!(metric.is_distributed());
        metric.update(2).unwrap();
        metric.update(3).unwrap();
        check!(metric.value() == 5.0);
        metric.reset_states();
        check!(metric.report(false) == Report::Value(0.0));
    }
}
