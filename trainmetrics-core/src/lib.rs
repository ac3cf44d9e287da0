// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod error;
mod report;
pub mod tensor;

pub use error::UpdateError;
pub use report::Report;
pub use tensor::{IntoTensor, Precision, ShapeError, Tensor};

/// A stateful accumulator that folds a stream of observations into a summary value.
///
/// Every aggregator is always in a state from which [`Aggregator::update_state`] and
/// [`Aggregator::report`] can be called. Reporting never changes that state; it is the
/// caller (normally a `MetricsContext`) that calls [`Aggregator::reset_states`] once a
/// report has been taken.
///
/// Values arrive already coerced into a host-resident [`Tensor`]. Use the
/// [`AggregatorExt`] helpers to feed raw numbers or slices directly.
#[diagnostic::on_unimplemented(
    message = "Aggregator is not implemented for {Self}",
    note = "Use `Mean`, `LastValue` or `AccumulatedMetric` from `trainmetrics-aggregation`, or implement `Aggregator` directly."
)]
pub trait Aggregator: Send {
    /// Whether the reported value takes part in cross-process synchronization on collect.
    fn is_distributed(&self) -> bool;

    /// Return to the initial, zeroed state.
    fn reset_states(&mut self);

    /// Fold an observation (and an optional weight) into the running state.
    fn update_state(&mut self, value: Tensor, weight: Option<Tensor>) -> Result<(), UpdateError>;

    /// Report the current summary.
    ///
    /// With `full_stats`, aggregators that keep a ratio internally report the raw
    /// accumulators (see [`Report::FullStats`]) so partial results can be merged elsewhere.
    /// Aggregators without such accumulators ignore the flag.
    fn report(&self, full_stats: bool) -> Report;
}

impl<A: Aggregator + ?Sized> Aggregator for Box<A> {
    fn is_distributed(&self) -> bool {
        (**self).is_distributed()
    }

    fn reset_states(&mut self) {
        (**self).reset_states()
    }

    fn update_state(&mut self, value: Tensor, weight: Option<Tensor>) -> Result<(), UpdateError> {
        (**self).update_state(value, weight)
    }

    fn report(&self, full_stats: bool) -> Report {
        (**self).report(full_stats)
    }
}

/// Convenience methods for feeding raw numeric input to any [`Aggregator`].
///
/// Input is coerced at the default [`Precision`].
pub trait AggregatorExt: Aggregator {
    /// Coerce `value` and fold it in without an explicit weight.
    ///
    /// ```
    /// use trainmetrics_core::{Aggregator, AggregatorExt, Report, Tensor, UpdateError};
    ///
    /// #[derive(Default)]
    /// struct Total(f64);
    ///
    /// impl Aggregator for Total {
    ///     fn is_distributed(&self) -> bool {
    ///         false
    ///     }
    ///     fn reset_states(&mut self) {
    ///         self.0 = 0.0;
    ///     }
    ///     fn update_state(
    ///         &mut self,
    ///         value: Tensor,
    ///         _weight: Option<Tensor>,
    ///     ) -> Result<(), UpdateError> {
    ///         self.0 += value.sum();
    ///         Ok(())
    ///     }
    ///     fn report(&self, _full_stats: bool) -> Report {
    ///         Report::Value(self.0)
    ///     }
    /// }
    ///
    /// let mut total = Total::default();
    /// total.update(vec![1.0, 2.0]).unwrap();
    /// total.update(3).unwrap();
    /// assert_eq!(total.report(false), Report::Value(6.0));
    /// ```
    fn update(&mut self, value: impl IntoTensor) -> Result<(), UpdateError> {
        let value = value.into_tensor(Precision::default())?;
        self.update_state(value, None)
    }

    /// Coerce `value` and `weight` and fold them in.
    fn update_weighted(
        &mut self,
        value: impl IntoTensor,
        weight: impl IntoTensor,
    ) -> Result<(), UpdateError> {
        let precision = Precision::default();
        let value = value.into_tensor(precision)?;
        let weight = weight.into_tensor(precision)?;
        self.update_state(value, Some(weight))
    }
}

impl<A: Aggregator + ?Sized> AggregatorExt for A {}
