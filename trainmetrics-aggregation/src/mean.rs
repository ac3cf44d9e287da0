//! Weighted running mean.

use trainmetrics_core::{Aggregator, Report, Tensor, UpdateError};

/// Tracks a weighted running mean as a cumulative sum and a cumulative weight.
///
/// Both accumulators are plain `f64`s, whatever the input was.
///
/// - With an explicit weight, value and weight must each hold a single element; the update
///   adds `value` to the sum and `weight` to the total weight. The value is taken as an
///   already weighted contribution, the same way a batch contributes its sum.
/// - Without a weight, every element of the value counts once: a batch of `n` values adds
///   its sum and a weight of `n`, exactly as `n` separate scalar updates would.
///
/// The mean of a period that saw no weight is `0.0`. A weight of zero is accepted and only
/// moves the sum.
///
/// # Example
///
/// ```rust
/// use trainmetrics_aggregation::Mean;
/// use trainmetrics_core::{Aggregator, AggregatorExt, Report};
///
/// let mut episode_length = Mean::new();
/// episode_length.update(vec![10.0, 20.0, 30.0]).unwrap();
/// episode_length.update_weighted(60.0, 2.0).unwrap();
///
/// assert_eq!(episode_length.report(false), Report::Value(24.0));
/// assert_eq!(
///     episode_length.report(true),
///     Report::FullStats { sum: 120.0, count: 5.0 }
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mean {
    cumsum: f64,
    samples: f64,
    is_distributed: bool,
}

impl Mean {
    /// A local (not distributed) mean.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mean whose value is averaged across processes on collect.
    pub fn distributed() -> Self {
        Self {
            is_distributed: true,
            ..Self::default()
        }
    }

    /// Sum of all contributed values since the last reset.
    pub fn cumsum(&self) -> f64 {
        self.cumsum
    }

    /// Sum of all contributed weights since the last reset.
    pub fn samples(&self) -> f64 {
        self.samples
    }
}

impl Aggregator for Mean {
    fn is_distributed(&self) -> bool {
        self.is_distributed
    }

    fn reset_states(&mut self) {
        self.cumsum = 0.0;
        self.samples = 0.0;
    }

    fn update_state(&mut self, value: Tensor, weight: Option<Tensor>) -> Result<(), UpdateError> {
        let (value, weight) = match weight {
            Some(weight) => (value.item()?, weight.item()?),
            None => (value.sum(), value.numel() as f64),
        };
        self.cumsum += value;
        self.samples += weight;
        Ok(())
    }

    fn report(&self, full_stats: bool) -> Report {
        if full_stats {
            return Report::FullStats {
                sum: self.cumsum,
                count: self.samples,
            };
        }
        if self.samples == 0.0 {
            return Report::Value(0.0);
        }
        Report::Value(self.cumsum / self.samples)
    }
}
