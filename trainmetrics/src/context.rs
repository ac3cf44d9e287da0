// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use indexmap::IndexMap;
use trainmetrics_aggregation::Mean;
use trainmetrics_core::{Aggregator, IntoTensor, Precision, UpdateError};
use trainmetrics_sync::Synchronizer;

use crate::collect::{CollectError, CollectOptions, Collected};

type AggregatorFactory = Box<dyn Fn() -> Box<dyn Aggregator> + Send + Sync>;

/// Builder for [`MetricsContext`].
pub struct ContextBuilder {
    precision: Precision,
    default_aggregator: AggregatorFactory,
    synchronizer: Option<Box<dyn Synchronizer>>,
    metrics: IndexMap<String, Box<dyn Aggregator>>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            precision: Precision::default(),
            default_aggregator: Box::new(|| Box::new(Mean::new())),
            synchronizer: None,
            metrics: IndexMap::new(),
        }
    }
}

impl ContextBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Precision logged values are coerced to. Defaults to [`Precision::Single`].
    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Aggregator created for a name that is used before being configured.
    ///
    /// Defaults to a local [`Mean`].
    ///
    /// ```
    /// use trainmetrics::{Aggregator, Mean, MetricsContext};
    ///
    /// let mut metrics = MetricsContext::builder()
    ///     .default_aggregator(Mean::distributed)
    ///     .build();
    /// assert!(metrics.get_or_create("loss").is_distributed());
    /// ```
    pub fn default_aggregator<A: Aggregator + 'static>(
        mut self,
        factory: impl Fn() -> A + Send + Sync + 'static,
    ) -> Self {
        self.default_aggregator = Box::new(move || Box::new(factory()));
        self
    }

    /// Process group used by distributed collection.
    pub fn synchronizer(mut self, synchronizer: impl Synchronizer + 'static) -> Self {
        self.synchronizer = Some(Box::new(synchronizer));
        self
    }

    /// Register `aggregator` under `name` up front.
    ///
    /// Metrics registered this way are reported first, in registration order. Registering
    /// the same name twice keeps the last aggregator at the first position, like
    /// [`MetricsContext::insert`].
    pub fn metric(
        mut self,
        name: impl Into<String>,
        aggregator: impl Aggregator + 'static,
    ) -> Self {
        self.metrics.insert(name.into(), Box::new(aggregator));
        self
    }

    /// Build the context.
    pub fn build(self) -> MetricsContext {
        MetricsContext {
            metrics: self.metrics,
            precision: self.precision,
            default_aggregator: self.default_aggregator,
            synchronizer: self.synchronizer,
        }
    }
}

/// An ordered collection of named aggregators.
///
/// Names map to aggregators in insertion order, which is also the order of every
/// [`Collected`] result. Unknown names are materialized lazily with the default aggregator
/// (a local [`Mean`] unless configured through [`ContextBuilder::default_aggregator`]).
///
/// A context is owned by one thread. It can be moved to another thread, but all updates and
/// collections happen synchronously on the owner's thread.
///
/// ```
/// use trainmetrics::{AccumulatedMetric, CollectOptions, MetricsContext, Sum};
///
/// let mut metrics = MetricsContext::new();
/// metrics.insert("env_steps", AccumulatedMetric::<Sum>::new());
///
/// for step in 0..4 {
///     metrics.log("env_steps", 256).unwrap();
///     metrics.log("loss", 1.0 / (step + 1) as f64).unwrap();
/// }
///
/// let collected = metrics.collect(CollectOptions::local()).unwrap();
/// assert_eq!(collected.value("env_steps"), Some(1024.0));
/// assert_eq!(collected.names().collect::<Vec<_>>(), ["env_steps", "loss"]);
/// ```
pub struct MetricsContext {
    metrics: IndexMap<String, Box<dyn Aggregator>>,
    precision: Precision,
    default_aggregator: AggregatorFactory,
    synchronizer: Option<Box<dyn Synchronizer>>,
}

impl Default for MetricsContext {
    fn default() -> Self {
        ContextBuilder::default().build()
    }
}

impl fmt::Debug for MetricsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsContext")
            .field("metrics", &self.names().collect::<Vec<_>>())
            .field("precision", &self.precision)
            .field("synchronizer", &self.synchronizer)
            .finish_non_exhaustive()
    }
}

impl MetricsContext {
    /// A context with default settings and no synchronizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a [`ContextBuilder`].
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// Fold `value` into the aggregator for `name`, creating it if needed.
    pub fn log(&mut self, name: &str, value: impl IntoTensor) -> Result<(), UpdateError> {
        let value = value.into_tensor(self.precision)?;
        self.get_or_create(name).update_state(value, None)
    }

    /// Fold `value` with an explicit `weight` into the aggregator for `name`, creating it if
    /// needed.
    pub fn log_weighted(
        &mut self,
        name: &str,
        value: impl IntoTensor,
        weight: impl IntoTensor,
    ) -> Result<(), UpdateError> {
        let value = value.into_tensor(self.precision)?;
        let weight = weight.into_tensor(self.precision)?;
        self.get_or_create(name).update_state(value, Some(weight))
    }

    /// The aggregator for `name`, created with the default aggregator if absent.
    pub fn get_or_create(&mut self, name: &str) -> &mut dyn Aggregator {
        let position = match self.metrics.get_index_of(name) {
            Some(position) => position,
            None => {
                tracing::trace!(metric = name, "creating default aggregator");
                let (position, _) = self
                    .metrics
                    .insert_full(name.to_owned(), (self.default_aggregator)());
                position
            }
        };
        self.metrics[position].as_mut()
    }

    /// The aggregator for `name`, without creating one.
    pub fn get(&self, name: &str) -> Option<&dyn Aggregator> {
        self.metrics.get(name).map(|aggregator| aggregator.as_ref())
    }

    /// Put `aggregator` under `name`, returning the aggregator it replaced.
    ///
    /// A replaced metric keeps its position in the order; a new one goes last.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        aggregator: impl Aggregator + 'static,
    ) -> Option<Box<dyn Aggregator>> {
        self.insert_boxed(name, Box::new(aggregator))
    }

    /// Like [`MetricsContext::insert`], for an already boxed aggregator.
    pub fn insert_boxed(
        &mut self,
        name: impl Into<String>,
        aggregator: Box<dyn Aggregator>,
    ) -> Option<Box<dyn Aggregator>> {
        self.metrics.insert(name.into(), aggregator)
    }

    /// Remove `name` entirely. Logging to it again creates a fresh default aggregator.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Aggregator>> {
        self.metrics.shift_remove(name)
    }

    /// Whether `name` has an aggregator.
    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Number of metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether there are no metrics.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Metric names, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    /// `(name, aggregator)` pairs, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Aggregator)> {
        self.metrics
            .iter()
            .map(|(name, aggregator)| (name.as_str(), aggregator.as_ref() as &dyn Aggregator))
    }

    /// Precision logged values are coerced to.
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Replace the synchronizer used by distributed collection.
    pub fn set_synchronizer(&mut self, synchronizer: impl Synchronizer + 'static) {
        self.synchronizer = Some(Box::new(synchronizer));
    }

    /// Report every metric, reset every metric, and optionally synchronize.
    ///
    /// Every aggregator is reset before this returns, including when it returns an error.
    /// With [`CollectOptions::distributed`], the reports of distributed-flagged aggregators
    /// are averaged across the configured synchronizer's group in one collective; other
    /// metrics keep their local values. Every process in the group must collect at the
    /// same point with the same distributed metrics registered in the same order.
    pub fn collect(&mut self, options: CollectOptions) -> Result<Collected, CollectError> {
        let (mut collected, distributed) = self.report_and_reset(options.full_stats);
        if options.distributed {
            let Some(synchronizer) = self.synchronizer.as_deref() else {
                tracing::warn!("distributed collection requested without a synchronizer");
                return Err(CollectError::NoSynchronizer);
            };
            synchronize(&mut collected, &distributed, synchronizer)?;
        }
        tracing::debug!(
            metrics = collected.len(),
            synchronized = options.distributed,
            full_stats = options.full_stats,
            "collected metrics"
        );
        Ok(collected)
    }

    /// Distributed collection through `synchronizer` instead of the configured one.
    pub fn collect_with(
        &mut self,
        synchronizer: &dyn Synchronizer,
        full_stats: bool,
    ) -> Result<Collected, CollectError> {
        let (mut collected, distributed) = self.report_and_reset(full_stats);
        synchronize(&mut collected, &distributed, synchronizer)?;
        tracing::debug!(
            metrics = collected.len(),
            synchronized = true,
            full_stats,
            "collected metrics"
        );
        Ok(collected)
    }

    fn report_and_reset(&mut self, full_stats: bool) -> (Collected, Vec<bool>) {
        let mut collected = Collected::default();
        let mut distributed = Vec::with_capacity(self.metrics.len());
        for (name, aggregator) in self.metrics.iter_mut() {
            collected.push(name.clone(), aggregator.report(full_stats));
            distributed.push(aggregator.is_distributed());
            aggregator.reset_states();
        }
        (collected, distributed)
    }
}

fn synchronize(
    collected: &mut Collected,
    distributed: &[bool],
    synchronizer: &dyn Synchronizer,
) -> Result<(), CollectError> {
    collected
        .synchronize(distributed, synchronizer)
        .map_err(|err| {
            tracing::warn!(?err, "metric synchronization failed");
            CollectError::Sync(err)
        })
}
