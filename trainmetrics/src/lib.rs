// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod collect;
mod context;

pub use collect::{CollectError, CollectOptions, Collected};
pub use context::{ContextBuilder, MetricsContext};

pub use trainmetrics_aggregation::{
    AccumulateFn, AccumulateStrategy, AccumulatedMetric, KeepLast, LastValue, Max, Mean, Min, Sum,
};
pub use trainmetrics_core::{
    Aggregator, AggregatorExt, IntoTensor, Precision, Report, ShapeError, Tensor, UpdateError,
};
pub use trainmetrics_sync::{SingleProcess, SyncError, Synchronizer};

/// Coercion of numeric input into host-resident tensors.
///
/// Implement [`IntoTensor`] for your numeric runtime's array type to log it directly.
pub mod tensor {
    pub use trainmetrics_core::tensor::{IntoTensor, Precision, ShapeError, Tensor, to_tensor};
}

/// Fake process groups for testing distributed collection.
///
/// This requires that the `test-util` feature be enabled.
#[cfg(feature = "test-util")]
pub mod fakes {
    pub use trainmetrics_sync::fakes::{LocalPeer, LocalProcessGroup, StaticPeers};
}
