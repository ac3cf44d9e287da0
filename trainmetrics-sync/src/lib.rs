// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::{fmt, sync::Arc};

/// Module containing fake process groups for testing
///
/// To enable this module, you must enable the `test-util` feature.
#[cfg(feature = "test-util")]
pub mod fakes;

/// The error cases for a [`Synchronizer`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyncError {
    /// The communication layer hasn't been set up in this process.
    NotInitialized,
    /// The process group reports no members.
    EmptyGroup,
    /// Processes contributed buffers of different lengths to the same collective.
    LengthMismatch {
        /// Length contributed by the first process to arrive
        expected: usize,
        /// Length contributed by this process
        actual: usize,
    },
    /// The communication layer failed while the collective was in flight.
    Disconnected(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => f.write_str("process group is not initialized"),
            Self::EmptyGroup => f.write_str("process group has no members"),
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "all-reduce length mismatch: expected {expected} values, got {actual}"
            ),
            Self::Disconnected(reason) => write!(f, "process group disconnected: {reason}"),
        }
    }
}

impl std::error::Error for SyncError {}

/// Collective communication across a fixed group of cooperating processes.
///
/// Every call is a blocking barrier: it returns once every process in the group has made
/// the same call with a buffer of the same length, or when the communication layer fails.
/// There is no timeout.
pub trait Synchronizer: Send + Sync + fmt::Debug {
    /// Number of processes in the group.
    fn world_size(&self) -> Result<usize, SyncError>;

    /// Replace every element of `values` with its sum across the group.
    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), SyncError>;

    /// Replace every element of `values` with its mean across the group.
    ///
    /// # Examples
    ///
    /// ```
    /// use trainmetrics_sync::{SingleProcess, Synchronizer};
    ///
    /// let mut values = [10.0, 2.0];
    /// SingleProcess.all_reduce_mean(&mut values).unwrap();
    /// assert_eq!(values, [10.0, 2.0]);
    /// ```
    fn all_reduce_mean(&self, values: &mut [f64]) -> Result<(), SyncError> {
        let world_size = self.world_size()?;
        if world_size == 0 {
            return Err(SyncError::EmptyGroup);
        }
        self.all_reduce_sum(values)?;
        let world_size = world_size as f64;
        for value in values.iter_mut() {
            *value /= world_size;
        }
        Ok(())
    }
}

impl<T: Synchronizer + ?Sized> Synchronizer for &T {
    fn world_size(&self) -> Result<usize, SyncError> {
        (**self).world_size()
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), SyncError> {
        (**self).all_reduce_sum(values)
    }
}

impl<T: Synchronizer + ?Sized> Synchronizer for Box<T> {
    fn world_size(&self) -> Result<usize, SyncError> {
        (**self).world_size()
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), SyncError> {
        (**self).all_reduce_sum(values)
    }
}

impl<T: Synchronizer + ?Sized> Synchronizer for Arc<T> {
    fn world_size(&self) -> Result<usize, SyncError> {
        (**self).world_size()
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), SyncError> {
        (**self).all_reduce_sum(values)
    }
}

/// A process group containing only the current process.
///
/// Every collective is the identity, so code written for distributed collection runs
/// unchanged on a single worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Synchronizer for SingleProcess {
    fn world_size(&self) -> Result<usize, SyncError> {
        Ok(1)
    }

    fn all_reduce_sum(&self, _values: &mut [f64]) -> Result<(), SyncError> {
        Ok(())
    }
}
