// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::tensor::ShapeError;

/// The error cases for an [`Aggregator::update_state`](crate::Aggregator::update_state) call.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum UpdateError {
    /// The observation could not be coerced or reduced to the shape the aggregator needs.
    Shape(ShapeError),
    /// A fold accumulator was created without a combine function.
    MissingAccumulateFn,
    /// A weight was passed to an aggregator that has no notion of weight.
    UnexpectedWeight {
        /// Name of the aggregator type that rejected the weight
        aggregator: &'static str,
    },
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shape(err) => fmt::Display::fmt(err, f),
            Self::MissingAccumulateFn => f.write_str(
                "accumulated metric has no accumulate function; supply one at construction",
            ),
            Self::UnexpectedWeight { aggregator } => {
                write!(f, "`{aggregator}` does not accept a weight")
            }
        }
    }
}

impl std::error::Error for UpdateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Shape(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShapeError> for UpdateError {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}
