// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// The value an [`Aggregator`](crate::Aggregator) reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Report {
    /// A single summary value.
    Value(f64),
    /// The raw accumulators behind a ratio, reported when full stats are requested.
    ///
    /// Partial results from several sources merge by summing both fields; the ratio is
    /// `sum / count`.
    FullStats {
        /// Accumulated (weighted) sum of observations
        sum: f64,
        /// Accumulated weight
        count: f64,
    },
}

impl Report {
    /// The single value, if this is a [`Report::Value`].
    pub fn value(&self) -> Option<f64> {
        match self {
            Report::Value(value) => Some(*value),
            Report::FullStats { .. } => None,
        }
    }

    /// The `(sum, count)` pair, if this is a [`Report::FullStats`].
    pub fn full_stats(&self) -> Option<(f64, f64)> {
        match self {
            Report::Value(_) => None,
            Report::FullStats { sum, count } => Some((*sum, *count)),
        }
    }

    /// Number of scalars this report occupies once flattened.
    pub fn flat_len(&self) -> usize {
        match self {
            Report::Value(_) => 1,
            Report::FullStats { .. } => 2,
        }
    }

    /// Append this report's scalars to `out`; `sum` precedes `count`.
    pub fn flatten_into(&self, out: &mut Vec<f64>) {
        match self {
            Report::Value(value) => out.push(*value),
            Report::FullStats { sum, count } => out.extend([*sum, *count]),
        }
    }

    /// Build a report with the same shape as `self` from flattened scalars.
    ///
    /// `flat` must hold exactly [`Report::flat_len`] values.
    pub fn with_flat(&self, flat: &[f64]) -> Report {
        debug_assert_eq!(flat.len(), self.flat_len());
        match self {
            Report::Value(_) => Report::Value(flat[0]),
            Report::FullStats { .. } => Report::FullStats {
                sum: flat[0],
                count: flat[1],
            },
        }
    }
}

impl From<f64> for Report {
    fn from(value: f64) -> Self {
        Report::Value(value)
    }
}

// format options like `{:.3}` apply to every number
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Value(value) => fmt::Display::fmt(value, f),
            Report::FullStats { sum, count } => {
                f.write_str("(")?;
                fmt::Display::fmt(sum, f)?;
                f.write_str(", ")?;
                fmt::Display::fmt(count, f)?;
                f.write_str(")")
            }
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Report {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Report::Value(value) => serializer.serialize_f64(*value),
            Report::FullStats { sum, count } => {
                serde::Serialize::serialize(&(sum, count), serializer)
            }
        }
    }
}
