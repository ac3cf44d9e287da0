// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Coercion of raw numeric input into a host-resident [`Tensor`].
//!
//! Aggregators never hold on to caller-owned numeric buffers. Whatever is logged (a single
//! number, a batch in a `Vec`, a row-major matrix, or an existing [`Tensor`]) is copied into
//! a detached [`Tensor`] at a chosen [`Precision`] before it reaches an aggregator. Numeric
//! runtimes plug in by implementing [`IntoTensor`] for their own array type.

use std::fmt;

use smallvec::SmallVec;

/// The numeric precision observations are cast to before aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Precision {
    /// Round every element through `f32`.
    #[default]
    Single,
    /// Keep the full `f64` value.
    Double,
}

impl Precision {
    /// Cast `value` to this precision.
    pub fn cast(self, value: f64) -> f64 {
        match self {
            Precision::Single => value as f32 as f64,
            Precision::Double => value,
        }
    }
}

/// Error raised when numeric input has a shape the operation can't handle.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ShapeError {
    /// Nested input whose rows don't all have the same length.
    Ragged {
        /// Index of the first row that differs from row 0
        row: usize,
        /// Length of row 0
        expected: usize,
        /// Length of the offending row
        actual: usize,
    },
    /// A single scalar was required but the tensor holds `numel` elements.
    NotAScalar {
        /// Number of elements in the tensor
        numel: usize,
    },
    /// The shape doesn't describe the amount of data supplied.
    Mismatch {
        /// Number of elements implied by the shape
        expected: usize,
        /// Number of elements supplied
        actual: usize,
    },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ragged {
                row,
                expected,
                actual,
            } => write!(
                f,
                "ragged input: row {row} has {actual} elements, expected {expected}"
            ),
            Self::NotAScalar { numel } => write!(
                f,
                "expected a single element, got a tensor with {numel} elements"
            ),
            Self::Mismatch { expected, actual } => write!(
                f,
                "shape describes {expected} elements but {actual} were supplied"
            ),
        }
    }
}

impl std::error::Error for ShapeError {}

type Shape = SmallVec<[usize; 4]>;

/// A dense, row-major, host-resident array of `f64`.
///
/// A tensor with an empty shape is a 0-d scalar and holds exactly one element.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: SmallVec<[f64; 1]>,
}

impl Tensor {
    /// A 0-d tensor holding `value`.
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Shape::new(),
            data: smallvec::smallvec![value],
        }
    }

    /// A 1-d tensor over `data`.
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self {
            shape: smallvec::smallvec![data.len()],
            data: SmallVec::from_vec(data),
        }
    }

    /// A tensor of the given `shape` over row-major `data`.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f64>) -> Result<Self, ShapeError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ShapeError::Mismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape: Shape::from_slice(shape),
            data: SmallVec::from_vec(data),
        })
    }

    /// The dimensions of this tensor. Empty for a 0-d scalar.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Whether this is a 0-d tensor.
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Sum of all elements; `0.0` for an empty tensor.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Extract the single element as a plain number.
    ///
    /// Any tensor with exactly one element qualifies, whatever its shape.
    pub fn item(&self) -> Result<f64, ShapeError> {
        match self.data.as_slice() {
            [value] => Ok(*value),
            data => Err(ShapeError::NotAScalar { numel: data.len() }),
        }
    }

    /// The elements in row-major order.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Cast every element to `precision`.
    pub fn to_precision(mut self, precision: Precision) -> Self {
        if precision != Precision::Double {
            for value in self.data.iter_mut() {
                *value = precision.cast(*value);
            }
        }
        self
    }
}

/// Conversion of numeric input into a detached [`Tensor`] at a target [`Precision`].
///
/// Implemented for the primitive numbers (as 0-d tensors), for `Vec`, slices and arrays of
/// them (1-d), for `Vec<Vec<_>>` (2-d, rejecting ragged rows), and for [`Tensor`] itself,
/// which is copied and cast without re-validating its contents.
pub trait IntoTensor {
    /// Perform the conversion.
    fn into_tensor(self, precision: Precision) -> Result<Tensor, ShapeError>;
}

/// Coerce an optional value, passing `None` through as "absent".
pub fn to_tensor<T: IntoTensor>(
    value: Option<T>,
    precision: Precision,
) -> Result<Option<Tensor>, ShapeError> {
    value.map(|value| value.into_tensor(precision)).transpose()
}

impl IntoTensor for Tensor {
    fn into_tensor(self, precision: Precision) -> Result<Tensor, ShapeError> {
        Ok(self.to_precision(precision))
    }
}

impl IntoTensor for &Tensor {
    fn into_tensor(self, precision: Precision) -> Result<Tensor, ShapeError> {
        Ok(self.clone().to_precision(precision))
    }
}

impl IntoTensor for bool {
    fn into_tensor(self, precision: Precision) -> Result<Tensor, ShapeError> {
        f64::from(u8::from(self)).into_tensor(precision)
    }
}

fn collect_rows<I, R>(rows: I, precision: Precision) -> Result<Tensor, ShapeError>
where
    I: ExactSizeIterator<Item = R>,
    R: AsRef<[f64]>,
{
    let num_rows = rows.len();
    let mut width = None;
    let mut data = Vec::new();
    for (row, values) in rows.enumerate() {
        let values = values.as_ref();
        let expected = *width.get_or_insert(values.len());
        if values.len() != expected {
            return Err(ShapeError::Ragged {
                row,
                expected,
                actual: values.len(),
            });
        }
        data.extend(values.iter().map(|v| precision.cast(*v)));
    }
    Tensor::from_shape_vec(&[num_rows, width.unwrap_or(0)], data)
}

macro_rules! into_tensor_numeric {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoTensor for $ty {
                fn into_tensor(self, precision: Precision) -> Result<Tensor, ShapeError> {
                    Ok(Tensor::scalar(precision.cast(self as f64)))
                }
            }

            impl IntoTensor for &[$ty] {
                fn into_tensor(self, precision: Precision) -> Result<Tensor, ShapeError> {
                    Ok(Tensor::from_vec(
                        self.iter().map(|v| precision.cast(*v as f64)).collect(),
                    ))
                }
            }

            impl IntoTensor for Vec<$ty> {
                fn into_tensor(self, precision: Precision) -> Result<Tensor, ShapeError> {
                    self.as_slice().into_tensor(precision)
                }
            }

            impl<const N: usize> IntoTensor for [$ty; N] {
                fn into_tensor(self, precision: Precision) -> Result<Tensor, ShapeError> {
                    self.as_slice().into_tensor(precision)
                }
            }

            impl IntoTensor for Vec<Vec<$ty>> {
                fn into_tensor(self, precision: Precision) -> Result<Tensor, ShapeError> {
                    let rows: Vec<Vec<f64>> = self
                        .into_iter()
                        .map(|row| row.into_iter().map(|v| v as f64).collect())
                        .collect();
                    collect_rows(rows.into_iter(), precision)
                }
            }
        )*
    };
}

into_tensor_numeric!(f32, f64, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);
