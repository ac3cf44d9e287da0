#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod accumulated;
pub mod mean;
pub mod value;

pub use accumulated::{AccumulatedMetric, LastValue};
pub use mean::Mean;
pub use value::{AccumulateFn, AccumulateStrategy, KeepLast, Max, Min, Sum};
