// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;
use trainmetrics_core::Report;
use trainmetrics_sync::{SyncError, Synchronizer};

/// Options for [`MetricsContext::collect`](crate::MetricsContext::collect).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectOptions {
    /// Average distributed-flagged metrics across the process group.
    pub distributed: bool,
    /// Report raw accumulators (see [`Report::FullStats`]) instead of ratios.
    pub full_stats: bool,
}

impl CollectOptions {
    /// Collect locally computed values only.
    pub const fn local() -> Self {
        Self {
            distributed: false,
            full_stats: false,
        }
    }

    /// Collect and average distributed-flagged metrics across the process group.
    pub const fn distributed() -> Self {
        Self {
            distributed: true,
            full_stats: false,
        }
    }

    /// Also request full stats.
    pub const fn with_full_stats(self) -> Self {
        Self {
            full_stats: true,
            ..self
        }
    }
}

/// The error cases for a distributed collection.
///
/// By the time either is returned every aggregator has already been reset.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CollectError {
    /// Distributed collection was requested but the context has no synchronizer.
    NoSynchronizer,
    /// The synchronizer failed.
    Sync(SyncError),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSynchronizer => {
                f.write_str("distributed collection requested but no synchronizer is configured")
            }
            Self::Sync(err) => write!(f, "failed to synchronize metrics: {err}"),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoSynchronizer => None,
            Self::Sync(err) => Some(err),
        }
    }
}

impl From<SyncError> for CollectError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

/// The reports produced by one collection, in the context's insertion order.
///
/// Equality compares names and reports, not their order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    entries: IndexMap<String, Report>,
}

impl Collected {
    /// The report for `name`, if that metric was collected.
    pub fn get(&self, name: &str) -> Option<Report> {
        self.entries.get(name).copied()
    }

    /// The single value reported for `name`; `None` if absent or a full-stats pair.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name)?.value()
    }

    /// Number of collected metrics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metric names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(name, report)` pairs, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Report)> {
        self.entries
            .iter()
            .map(|(name, report)| (name.as_str(), *report))
    }

    pub(crate) fn push(&mut self, name: String, report: Report) {
        self.entries.insert(name, report);
    }

    /// Average the reports flagged in `distributed` across the group, in place.
    ///
    /// All flagged reports are flattened into one buffer so the whole collection costs a
    /// single collective, then scattered back in the same order.
    pub(crate) fn synchronize(
        &mut self,
        distributed: &[bool],
        synchronizer: &dyn Synchronizer,
    ) -> Result<(), SyncError> {
        let mut flat = Vec::new();
        for (report, _) in self
            .entries
            .values()
            .zip_eq(distributed)
            .filter(|(_, flagged)| **flagged)
        {
            report.flatten_into(&mut flat);
        }

        synchronizer.all_reduce_mean(&mut flat)?;

        let mut rest = flat.as_slice();
        for (report, _) in self
            .entries
            .values_mut()
            .zip_eq(distributed)
            .filter(|(_, flagged)| **flagged)
        {
            let (head, tail) = rest.split_at(report.flat_len());
            *report = report.with_flat(head);
            rest = tail;
        }
        Ok(())
    }
}

impl IntoIterator for Collected {
    type Item = (String, Report);
    type IntoIter = indexmap::map::IntoIter<String, Report>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// format options like `{:.3}` apply to every reported number
impl fmt::Display for Collected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, (name, report)) in self.entries.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: ")?;
            fmt::Display::fmt(report, f)?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Collected {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, report) in &self.entries {
            map.serialize_entry(name, report)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use trainmetrics_core::Report;
    use trainmetrics_sync::fakes::StaticPeers;

    use super::Collected;

    fn collected(entries: &[(&str, Report)]) -> Collected {
        let mut collected = Collected::default();
        for (name, report) in entries {
            collected.push(name.to_string(), *report);
        }
        collected
    }

    #[test]
    fn only_flagged_reports_are_flattened() {
        let mut reports = collected(&[
            ("local", Report::Value(100.0)),
            (
                "return",
                Report::FullStats {
                    sum: 10.0,
                    count: 2.0,
                },
            ),
            ("entropy", Report::Value(1.0)),
        ]);
        let peers = StaticPeers::new([vec![30.0, 2.0, 3.0]]);

        reports.synchronize(&[false, true, true], &peers).unwrap();

        check!(peers.seen() == vec![vec![10.0, 2.0, 1.0]]);
        check!(reports.get("local") == Some(Report::Value(100.0)));
        check!(
            reports.get("return")
                == Some(Report::FullStats {
                    sum: 20.0,
                    count: 2.0
                })
        );
        check!(reports.get("entropy") == Some(Report::Value(2.0)));
    }

    #[test]
    fn nothing_flagged_still_joins_the_collective() {
        let mut reports = collected(&[("loss", Report::Value(1.0))]);
        let peers = StaticPeers::new([vec![]]);
        reports.synchronize(&[false], &peers).unwrap();
        check!(peers.seen() == vec![Vec::<f64>::new()]);
        check!(reports.value("loss") == Some(1.0));
    }

    #[test]
    fn display_forwards_precision() {
        let reports = collected(&[
            ("loss", Report::Value(2.0 / 3.0)),
            (
                "return",
                Report::FullStats {
                    sum: 1.0,
                    count: 4.0,
                },
            ),
        ]);
        check!(format!("{reports:.2}") == "loss: 0.67, return: (1.00, 4.00)");
        check!(Collected::default().to_string() == "");
    }
}
