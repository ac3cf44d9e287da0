// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};

use crate::{SyncError, Synchronizer};

/// Fixed peer contributions, for deterministic single-threaded tests
///
/// Behaves as if this process were one member of a group whose other members always
/// contribute the same buffers. Every buffer passed to [`Synchronizer::all_reduce_sum`] is
/// recorded before reduction so tests can check exactly what was flattened.
#[derive(Debug, Default)]
pub struct StaticPeers {
    peers: Vec<Vec<f64>>,
    seen: Mutex<Vec<Vec<f64>>>,
}

impl StaticPeers {
    /// Create a group where each entry of `peers` is another process's contribution
    ///
    /// # Arguments
    ///
    /// * `peers` - The buffers contributed by the other processes, one per process
    ///
    /// # Returns
    ///
    /// A synchronizer whose world size is `peers.len() + 1`
    ///
    /// # Examples
    ///
    /// ```
    /// use trainmetrics_sync::{Synchronizer, fakes::StaticPeers};
    ///
    /// let group = StaticPeers::new([vec![30.0, 2.0]]);
    /// let mut values = [10.0, 2.0];
    /// group.all_reduce_mean(&mut values).unwrap();
    /// assert_eq!(values, [20.0, 2.0]);
    /// assert_eq!(group.seen(), vec![vec![10.0, 2.0]]);
    /// ```
    pub fn new(peers: impl IntoIterator<Item = Vec<f64>>) -> Self {
        Self {
            peers: peers.into_iter().collect(),
            seen: Mutex::default(),
        }
    }

    /// Every buffer this process contributed, in call order.
    pub fn seen(&self) -> Vec<Vec<f64>> {
        lock(&self.seen).clone()
    }
}

impl Synchronizer for StaticPeers {
    fn world_size(&self) -> Result<usize, SyncError> {
        Ok(self.peers.len() + 1)
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), SyncError> {
        lock(&self.seen).push(values.to_vec());
        for peer in &self.peers {
            if peer.len() != values.len() {
                return Err(SyncError::LengthMismatch {
                    expected: peer.len(),
                    actual: values.len(),
                });
            }
            for (value, contribution) in values.iter_mut().zip(peer) {
                *value += contribution;
            }
        }
        Ok(())
    }
}

/// An in-process group whose members are meant to run on separate threads
///
/// Each [`LocalPeer`] blocks in [`Synchronizer::all_reduce_sum`] until every member of the
/// group has called it, exactly like a real collective. Use one thread per peer.
#[derive(Debug)]
pub struct LocalProcessGroup;

impl LocalProcessGroup {
    /// Create `world_size` connected peers
    ///
    /// # Examples
    ///
    /// ```
    /// use std::thread;
    /// use trainmetrics_sync::{Synchronizer, fakes::LocalProcessGroup};
    ///
    /// let results: Vec<Vec<f64>> = LocalProcessGroup::new(2)
    ///     .into_iter()
    ///     .zip([1.0, 3.0])
    ///     .map(|(peer, value)| {
    ///         thread::spawn(move || {
    ///             let mut values = vec![value];
    ///             peer.all_reduce_mean(&mut values).unwrap();
    ///             values
    ///         })
    ///     })
    ///     .collect::<Vec<_>>()
    ///     .into_iter()
    ///     .map(|handle| handle.join().unwrap())
    ///     .collect();
    /// assert_eq!(results, vec![vec![2.0], vec![2.0]]);
    /// ```
    #[allow(clippy::new_ret_no_self)]
    pub fn new(world_size: usize) -> Vec<LocalPeer> {
        let shared = Arc::new(Shared {
            barrier: Barrier::new(world_size),
            round: Mutex::default(),
        });
        (0..world_size)
            .map(|rank| LocalPeer {
                rank,
                world_size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    round: Mutex<Round>,
}

#[derive(Debug, Default)]
struct Round {
    sum: Option<Vec<f64>>,
    mismatch: Option<SyncError>,
}

/// One member of a [`LocalProcessGroup`].
#[derive(Debug)]
pub struct LocalPeer {
    rank: usize,
    world_size: usize,
    shared: Arc<Shared>,
}

impl LocalPeer {
    /// Position of this peer in the group, starting at 0.
    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl Synchronizer for LocalPeer {
    fn world_size(&self) -> Result<usize, SyncError> {
        Ok(self.world_size)
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), SyncError> {
        {
            let mut round = lock(&self.shared.round);
            let Round { sum, mismatch } = &mut *round;
            match sum {
                None => *sum = Some(values.to_vec()),
                Some(sum) if sum.len() != values.len() => {
                    mismatch.get_or_insert(SyncError::LengthMismatch {
                        expected: sum.len(),
                        actual: values.len(),
                    });
                }
                Some(sum) => {
                    for (total, value) in sum.iter_mut().zip(values.iter()) {
                        *total += value;
                    }
                }
            }
        }

        // everyone has contributed
        self.shared.barrier.wait();
        let result = {
            let round = lock(&self.shared.round);
            match (&round.mismatch, &round.sum) {
                (Some(err), _) => Err(err.clone()),
                (None, Some(sum)) => {
                    values.copy_from_slice(sum);
                    Ok(())
                }
                (None, None) => Err(SyncError::Disconnected("no contributions".to_string())),
            }
        };

        // everyone has read the result; clear it before the next round can start
        if self.shared.barrier.wait().is_leader() {
            *lock(&self.shared.round) = Round::default();
        }
        self.shared.barrier.wait();
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
