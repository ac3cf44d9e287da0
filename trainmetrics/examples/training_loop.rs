// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Two data-parallel workers sharing an in-process group. Each logs its own loss and
//! episode returns; the distributed metrics come out identical on both workers.
//!
//! Run with `RUST_LOG=trainmetrics=debug` to see each collection.

use std::thread;

use trainmetrics::fakes::LocalProcessGroup;
use trainmetrics::{AccumulatedMetric, CollectOptions, LastValue, Mean, MetricsContext, Sum};

const ITERATIONS: usize = 3;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let workers: Vec<_> = LocalProcessGroup::new(2)
        .into_iter()
        .map(|peer| {
            thread::spawn(move || {
                let rank = peer.rank();
                let mut metrics = MetricsContext::builder()
                    .synchronizer(peer)
                    .default_aggregator(Mean::distributed)
                    .metric("env_steps", AccumulatedMetric::<Sum>::new())
                    .metric("learning_rate", LastValue::new())
                    .build();

                for iteration in 0..ITERATIONS {
                    let lr = 1e-3 / (iteration + 1) as f64;
                    for step in 0..4 {
                        let loss = 1.0 / (iteration * 4 + step + 1) as f64 + rank as f64 * 0.1;
                        metrics.log("loss", loss).unwrap();
                        metrics.log("env_steps", 128).unwrap();
                        metrics.log("learning_rate", lr).unwrap();
                    }
                    let returns = vec![10.0 * (rank + 1) as f64, 12.0, 8.0];
                    let episodes = returns.len() as f64;
                    metrics
                        .log_weighted("episode_return", returns.iter().sum::<f64>(), episodes)
                        .unwrap();

                    let collected = metrics.collect(CollectOptions::distributed()).unwrap();
                    println!("rank {rank} iteration {iteration}: {collected:.4}");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
}
