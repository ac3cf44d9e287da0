// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::thread;

use assert2::{check, let_assert};
use rstest::rstest;
use trainmetrics::fakes::{LocalProcessGroup, StaticPeers};
use trainmetrics::{
    AccumulateFn, AccumulatedMetric, CollectError, CollectOptions, Collected, LastValue, Max, Mean,
    MetricsContext, Precision, Report, Sum, SyncError, UpdateError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn collect_reports_then_resets() {
    init_tracing();
    let mut metrics = MetricsContext::new();
    metrics.log("loss", 2.0).unwrap();
    metrics.log("loss", 4.0).unwrap();

    let collected = metrics.collect(CollectOptions::local()).unwrap();
    check!(collected.get("loss") == Some(Report::Value(3.0)));

    let collected = metrics.collect(CollectOptions::local()).unwrap();
    check!(collected.get("loss") == Some(Report::Value(0.0)));
    check!(metrics.contains("loss"));
}

#[test]
fn preconfigured_last_value() {
    let mut metrics = MetricsContext::new();
    metrics.insert("reward", LastValue::new());
    metrics.log("reward", 1).unwrap();
    metrics.log("reward", 5).unwrap();

    let collected = metrics.collect(CollectOptions::local()).unwrap();
    check!(collected.value("reward") == Some(5.0));
}

#[test]
fn removed_metric_is_recreated_last() {
    let mut metrics = MetricsContext::new();
    metrics.insert("reward", LastValue::new());
    metrics.log("loss", 1.0).unwrap();
    metrics.log("reward", 7.0).unwrap();

    check!(metrics.remove("reward").is_some());
    metrics.log("reward", 2.0).unwrap();
    metrics.log("reward", 4.0).unwrap();

    let collected = metrics.collect(CollectOptions::local()).unwrap();
    check!(collected.names().collect::<Vec<_>>() == ["loss", "reward"]);
    // recreated as the default mean, not the removed last-value
    check!(collected.value("reward") == Some(3.0));
}

#[test]
fn batches_and_weights() {
    let mut metrics = MetricsContext::new();
    metrics.log("advantage", vec![1.0, 2.0, 3.0]).unwrap();
    metrics
        .log("advantage", vec![vec![4.0, 5.0], vec![6.0, 7.0]])
        .unwrap();
    metrics.log_weighted("return", 10.0, 2.0).unwrap();
    metrics.log_weighted("return", 30.0, 2.0).unwrap();

    let collected = metrics
        .collect(CollectOptions::local().with_full_stats())
        .unwrap();
    check!(
        collected.get("advantage")
            == Some(Report::FullStats {
                sum: 28.0,
                count: 7.0
            })
    );
    check!(
        collected.get("return")
            == Some(Report::FullStats {
                sum: 40.0,
                count: 4.0
            })
    );
}

#[test]
fn update_errors_leave_state_untouched() {
    let mut metrics = MetricsContext::new();
    metrics.insert("reward", LastValue::new());
    metrics.log("reward", 3.0).unwrap();

    let_assert!(Err(UpdateError::Shape(_)) = metrics.log("reward", vec![1.0, 2.0]));
    let_assert!(
        Err(UpdateError::UnexpectedWeight { .. }) = metrics.log_weighted("reward", 1.0, 1.0)
    );
    let_assert!(Err(UpdateError::Shape(_)) = metrics.log("ragged", vec![vec![1.0], vec![]]));

    let collected = metrics.collect(CollectOptions::local()).unwrap();
    check!(collected.value("reward") == Some(3.0));
}

#[test]
fn closure_without_function_fails_every_update() {
    let mut metrics = MetricsContext::new();
    metrics.insert("custom", AccumulatedMetric::<AccumulateFn>::new());
    let_assert!(Err(UpdateError::MissingAccumulateFn) = metrics.log("custom", 1.0));
}

#[rstest]
#[case::single(Precision::Single, 0.1_f32 as f64)]
#[case::double(Precision::Double, 0.1)]
fn values_are_coerced_to_the_context_precision(
    #[case] precision: Precision,
    #[case] expected: f64,
) {
    let mut metrics = MetricsContext::builder().precision(precision).build();
    metrics.insert("lr", LastValue::new());
    metrics.log("lr", 0.1_f64).unwrap();
    check!(metrics.precision() == precision);
    let collected = metrics.collect(CollectOptions::local()).unwrap();
    check!(collected.value("lr") == Some(expected));
}

#[test]
fn every_aggregator_reports_zero_after_collect() {
    let mut metrics = MetricsContext::new();
    metrics.insert("reward", LastValue::new());
    metrics.insert("env_steps", AccumulatedMetric::<Sum>::new());
    metrics.log("reward", 7).unwrap();
    metrics.log("env_steps", 128).unwrap();
    metrics.log("env_steps", 128).unwrap();
    metrics.log("loss", 0.5).unwrap();

    let collected = metrics.collect(CollectOptions::local()).unwrap();
    check!(collected.value("reward") == Some(7.0));
    check!(collected.value("env_steps") == Some(256.0));

    for (name, aggregator) in metrics.iter() {
        check!(aggregator.report(false) == Report::Value(0.0), "{name} was not reset");
    }
    let collected = metrics.collect(CollectOptions::local()).unwrap();
    check!(collected.to_string() == "reward: 0, env_steps: 0, loss: 0");
}

#[test]
fn missing_synchronizer_still_resets() {
    let mut metrics = MetricsContext::new();
    metrics.insert("return", Mean::distributed());
    metrics.log("return", 5.0).unwrap();

    let_assert!(
        Err(CollectError::NoSynchronizer) = metrics.collect(CollectOptions::distributed())
    );

    let collected = metrics.collect(CollectOptions::local()).unwrap();
    check!(collected.value("return") == Some(0.0));
}

#[test]
fn failed_synchronization_still_resets() {
    let mut metrics = MetricsContext::builder()
        .synchronizer(StaticPeers::new([vec![1.0, 2.0, 3.0]]))
        .metric("return", Mean::distributed())
        .build();
    metrics.log("return", 5.0).unwrap();

    let_assert!(
        Err(CollectError::Sync(SyncError::LengthMismatch { .. })) =
            metrics.collect(CollectOptions::distributed())
    );
    check!(
        metrics.get("return").unwrap().report(true)
            == Report::FullStats {
                sum: 0.0,
                count: 0.0
            }
    );
}

#[test]
fn local_metrics_are_not_synchronized() {
    let peers = StaticPeers::new([vec![9.0]]);
    let mut metrics = MetricsContext::new();
    metrics.insert("steps", AccumulatedMetric::<Max>::new());
    metrics.insert("reward", LastValue::distributed());
    metrics.log("steps", 4).unwrap();
    metrics.log("reward", 1).unwrap();

    let collected = metrics.collect_with(&peers, false).unwrap();
    check!(peers.seen() == vec![vec![1.0]]);
    check!(collected.value("steps") == Some(4.0));
    check!(collected.value("reward") == Some(5.0));
}

#[test]
fn distributed_mean_across_threads() {
    init_tracing();
    let handles: Vec<_> = LocalProcessGroup::new(2)
        .into_iter()
        .map(|peer| {
            thread::spawn(move || {
                let rank = peer.rank();
                let mut metrics = MetricsContext::builder()
                    .synchronizer(peer)
                    .metric("return", Mean::distributed())
                    .build();
                metrics.log("local", rank as f64).unwrap();
                let value = if rank == 0 { 10.0 } else { 30.0 };
                metrics.log_weighted("return", value, 2.0).unwrap();
                metrics
                    .collect(CollectOptions::distributed().with_full_stats())
                    .unwrap()
            })
        })
        .collect();

    for (rank, handle) in handles.into_iter().enumerate() {
        let collected = handle.join().unwrap();
        check!(
            collected.get("return")
                == Some(Report::FullStats {
                    sum: 20.0,
                    count: 2.0
                })
        );
        check!(
            collected.get("local")
                == Some(Report::FullStats {
                    sum: rank as f64,
                    count: 1.0
                })
        );
    }
}

#[test]
fn display_snapshot() {
    let mut metrics = MetricsContext::new();
    metrics.insert("reward", LastValue::new());
    metrics.log("loss", vec![0.25, 0.5]).unwrap();
    metrics.log("reward", 5).unwrap();
    metrics.log_weighted("return", 12.0, 4.0).unwrap();

    let collected = metrics.collect(CollectOptions::local()).unwrap();
    insta::assert_snapshot!(collected.to_string(), @"reward: 5, loss: 0.375, return: 3");
    insta::assert_snapshot!(format!("{collected:.1}"), @"reward: 5.0, loss: 0.4, return: 3.0");
}

#[test]
fn serializes_as_a_map() {
    let mut metrics = MetricsContext::new();
    metrics.log("loss", 3.0).unwrap();
    metrics.log_weighted("return", 10.0, 2.0).unwrap();

    let collected = metrics
        .collect(CollectOptions::local().with_full_stats())
        .unwrap();
    check!(
        serde_json::to_value(&collected).unwrap()
            == serde_json::json!({"loss": [3.0, 1.0], "return": [10.0, 2.0]})
    );
    check!(serde_json::to_string(&Collected::default()).unwrap() == "{}");
}

#[test]
fn serialization_keeps_insertion_order() {
    let mut metrics = MetricsContext::new();
    metrics.insert("zeta", LastValue::new());
    metrics.log("zeta", 1.0).unwrap();
    metrics.log("alpha", 2.0).unwrap();
    metrics.log("mid", 3.0).unwrap();

    let collected = metrics.collect(CollectOptions::local()).unwrap();
    check!(serde_json::to_string(&collected).unwrap() == r#"{"zeta":1.0,"alpha":2.0,"mid":3.0}"#);
}
