mod support;

use std::collections::HashSet;

use folio::infra::telemetry::describe_metrics;
use metrics_util::debugging::DebuggingRecorder;

use support::{after_debounce, engine, seeded_repo};

#[tokio::test]
async fn listing_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    describe_metrics();

    let repo = seeded_repo(30);
    let engine = engine(repo.clone(), 10);

    // Miss then hit on every read layer.
    engine.listing.category_page_fragment("news", 1).await;
    engine.listing.category_page_fragment("news", 1).await;

    engine.scheduler.schedule("news").await.expect("scheduled");
    engine
        .worker
        .run_due(after_debounce())
        .await
        .expect("queue available");

    // A failing store makes the fast phase fail and get counted.
    repo.set_failing(true);
    engine.scheduler.schedule("news").await.expect("scheduled");
    let tick = engine
        .worker
        .run_due(after_debounce())
        .await
        .expect("queue available");
    assert_eq!(tick.failed, 1);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "folio_cache_hit_total",
        "folio_cache_miss_total",
        "folio_regeneration_ms",
        "folio_regeneration_failed_total",
        "folio_jobs_pending",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
