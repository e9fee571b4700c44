mod common;

use lantern::{
    CacheStats, ComputeCache, EstimateStrategy, Error, MetricOutcome, PageCapture, Settings,
    ThrottlingMethod, ThrottlingProfile,
    metrics::{Extras, FirstContentfulPaint, Interactive, LargestContentfulPaint, Metric},
    record::{NetworkRecord, RequestId, ResourceType},
    report,
    trace::Markers,
};
use std::{sync::Arc, time::Duration};

fn estimate(outcome: &MetricOutcome) -> &lantern::metrics::MetricEstimate {
    outcome.as_estimate().expect("simulated metric")
}

#[test]
fn interactive_graphs() {
    let capture = common::capture();
    let settings = Settings::default();
    let cache = ComputeCache::new();

    let fcp = FirstContentfulPaint
        .compute(&capture, &settings, &cache, &Extras::default())
        .unwrap();
    let extras = Extras {
        first_contentful_paint: Some(&fcp),
    };
    let interactive = Interactive.compute(&capture, &settings, &cache, &extras).unwrap();

    // the hero image is the only request left out
    assert_eq!(interactive.optimistic_estimate.node_timings.len(), 9);
    assert_eq!(interactive.pessimistic_estimate.node_timings.len(), 10);
    assert_eq!(interactive.pessimistic_graph.len(), 10);

    for strategy in EstimateStrategy::ALL {
        assert!(interactive.estimate(strategy).time_in_ms >= fcp.estimate(strategy).time_in_ms);
    }
}

#[test]
fn paint_graphs() {
    let capture = common::capture();
    let settings = Settings::default();
    let cache = ComputeCache::new();

    let fcp = FirstContentfulPaint
        .compute(&capture, &settings, &cache, &Extras::default())
        .unwrap();
    // render blocking requests and the tasks before the paint
    assert_eq!(fcp.optimistic_graph.len(), 6);
    assert_eq!(fcp.pessimistic_graph.len(), 8);

    // nothing that mattered ran between the two paints: same graphs, same
    // simulations
    let lcp = LargestContentfulPaint
        .compute(&capture, &settings, &cache, &Extras::default())
        .unwrap();
    assert_eq!(lcp.optimistic_graph.fingerprint(), fcp.optimistic_graph.fingerprint());
    assert_eq!(lcp.timing_ms, fcp.timing_ms);
    assert_eq!(cache.stats(), CacheStats { hits: 3, misses: 3 });
}

#[test]
fn simulated_report() {
    let capture = common::capture();
    let cache = ComputeCache::new();
    let report = report(&capture, &Settings::default(), &cache).unwrap();

    let fcp = estimate(&report.first_contentful_paint);
    let lcp = estimate(&report.largest_contentful_paint);
    let interactive = estimate(&report.interactive);
    let speed_index = estimate(&report.speed_index);

    assert!(fcp.timing_ms > 0.0);
    assert_eq!(fcp.timing_ms, lcp.timing_ms);
    for strategy in EstimateStrategy::ALL {
        let fcp = fcp.estimate(strategy).time_in_ms;
        assert!(interactive.estimate(strategy).time_in_ms >= fcp);
        assert!(speed_index.estimate(strategy).time_in_ms >= fcp);
    }

    // one graph, four simulated graphs: both paint graphs are shared, and
    // speed index reuses the first paint and the full graph
    assert_eq!(cache.stats(), CacheStats { hits: 7, misses: 5 });

    let again = lantern::report(&capture, &Settings::default(), &cache).unwrap();
    assert_eq!(again.interactive.timing_ms(), report.interactive.timing_ms());
    assert_eq!(cache.stats().misses, 5);
}

#[test]
fn faster_conditions_are_faster() {
    let capture = common::capture();
    let cache = ComputeCache::new();

    let mobile = report(&capture, &Settings::default(), &cache).unwrap();
    let desktop_settings = Settings {
        throttling: ThrottlingProfile::desktop_dense_4g(),
        ..Settings::default()
    };
    let desktop = report(&capture, &desktop_settings, &cache).unwrap();

    assert!(desktop.first_contentful_paint.timing_ms() < mobile.first_contentful_paint.timing_ms());
    assert!(desktop.interactive.timing_ms() < mobile.interactive.timing_ms());
}

#[test]
fn missing_largest_contentful_paint() {
    let markers = Markers {
        largest_contentful_paint: None,
        ..common::markers()
    };
    let capture = common::capture_with_markers(markers);
    let cache = ComputeCache::new();

    let report = report(&capture, &Settings::default(), &cache).unwrap();
    assert!(matches!(
        report.largest_contentful_paint,
        MetricOutcome::NotApplicable { .. }
    ));
    assert!(report.first_contentful_paint.timing_ms().is_some());

    let error = LargestContentfulPaint
        .compute(&capture, &Settings::default(), &cache, &Extras::default())
        .unwrap_err();
    assert!(matches!(error, Error::MissingMarker { .. }));
}

#[test]
fn provided_report() {
    let capture = common::capture();
    let settings = Settings::default().set_throttling_method(ThrottlingMethod::Provided);
    let cache = ComputeCache::new();

    let report = report(&capture, &settings, &cache).unwrap();
    assert_eq!(report.first_contentful_paint.timing_ms(), Some(1_500.0));
    assert_eq!(report.largest_contentful_paint.timing_ms(), Some(2_000.0));
    // after the lazy script ran
    assert_eq!(report.interactive.timing_ms(), Some(2_450.0));
    assert_eq!(report.speed_index.timing_ms(), None);

    // nothing was simulated
    assert_eq!(cache.stats(), CacheStats::default());
}

#[test]
fn no_idle_period() {
    let request = NetworkRecord {
        resource_type: ResourceType::Document,
        end_time: Duration::from_millis(1_900),
        ..NetworkRecord::new(RequestId::new("1"), common::DOCUMENT)
    };
    let capture = PageCapture::new(
        vec![Arc::new(request)],
        Vec::new(),
        Markers::new(Duration::from_millis(2_500), Duration::from_millis(7_500)),
    );
    let settings = Settings::default().set_throttling_method(ThrottlingMethod::Provided);

    let report = report(&capture, &settings, &ComputeCache::new()).unwrap();
    assert_eq!(report.first_contentful_paint.timing_ms(), Some(2_500.0));
    let MetricOutcome::NotApplicable { reason } = &report.interactive else {
        panic!("interactive should not be applicable");
    };
    assert_eq!(reason, "No idle period after 2500ms, trace ends at 7500ms");
}

#[test]
fn report_serializes() {
    let capture = common::capture();
    let report = report(&capture, &Settings::default(), &ComputeCache::new()).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["firstContentfulPaint"]["kind"], "estimated");
    assert!(json["firstContentfulPaint"]["timingMs"].is_number());
    assert!(json["interactive"]["optimisticEstimate"]["nodeTimings"].is_object());
}

#[test]
fn capture_from_json() {
    let json = r#"{
        "traceEvents": [
            { "name": "navigationStart", "ph": "R", "ts": 1000000, "pid": 1, "tid": 1 },
            { "name": "ParseHTML", "ph": "X", "ts": 1320000, "dur": 30000, "pid": 1, "tid": 1,
              "args": { "beginData": { "url": "https://example.com/" } } },
            { "name": "firstContentfulPaint", "ph": "R", "ts": 1500000, "pid": 1, "tid": 1 },
            { "name": "RunTask", "ph": "X", "ts": 1600000, "dur": 10000, "pid": 1, "tid": 1 }
        ],
        "networkEvents": [
            { "method": "Network.requestWillBeSent",
              "params": { "requestId": "1", "timestamp": 1.0, "type": "Document",
                          "request": { "url": "https://example.com/", "initialPriority": "VeryHigh" } } },
            { "method": "Network.responseReceived",
              "params": { "requestId": "1", "timestamp": 1.2, "type": "Document",
                          "response": { "url": "https://example.com/", "status": 200,
                                        "mimeType": "text/html", "protocol": "http/1.1" } } },
            { "method": "Network.loadingFinished",
              "params": { "requestId": "1", "timestamp": 1.3, "encodedDataLength": 5000 } }
        ]
    }"#;
    let capture = PageCapture::from_json(json).unwrap();
    assert_eq!(capture.records.len(), 1);

    let cache = ComputeCache::new();
    let simulated = report(&capture, &Settings::default(), &cache).unwrap();
    assert!(simulated.first_contentful_paint.timing_ms().is_some_and(|ms| ms > 0.0));

    let provided = report(
        &capture,
        &Settings::default().set_throttling_method(ThrottlingMethod::Provided),
        &cache,
    )
    .unwrap();
    assert_eq!(provided.first_contentful_paint.timing_ms(), Some(500.0));
}
