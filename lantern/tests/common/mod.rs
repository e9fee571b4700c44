use lantern::{
    PageCapture,
    record::{Initiator, NetworkRecord, Priority, RequestId, ResourceType},
    task::{EVALUATE_SCRIPT, LAYOUT, PARSE_HTML, Task, TaskEvent},
    trace::Markers,
};
use std::{sync::Arc, time::Duration};

pub const DOCUMENT: &str = "https://example.com/";

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn request(
    id: &str,
    url: &str,
    resource_type: ResourceType,
    priority: Priority,
    (start, end): (u64, u64),
    transfer_size: u64,
) -> NetworkRecord {
    NetworkRecord {
        resource_type,
        priority,
        start_time: ms(start),
        response_headers_end_time: ms(start + (end - start) / 2),
        end_time: ms(end),
        transfer_size,
        initiator: Initiator::parser(DOCUMENT),
        ..NetworkRecord::new(RequestId::new(id), url)
    }
}

/// A small page: a document, a stylesheet, two scripts, a hero image and
/// a script loaded by the main bundle, plus the main-thread work they
/// cause.
///
/// | request | type | priority | observed |
/// |---|---|---|---|
/// | `/` | document | very high | 0..600 |
/// | `/style.css` | stylesheet | very high | 650..900 |
/// | `/app.js` | script | high | 650..1000 |
/// | `/analytics.js` | script | low | 700..1200 |
/// | `/hero.jpg` | image | low | 700..1500 |
/// | `cdn.example.net/lazy.js` | script | medium | 1800..2200 |
///
/// Markers: FCP 1500, LCP 2000, DOMContentLoaded 1300, trace end 12000.
pub fn capture() -> PageCapture {
    capture_with_markers(markers())
}

pub fn markers() -> Markers {
    Markers {
        largest_contentful_paint: Some(ms(2_000)),
        dom_content_loaded: Some(ms(1_300)),
        ..Markers::new(ms(1_500), ms(12_000))
    }
}

pub fn capture_with_markers(markers: Markers) -> PageCapture {
    let document = NetworkRecord {
        initiator: Initiator::default(),
        ..request("1", DOCUMENT, ResourceType::Document, Priority::VeryHigh, (0, 600), 20_000)
    };
    let lazy = NetworkRecord {
        initiator: Initiator::script(["https://example.com/app.js"]),
        ..request(
            "6",
            "https://cdn.example.net/lazy.js",
            ResourceType::Script,
            Priority::Medium,
            (1_800, 2_200),
            20_000,
        )
    };
    let records = vec![
        document,
        request(
            "2",
            "https://example.com/style.css",
            ResourceType::Stylesheet,
            Priority::VeryHigh,
            (650, 900),
            10_000,
        ),
        request(
            "3",
            "https://example.com/app.js",
            ResourceType::Script,
            Priority::High,
            (650, 1_000),
            60_000,
        ),
        request(
            "4",
            "https://example.com/analytics.js",
            ResourceType::Script,
            Priority::Low,
            (700, 1_200),
            30_000,
        ),
        request(
            "5",
            "https://example.com/hero.jpg",
            ResourceType::Image,
            Priority::Low,
            (700, 1_500),
            80_000,
        ),
        lazy,
    ];

    let events = vec![
        TaskEvent::new(PARSE_HTML, ms(610), ms(40)).with_url(DOCUMENT),
        TaskEvent::new(EVALUATE_SCRIPT, ms(1_050), ms(300)).with_url("https://example.com/app.js"),
        TaskEvent::new(LAYOUT, ms(1_400), ms(80)),
        TaskEvent::new(EVALUATE_SCRIPT, ms(2_300), ms(150))
            .with_url("https://cdn.example.net/lazy.js"),
        // too short to be part of the graph
        TaskEvent::new("RunTask", ms(2_600), ms(5)),
    ];

    PageCapture::new(
        records.into_iter().map(Arc::new).collect(),
        Task::forest(events).into_iter().map(Arc::new).collect(),
        markers,
    )
}
