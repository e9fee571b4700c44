//! Markers and main-thread tasks of the renderer trace.

use super::{
    InvalidTraceError, Markers,
    raw::{EventData, TraceEvent},
};
use crate::{
    task::{Task, TaskEvent},
    time,
};
use std::time::Duration;

const NAVIGATION_START: &str = "navigationStart";
const FIRST_PAINT: &str = "firstPaint";
const FIRST_CONTENTFUL_PAINT: &str = "firstContentfulPaint";
const LARGEST_CONTENTFUL_PAINT: &str = "largestContentfulPaint::Candidate";
const DOM_CONTENT_LOADED: &str = "domContentLoadedEventEnd";
const LOAD: &str = "loadEventEnd";

/// Where the page load starts: the earliest `navigationStart` marker.
pub(super) struct Origin {
    pub ts: f64,
    pub pid: u64,
    pub tid: u64,
    pub document_url: Option<String>,
}

pub(super) fn find_navigation_start(events: &[TraceEvent]) -> Result<Origin, InvalidTraceError> {
    events
        .iter()
        .filter(|event| event.name == NAVIGATION_START)
        .min_by(|a, b| a.ts.total_cmp(&b.ts))
        .map(|event| Origin {
            ts: event.ts,
            pid: event.pid,
            tid: event.tid,
            document_url: event
                .args
                .data
                .as_ref()
                .and_then(|data| data.document_loader_url.clone()),
        })
        .ok_or(InvalidTraceError::NoNavigationStart {
            events: events.len(),
        })
}

impl Origin {
    fn relative(&self, ts: f64) -> Option<Duration> {
        let ms = (ts - self.ts) / 1_000.0;
        (ms >= 0.0).then(|| time::from_millis_f64(ms))
    }
}

pub(super) fn markers(
    events: &[TraceEvent],
    origin: &Origin,
) -> Result<Markers, InvalidTraceError> {
    let first = |name: &str| {
        events
            .iter()
            .filter(|event| event.name == name)
            .filter_map(|event| origin.relative(event.ts))
            .min()
    };

    let first_paint = first(FIRST_PAINT);
    let first_contentful_paint = first(FIRST_CONTENTFUL_PAINT)
        .or(first_paint)
        .ok_or(InvalidTraceError::NoFirstPaint {
            navigation_start_us: origin.ts,
        })?;

    // the last candidate wins
    let largest_contentful_paint = events
        .iter()
        .filter(|event| event.name == LARGEST_CONTENTFUL_PAINT)
        .filter_map(|event| origin.relative(event.ts))
        .max();

    let trace_end = events
        .iter()
        .filter_map(|event| origin.relative(event.end()))
        .max()
        .unwrap_or(Duration::ZERO);

    Ok(Markers {
        first_paint,
        first_contentful_paint,
        largest_contentful_paint,
        dom_content_loaded: first(DOM_CONTENT_LOADED),
        load: first(LOAD),
        trace_end,
    })
}

/// The tasks of the main thread after navigation start, nested.
///
/// Complete events carry the work, instant events (timer installs,
/// requests being sent) are nested as zero length tasks.
pub(super) fn main_thread_tasks(events: &[TraceEvent], origin: &Origin) -> Vec<Task> {
    let events = events
        .iter()
        .filter(|event| matches!(event.ph.as_str(), "X" | "I" | "i"))
        .filter(|event| event.pid == origin.pid && event.tid == origin.tid)
        .filter_map(|event| {
            let start = origin.relative(event.ts)?;
            let duration = time::from_millis_f64(event.dur.unwrap_or(0.0) / 1_000.0);
            Some(task_event(event, start, duration))
        })
        .collect();

    Task::forest(events)
}

fn task_event(event: &TraceEvent, start: Duration, duration: Duration) -> TaskEvent {
    let data = event.args.data.as_ref();
    let begin_data = event.args.begin_data.as_ref();

    let url = data
        .and_then(|data| data.url.clone().or_else(|| data.style_sheet_url.clone()))
        .or_else(|| begin_data.and_then(|data| data.url.clone()))
        .filter(|url| !url.is_empty());
    // XHR callbacks only depend on the response once it is complete
    let url = match data.and_then(|data| data.ready_state) {
        Some(state) if event.name == "XHRReadyStateChange" && state != 4 => None,
        _ => url,
    };

    let stack_urls = [data, begin_data]
        .into_iter()
        .flatten()
        .flat_map(|data: &EventData| data.stack_trace.iter().map(|frame| frame.url.clone()))
        .collect();

    let timer_id = data
        .and_then(|data| data.timer_id.as_ref())
        .map(|id| match id {
            serde_json::Value::String(id) => id.clone(),
            other => other.to_string(),
        });

    TaskEvent {
        name: event.name.clone(),
        start,
        duration,
        url,
        stack_urls,
        request_id: data.and_then(|data| data.request_id.clone()),
        timer_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::raw::RawCapture;

    fn trace(json: &str) -> Vec<TraceEvent> {
        let capture: RawCapture =
            serde_json::from_str(&format!(r#"{{ "traceEvents": {json} }}"#)).unwrap();
        capture.trace_events
    }

    #[test]
    fn navigation_start_required() {
        let events = trace(r#"[ { "name": "firstPaint", "ph": "R", "ts": 10 } ]"#);
        assert!(matches!(
            find_navigation_start(&events),
            Err(InvalidTraceError::NoNavigationStart { events: 1 })
        ));
    }

    #[test]
    fn first_paint_required() {
        let events = trace(r#"[ { "name": "navigationStart", "ph": "R", "ts": 10 } ]"#);
        let origin = find_navigation_start(&events).unwrap();
        assert!(matches!(
            markers(&events, &origin),
            Err(InvalidTraceError::NoFirstPaint { .. })
        ));
    }

    #[test]
    fn markers_relative_to_navigation_start() {
        let events = trace(
            r#"[
            { "name": "navigationStart", "ph": "R", "ts": 1000000, "pid": 1, "tid": 2 },
            { "name": "firstPaint", "ph": "R", "ts": 1900000 },
            { "name": "firstContentfulPaint", "ph": "R", "ts": 2000000 },
            { "name": "largestContentfulPaint::Candidate", "ph": "R", "ts": 2100000 },
            { "name": "largestContentfulPaint::Candidate", "ph": "R", "ts": 2500000 },
            { "name": "loadEventEnd", "ph": "R", "ts": 3000000 },
            { "name": "RunTask", "ph": "X", "ts": 3000000, "dur": 500000, "pid": 1, "tid": 2 }
        ]"#,
        );
        let origin = find_navigation_start(&events).unwrap();
        let markers = markers(&events, &origin).unwrap();
        assert_eq!(markers.first_paint, Some(Duration::from_millis(900)));
        assert_eq!(markers.first_contentful_paint, Duration::from_millis(1_000));
        assert_eq!(markers.largest_contentful_paint, Some(Duration::from_millis(1_500)));
        assert_eq!(markers.load, Some(Duration::from_millis(2_000)));
        assert_eq!(markers.dom_content_loaded, None);
        assert_eq!(markers.trace_end, Duration::from_millis(2_500));
    }

    #[test]
    fn main_thread_only() {
        let events = trace(
            r#"[
            { "name": "navigationStart", "ph": "R", "ts": 0, "pid": 1, "tid": 2 },
            { "name": "RunTask", "ph": "X", "ts": 1000, "dur": 20000, "pid": 1, "tid": 2 },
            { "name": "EvaluateScript", "ph": "X", "ts": 2000, "dur": 10000, "pid": 1, "tid": 2,
              "args": { "data": { "url": "https://a.com/app.js" } } },
            { "name": "RunTask", "ph": "X", "ts": 1000, "dur": 20000, "pid": 1, "tid": 3 },
            { "name": "TimerInstall", "ph": "I", "ts": 5000, "pid": 1, "tid": 2,
              "args": { "data": { "timerId": 12 } } }
        ]"#,
        );
        let origin = find_navigation_start(&events).unwrap();
        let tasks = main_thread_tasks(&events, &origin);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].duration, Duration::from_millis(20));
        assert_eq!(tasks[0].timers_installed, vec!["12".to_owned()]);
        assert_eq!(tasks[0].attributable_url.as_deref(), Some("https://a.com/app.js"));
    }

    #[test]
    fn timer_ids_as_strings() {
        let events = trace(
            r#"[ { "name": "TimerFire", "ph": "X", "ts": 0, "dur": 1,
                   "args": { "data": { "timerId": 12 } } } ]"#,
        );
        let event = task_event(&events[0], Duration::ZERO, Duration::ZERO);
        assert_eq!(event.timer_id.as_deref(), Some("12"));
    }
}
