//! Metrics as the capture observed them.
//!
//! Used with [`ThrottlingMethod::Provided`](crate::ThrottlingMethod::Provided),
//! when the page was loaded under the target conditions already.

use crate::Error;
use lantern_core::{
    quiet::{QuietPeriodScan, QuietPeriods},
    time::as_millis_f64,
    trace::PageCapture,
};
use tracing::debug;

pub fn first_contentful_paint(capture: &PageCapture) -> f64 {
    as_millis_f64(capture.markers.first_contentful_paint)
}

pub fn largest_contentful_paint(capture: &PageCapture) -> Result<f64, Error> {
    capture
        .markers
        .largest_contentful_paint
        .map(as_millis_f64)
        .ok_or(Error::MissingMarker {
            marker: "largestContentfulPaint",
        })
}

/// The quiet periods of the capture following its first contentful paint.
pub fn quiet_periods(capture: &PageCapture) -> Result<QuietPeriods, Error> {
    let scan = QuietPeriodScan::new(
        first_contentful_paint(capture),
        as_millis_f64(capture.markers.trace_end),
    );
    Ok(scan.run(&capture.records, &capture.tasks)?)
}

/// Start of the first window where both the network and the main thread
/// went quiet, never before the first contentful paint or the
/// `DOMContentLoaded` event.
pub fn interactive(capture: &PageCapture) -> Result<f64, Error> {
    let periods = quiet_periods(capture)?;
    let joint = periods.joint();

    let dom_content_loaded = capture.markers.dom_content_loaded.map_or(0.0, as_millis_f64);
    let timing_ms = joint
        .start_ms
        .max(first_contentful_paint(capture))
        .max(dom_content_loaded);

    debug!(
        timing_ms,
        cpu_quiet = periods.cpu_quiet_period.start_ms,
        network_quiet = periods.network_quiet_period.start_ms,
        "observed interactive"
    );
    Ok(timing_ms)
}
