use crate::{
    ComputeCache, Error, Settings, ThrottlingMethod,
    metrics::{
        Extras, FirstContentfulPaint, Interactive, LargestContentfulPaint, Metric, MetricEstimate,
        SpeedIndex,
    },
    observed,
};
use lantern_core::trace::PageCapture;
use serde::Serialize;
use tracing::{info, warn};

/// What could be said about one metric.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MetricOutcome {
    Estimated(MetricEstimate),
    Observed { timing_ms: f64 },
    NotApplicable { reason: String },
}

impl MetricOutcome {
    pub fn timing_ms(&self) -> Option<f64> {
        match self {
            Self::Estimated(estimate) => Some(estimate.timing_ms),
            Self::Observed { timing_ms } => Some(*timing_ms),
            Self::NotApplicable { .. } => None,
        }
    }

    pub fn as_estimate(&self) -> Option<&MetricEstimate> {
        match self {
            Self::Estimated(estimate) => Some(estimate),
            _ => None,
        }
    }

    /// Errors the other metrics survive become [`Self::NotApplicable`].
    fn recover(metric: &str, result: Result<Self, Error>) -> Result<Self, Error> {
        match result {
            Err(error) if error.is_recoverable() => {
                warn!(metric, %error, "metric not applicable");
                Ok(Self::NotApplicable {
                    reason: error.to_string(),
                })
            }
            result => result,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub first_contentful_paint: MetricOutcome,
    pub largest_contentful_paint: MetricOutcome,
    pub interactive: MetricOutcome,
    pub speed_index: MetricOutcome,
}

/// Every metric of `capture`.
///
/// Simulated metrics share the dependency graph and the simulations kept
/// in `cache`. A capture without a largest contentful paint marker, or
/// without a quiet window to be interactive in, still gets its other
/// metrics.
pub fn report(
    capture: &PageCapture,
    settings: &Settings,
    cache: &ComputeCache,
) -> Result<Report, Error> {
    let report = match settings.throttling_method {
        ThrottlingMethod::Simulate => simulated(capture, settings, cache)?,
        ThrottlingMethod::Provided => provided(capture)?,
    };

    info!(
        method = ?settings.throttling_method,
        fcp = ?report.first_contentful_paint.timing_ms(),
        lcp = ?report.largest_contentful_paint.timing_ms(),
        interactive = ?report.interactive.timing_ms(),
        speed_index = ?report.speed_index.timing_ms(),
        "page load measured"
    );
    Ok(report)
}

fn simulated(
    capture: &PageCapture,
    settings: &Settings,
    cache: &ComputeCache,
) -> Result<Report, Error> {
    let fcp = FirstContentfulPaint.compute(capture, settings, cache, &Extras::default())?;
    let extras = Extras {
        first_contentful_paint: Some(&fcp),
    };

    let largest_contentful_paint = if capture.markers.largest_contentful_paint.is_some() {
        MetricOutcome::Estimated(LargestContentfulPaint.compute(capture, settings, cache, &extras)?)
    } else {
        MetricOutcome::NotApplicable {
            reason: Error::MissingMarker {
                marker: "largestContentfulPaint",
            }
            .to_string(),
        }
    };
    let interactive = Interactive.compute(capture, settings, cache, &extras)?;
    let speed_index = SpeedIndex.compute(capture, settings, cache, &extras)?;

    Ok(Report {
        first_contentful_paint: MetricOutcome::Estimated(fcp),
        largest_contentful_paint,
        interactive: MetricOutcome::Estimated(interactive),
        speed_index: MetricOutcome::Estimated(speed_index),
    })
}

fn provided(capture: &PageCapture) -> Result<Report, Error> {
    let measured = |timing_ms| MetricOutcome::Observed { timing_ms };

    let largest_contentful_paint = match observed::largest_contentful_paint(capture) {
        Ok(timing_ms) => measured(timing_ms),
        Err(error) => MetricOutcome::NotApplicable {
            reason: error.to_string(),
        },
    };
    let interactive = MetricOutcome::recover(
        Interactive::NAME,
        observed::interactive(capture).map(measured),
    )?;

    Ok(Report {
        first_contentful_paint: measured(observed::first_contentful_paint(capture)),
        largest_contentful_paint,
        interactive,
        // the capture holds no screenshots to compute it from
        speed_index: MetricOutcome::NotApplicable {
            reason: "Speed Index cannot be observed without screenshots".to_owned(),
        },
    })
}
