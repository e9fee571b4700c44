use super::{Coefficients, Metric, paint_graph};
use crate::{Error, Settings};
use lantern_core::{graph::DependencyGraph, trace::PageCapture};
use std::{sync::Arc, time::Duration};

/// Largest Contentful Paint, the graphs of
/// [`FirstContentfulPaint`](super::FirstContentfulPaint) cut at the last
/// largest contentful paint candidate.
///
/// Images are left out of the optimistic graph: the largest element may
/// well be text.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargestContentfulPaint;

fn cutoff(capture: &PageCapture) -> Result<Duration, Error> {
    capture
        .markers
        .largest_contentful_paint
        .ok_or(Error::MissingMarker {
            marker: "largestContentfulPaint",
        })
}

impl Metric for LargestContentfulPaint {
    const NAME: &'static str = "largest-contentful-paint";

    fn coefficients(&self, _settings: &Settings) -> Coefficients {
        Coefficients::new(0.0, 0.5, 0.5)
    }

    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        capture: &PageCapture,
    ) -> Result<Arc<DependencyGraph>, Error> {
        paint_graph(graph, cutoff(capture)?, |network| {
            network.is_render_blocking() && !network.is_image()
        })
    }

    fn pessimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        capture: &PageCapture,
    ) -> Result<Arc<DependencyGraph>, Error> {
        paint_graph(graph, cutoff(capture)?, |_| true)
    }
}
