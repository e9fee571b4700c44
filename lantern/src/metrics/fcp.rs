use super::{Coefficients, Metric, paint_graph};
use crate::{Error, Settings};
use lantern_core::{graph::DependencyGraph, trace::PageCapture};
use std::sync::Arc;

/// First Contentful Paint.
///
/// The optimistic graph only waits for the render blocking requests, the
/// pessimistic one for every request that completed before the paint.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstContentfulPaint;

impl Metric for FirstContentfulPaint {
    const NAME: &'static str = "first-contentful-paint";

    fn coefficients(&self, _settings: &Settings) -> Coefficients {
        Coefficients::new(0.0, 0.5, 0.5)
    }

    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        capture: &PageCapture,
    ) -> Result<Arc<DependencyGraph>, Error> {
        paint_graph(graph, capture.markers.first_contentful_paint, |network| {
            network.is_render_blocking()
        })
    }

    fn pessimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        capture: &PageCapture,
    ) -> Result<Arc<DependencyGraph>, Error> {
        paint_graph(graph, capture.markers.first_contentful_paint, |_| true)
    }
}
