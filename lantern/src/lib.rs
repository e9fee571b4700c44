/*!
# Lantern

Page load metrics from a single capture, under any network and device
conditions.

A [`PageCapture`] is turned into a dependency graph of requests and
main-thread tasks once, then every metric simulates the part of the graph
it depends on with an optimistic and a pessimistic set of assumptions and
blends the two.

```
use lantern::{ComputeCache, Settings, report};
use lantern::trace::PageCapture;

# fn run(json: &str) -> Result<(), lantern::Error> {
let capture = PageCapture::from_json(json)?;
let cache = ComputeCache::new();

let report = report(&capture, &Settings::default(), &cache)?;
println!("{:?}", report.first_contentful_paint.timing_ms());
# Ok(())
# }
```

Single metrics are computed through the [`Metric`](metrics::Metric) trait,
and share the same [`ComputeCache`]:

```
use lantern::{ComputeCache, Settings};
use lantern::metrics::{Extras, FirstContentfulPaint, Metric};
use lantern::trace::PageCapture;

# fn run(capture: &PageCapture) -> Result<(), lantern::Error> {
let cache = ComputeCache::new();
let fcp = FirstContentfulPaint.compute(capture, &Settings::default(), &cache, &Extras::default())?;
println!("FCP {}ms, bounds {}ms apart", fcp.timing_ms, fcp.bounds_gap_ms);
# Ok(())
# }
```
*/

mod context;
mod error;
pub mod metrics;
pub mod observed;
mod report;
mod settings;

// convenient re-export of `lantern_core` objects
pub use lantern_core::{
    estimate::{EstimateStrategy, ResourceAssumptions},
    graph, measure,
    measure::{CpuSlowdown, Latency, Throughput, ThrottlingProfile},
    quiet, record,
    simulator::{NodeTiming, SimulationResult},
    task,
    trace,
    trace::PageCapture,
};

pub use self::{
    context::{CacheStats, ComputeCache},
    error::Error,
    report::{MetricOutcome, Report, report},
    settings::{OriginTimings, Settings, ThrottlingMethod},
};
