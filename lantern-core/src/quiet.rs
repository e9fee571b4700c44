//! Quiet periods of a captured page load.
//!
//! A page is considered interactive once the main thread and the network
//! have both been quiet for [`QUIET_WINDOW`] after the first contentful
//! paint. Quiet periods are derived from the capture itself, not from a
//! simulation.

use crate::{
    defaults::{LONG_TASK_THRESHOLD, QUIET_WINDOW},
    record::NetworkRecord,
    task::Task,
    time::as_millis_f64,
};
use serde::Serialize;
use std::{collections::VecDeque, fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, trace};

/// Milliseconds since navigation start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietPeriod {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl QuietPeriod {
    pub fn new(start_ms: f64, end_ms: f64) -> Self {
        Self { start_ms, end_ms }
    }

    #[inline]
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuietPeriodKind {
    /// neither track was quiet long enough, usually a trace that ends too
    /// soon
    NoIdlePeriod,
    NoCpuIdlePeriod,
    NoNetworkIdlePeriod,
}

impl fmt::Display for QuietPeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIdlePeriod => f.write_str("idle period"),
            Self::NoCpuIdlePeriod => f.write_str("CPU idle period"),
            Self::NoNetworkIdlePeriod => f.write_str("network idle period"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("No {kind} after {reference_ms}ms, trace ends at {trace_end_ms}ms")]
pub struct NoQuietPeriodError {
    pub kind: QuietPeriodKind,
    pub reference_ms: f64,
    pub trace_end_ms: f64,
}

/// The first window during which both tracks are quiet, and every
/// candidate period of each track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietPeriods {
    pub cpu_quiet_period: QuietPeriod,
    pub network_quiet_period: QuietPeriod,
    pub cpu_quiet_periods: Vec<QuietPeriod>,
    pub network_quiet_periods: Vec<QuietPeriod>,
    trace_end_ms: f64,
}

impl QuietPeriods {
    /// Where both tracks are quiet, up to the end of the trace.
    pub fn joint(&self) -> QuietPeriod {
        QuietPeriod::new(
            self.cpu_quiet_period.start_ms.max(self.network_quiet_period.start_ms),
            self.trace_end_ms,
        )
    }
}

/// Network quiet periods between time 0 and `trace_end_ms`.
///
/// Only requests that count as activity take part (see
/// [`NetworkRecord::is_countable_activity`]), `data:` and websocket
/// requests never do. Up to `allowed_concurrent_requests` may be in flight
/// during a quiet period.
pub fn network_quiet_periods(
    records: &[Arc<NetworkRecord>],
    allowed_concurrent_requests: usize,
    trace_end_ms: f64,
) -> Vec<QuietPeriod> {
    let mut boundaries: Vec<(f64, bool)> = Vec::with_capacity(records.len() * 2);
    for record in records {
        if !record.is_countable_activity() || matches!(record.scheme(), "data" | "ws" | "wss") {
            continue;
        }
        boundaries.push((as_millis_f64(record.start_time), true));
        boundaries.push((as_millis_f64(record.end_time), false));
    }
    boundaries.retain(|(time, _)| *time <= trace_end_ms);
    boundaries.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    let mut in_flight = 0usize;
    let mut start = 0.0;
    let mut periods = Vec::new();
    for (time, is_start) in boundaries {
        if is_start {
            if in_flight == allowed_concurrent_requests {
                periods.push(QuietPeriod::new(start, time));
            }
            in_flight += 1;
        } else {
            in_flight = in_flight.saturating_sub(1);
            if in_flight == allowed_concurrent_requests {
                start = time;
            }
        }
    }
    if in_flight <= allowed_concurrent_requests {
        periods.push(QuietPeriod::new(start, trace_end_ms));
    }

    periods.retain(|period| period.start_ms != period.end_ms);
    periods
}

/// Main-thread quiet periods between time 0 and `trace_end_ms`, the gaps
/// between tasks longer than [`LONG_TASK_THRESHOLD`].
pub fn cpu_quiet_periods(tasks: &[Arc<Task>], trace_end_ms: f64) -> Vec<QuietPeriod> {
    let mut long_tasks: Vec<(f64, f64)> = tasks
        .iter()
        .filter(|task| task.duration > LONG_TASK_THRESHOLD)
        .map(|task| (as_millis_f64(task.start), as_millis_f64(task.end())))
        .collect();
    long_tasks.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    let mut periods = Vec::with_capacity(long_tasks.len() + 1);
    let mut start = 0.0;
    for (task_start, task_end) in long_tasks {
        periods.push(QuietPeriod::new(start, task_start));
        start = task_end;
    }
    periods.push(QuietPeriod::new(start, trace_end_ms));
    periods
}

enum Scan {
    Scanning,
    FoundCandidate {
        cpu: QuietPeriod,
        network: QuietPeriod,
    },
    Confirmed {
        cpu: QuietPeriod,
        network: QuietPeriod,
    },
}

/// Search for the first window during which both the main thread and
/// the network are quiet.
///
/// ## Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | Allowed concurrent requests | 0 |
/// | Window | 5s |
///
/// ```
/// use lantern_core::quiet::QuietPeriodScan;
///
/// let periods = QuietPeriodScan::new(1_000.0, 20_000.0).run(&[], &[]).unwrap();
/// assert_eq!(periods.joint().start_ms, 0.0);
/// assert_eq!(periods.joint().end_ms, 20_000.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuietPeriodScan {
    reference_ms: f64,
    trace_end_ms: f64,
    window_ms: f64,
    allowed_concurrent_requests: usize,
}

impl QuietPeriodScan {
    /// Quiet periods must end more than one window after `reference_ms`,
    /// the first contentful paint.
    pub fn new(reference_ms: f64, trace_end_ms: f64) -> Self {
        Self {
            reference_ms,
            trace_end_ms,
            window_ms: as_millis_f64(QUIET_WINDOW),
            allowed_concurrent_requests: 0,
        }
    }

    pub fn set_allowed_concurrent_requests(mut self, allowed: usize) -> Self {
        self.allowed_concurrent_requests = allowed;
        self
    }

    pub fn set_window(mut self, window_ms: f64) -> Self {
        self.window_ms = window_ms;
        self
    }

    fn is_candidate(&self, period: &QuietPeriod) -> bool {
        period.end_ms > self.reference_ms + self.window_ms && period.duration_ms() >= self.window_ms
    }

    pub fn run(
        &self,
        records: &[Arc<NetworkRecord>],
        tasks: &[Arc<Task>],
    ) -> Result<QuietPeriods, NoQuietPeriodError> {
        let network_quiet_periods: Vec<_> =
            network_quiet_periods(records, self.allowed_concurrent_requests, self.trace_end_ms)
                .into_iter()
                .filter(|period| self.is_candidate(period))
                .collect();
        let cpu_quiet_periods: Vec<_> = cpu_quiet_periods(tasks, self.trace_end_ms)
            .into_iter()
            .filter(|period| self.is_candidate(period))
            .collect();

        let mut cpu_queue: VecDeque<_> = cpu_quiet_periods.iter().copied().collect();
        let mut network_queue: VecDeque<_> = network_quiet_periods.iter().copied().collect();

        let mut scan = Scan::Scanning;
        let (cpu, network) = loop {
            scan = match scan {
                Scan::Scanning => match (cpu_queue.front(), network_queue.front()) {
                    (Some(&cpu), Some(&network)) => Scan::FoundCandidate { cpu, network },
                    (cpu, network) => {
                        let kind = match (cpu, network) {
                            (None, None)
                                if cpu_quiet_periods.is_empty()
                                    && network_quiet_periods.is_empty() =>
                            {
                                QuietPeriodKind::NoIdlePeriod
                            }
                            (Some(_), _) => QuietPeriodKind::NoNetworkIdlePeriod,
                            _ => QuietPeriodKind::NoCpuIdlePeriod,
                        };
                        debug!(%kind, reference_ms = self.reference_ms, "no quiet period");
                        return Err(NoQuietPeriodError {
                            kind,
                            reference_ms: self.reference_ms,
                            trace_end_ms: self.trace_end_ms,
                        });
                    }
                },
                Scan::FoundCandidate { cpu, network } => {
                    trace!(?cpu, ?network, "quiet period candidates");
                    if cpu.start_ms >= network.start_ms {
                        if network.end_ms >= cpu.start_ms + self.window_ms {
                            Scan::Confirmed { cpu, network }
                        } else {
                            network_queue.pop_front();
                            Scan::Scanning
                        }
                    } else if cpu.end_ms >= network.start_ms + self.window_ms {
                        Scan::Confirmed { cpu, network }
                    } else {
                        cpu_queue.pop_front();
                        Scan::Scanning
                    }
                }
                Scan::Confirmed { cpu, network } => break (cpu, network),
            };
        };

        Ok(QuietPeriods {
            cpu_quiet_period: cpu,
            network_quiet_period: network,
            cpu_quiet_periods,
            network_quiet_periods,
            trace_end_ms: self.trace_end_ms,
        })
    }
}
