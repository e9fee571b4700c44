use crate::measure::{CpuSlowdown, Latency, Throughput};
use std::time::Duration;

/// Default round trip time, the "slow 4G" preset.
///
/// ```
/// # use lantern_core::defaults::*;
/// assert_eq!(
///     DEFAULT_RTT.to_string(),
///     "150ms"
/// );
/// ```
pub const DEFAULT_RTT: Latency = Latency::new(Duration::from_millis(150));

/// Default throughput, the "slow 4G" preset: 1.6 * 1024 kbps.
///
/// ```
/// # use lantern_core::defaults::*;
/// assert_eq!(DEFAULT_THROUGHPUT.bits_per_second(), 1_677_721);
/// ```
pub const DEFAULT_THROUGHPUT: Throughput = Throughput::new(1_677_721);

/// Default main-thread slowdown of a mid-tier phone.
pub const DEFAULT_CPU_SLOWDOWN: CpuSlowdown = CpuSlowdown::const_new(4.0);

/// Multiplier applied to tasks that performed layout when the estimate
/// strategy allows a discount.
pub const DEFAULT_LAYOUT_TASK_MULTIPLIER: f64 = 0.5;

/// Browsers open at most this many connections to a single origin.
pub const DEFAULT_MAX_CONNECTIONS_PER_ORIGIN: usize = 6;

/// Size of one TCP segment in bytes.
pub const TCP_SEGMENT_SIZE: f64 = 1_460.0;

/// Number of segments a fresh TCP connection is allowed to send before
/// its first acknowledgement.
pub const INITIAL_CONGESTION_WINDOW: f64 = 10.0;

/// A DNS lookup costs this many round trips.
pub const DNS_RESOLUTION_RTT_MULTIPLIER: f64 = 2.0;

/// Cost of reading a response from the disk cache, plus
/// [`DEFAULT_DISK_CACHE_MS_PER_MIB`] per MiB of resource.
pub const DEFAULT_DISK_CACHE_TIME_MS: f64 = 8.0;
pub const DEFAULT_DISK_CACHE_MS_PER_MIB: f64 = 20.0;

/// Cost of a request that never touches the network (`data:`, `blob:`).
pub const DEFAULT_NON_NETWORK_TIME_MS: f64 = 2.0;

/// No simulated CPU task may run longer than this.
pub const DEFAULT_MAXIMUM_CPU_TASK_DURATION_MS: f64 = 10_000.0;

/// Top level tasks shorter than this are only kept in the dependency
/// graph when they evaluate script, fire timers or parse HTML.
pub const SIGNIFICANT_CPU_TASK_DURATION: Duration = Duration::from_millis(10);

/// Length of the window during which both CPU and network must stay
/// quiet for the page to be considered interactive.
pub const QUIET_WINDOW: Duration = Duration::from_millis(5_000);

/// Tasks longer than this keep the main thread busy.
pub const LONG_TASK_THRESHOLD: Duration = Duration::from_millis(50);

/// Server response time of an origin nothing is known about, in
/// milliseconds.
pub const DEFAULT_SERVER_RESPONSE_TIME_MS: f64 = 30.0;

/// Give up on a simulation that has not settled after this many steps.
pub const MAXIMUM_SIMULATION_ITERATIONS: usize = 100_000;
