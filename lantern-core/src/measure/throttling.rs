use super::{CpuSlowdown, Latency, Throughput};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The simulated device and network conditions.
///
/// ```
/// use lantern_core::measure::ThrottlingProfile;
///
/// let profile = ThrottlingProfile::mobile_slow_4g();
/// assert_eq!(profile.to_string(), "rtt=150ms throughput=1677721bps cpu=4x");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottlingProfile {
    /// round trip time to every origin
    pub rtt: Latency,
    /// throughput available to the whole page
    pub throughput: Throughput,
    /// main-thread slowdown
    pub cpu_slowdown: CpuSlowdown,
}

impl ThrottlingProfile {
    pub const fn new(rtt: Latency, throughput: Throughput, cpu_slowdown: CpuSlowdown) -> Self {
        Self {
            rtt,
            throughput,
            cpu_slowdown,
        }
    }

    /// Slow 4G on a mid-tier phone: 150ms RTT, 1.6Mbps, 4x CPU slowdown.
    pub fn mobile_slow_4g() -> Self {
        Self {
            rtt: crate::defaults::DEFAULT_RTT,
            throughput: crate::defaults::DEFAULT_THROUGHPUT,
            cpu_slowdown: crate::defaults::DEFAULT_CPU_SLOWDOWN,
        }
    }

    /// Dense 4G on a desktop: 40ms RTT, 10Mbps, no CPU slowdown.
    pub fn desktop_dense_4g() -> Self {
        Self {
            rtt: Latency::from_millis(40),
            throughput: Throughput::from_kbps(10.0 * 1_024.0),
            cpu_slowdown: CpuSlowdown::NONE,
        }
    }

    /// Build a profile from raw numbers as they appear in throttling
    /// settings (`rttMs`, `throughputKbps`, `cpuSlowdownMultiplier`).
    pub fn from_values(
        rtt_ms: f64,
        throughput_kbps: f64,
        cpu_slowdown_multiplier: f64,
    ) -> Result<Self, super::CpuSlowdownError> {
        let rtt = Latency::new(crate::time::from_millis_f64(rtt_ms));
        Ok(Self {
            rtt,
            throughput: Throughput::from_kbps(throughput_kbps),
            cpu_slowdown: CpuSlowdown::new(cpu_slowdown_multiplier)?,
        })
    }
}

impl Default for ThrottlingProfile {
    fn default() -> Self {
        Self::mobile_slow_4g()
    }
}

impl fmt::Display for ThrottlingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rtt={rtt} throughput={throughput} cpu={cpu}",
            rtt = self.rtt,
            throughput = self.throughput,
            cpu = self.cpu_slowdown,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let mobile = ThrottlingProfile::mobile_slow_4g();
        assert_eq!(mobile.rtt, Latency::from_millis(150));
        assert_eq!(mobile.throughput.bits_per_second(), 1_677_721);
        assert_eq!(mobile.cpu_slowdown.value(), 4.0);

        let desktop = ThrottlingProfile::desktop_dense_4g();
        assert_eq!(desktop.rtt, Latency::from_millis(40));
        assert_eq!(desktop.throughput.to_string(), "10mbps");
        assert_eq!(desktop.cpu_slowdown.value(), 1.0);
    }

    #[test]
    fn from_values() {
        let profile = ThrottlingProfile::from_values(150.0, 1.6 * 1_024.0, 4.0).unwrap();
        assert_eq!(profile, ThrottlingProfile::mobile_slow_4g());

        assert!(ThrottlingProfile::from_values(150.0, 1_000.0, 0.0).is_err());
    }

    #[test]
    fn deserialize() {
        let profile: ThrottlingProfile = serde_json::from_str(
            r#"{ "rtt": "40ms", "throughput": "10mbps", "cpuSlowdown": 1.0 }"#,
        )
        .unwrap();
        assert_eq!(profile, ThrottlingProfile::desktop_dense_4g());
    }
}
