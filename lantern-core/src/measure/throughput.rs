use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr};

/// The [`Throughput`] caps how many bits per second a simulated page
/// load can pull over the network.
///
/// It is shared by every request in flight: when `n` requests are
/// downloading at the same time each of them gets `1/n` of it.
///
/// Units follow the throttling presets: `1kbps` is `1_024` bits per second.
///
/// # Example
///
/// ```
/// # use lantern_core::measure::Throughput;
/// // the "slow 4G" preset
/// let throughput = Throughput::from_kbps(1.6 * 1_024.0);
/// assert_eq!(throughput.bits_per_second(), 1_677_721);
/// ```
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Throughput(u64);

const K: u64 = 1_024;
const M: u64 = 1_024 * 1_024;
const G: u64 = 1_024 * 1_024 * 1_024;

impl Throughput {
    /// the maximum throughput available
    pub const MAX: Self = Self(u64::MAX);

    /// create a new [`Throughput`] from a number of bits per second
    pub const fn new(bits_per_second: u64) -> Self {
        Self(bits_per_second)
    }

    /// create a new [`Throughput`] from kilobits per second, the unit
    /// throttling profiles are usually expressed with.
    pub fn from_kbps(kbps: f64) -> Self {
        if kbps.is_finite() && kbps > 0.0 {
            Self((kbps * K as f64) as u64)
        } else {
            Self(0)
        }
    }

    #[inline]
    pub fn bits_per_second(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn bytes_per_second(&self) -> f64 {
        self.0 as f64 / 8.0
    }

    #[inline]
    pub fn kbps(&self) -> f64 {
        self.0 as f64 / K as f64
    }

    /// Returns the number of bytes that can be transferred during
    /// `elapsed_ms` milliseconds.
    ///
    /// ```
    /// # use lantern_core::measure::Throughput;
    /// let throughput = Throughput::new(8_000);
    /// assert_eq!(throughput.capacity(1_000.0), 1_000.0);
    /// ```
    pub fn capacity(&self, elapsed_ms: f64) -> f64 {
        self.bytes_per_second() * elapsed_ms / 1_000.0
    }
}

impl Default for Throughput {
    fn default() -> Self {
        crate::defaults::DEFAULT_THROUGHPUT
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;

        if v < K || v % K != 0 {
            write!(f, "{v}bps")
        } else if v < M || v % M != 0 {
            write!(f, "{}kbps", v / K)
        } else if v < G || v % G != 0 {
            write!(f, "{}mbps", v / M)
        } else {
            write!(f, "{}gbps", v / G)
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum ThroughputToken {
    #[regex("bps")]
    Bps,
    #[regex("kbps")]
    Kbps,
    #[regex("mbps")]
    Mbps,
    #[regex("gbps")]
    Gbps,

    #[regex("[0-9]+")]
    Value,
}

impl FromStr for Throughput {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, ThroughputToken>::new(s);

        let Some(Ok(ThroughputToken::Value)) = lex.next() else {
            bail!("Expecting to parse a number")
        };
        let number: u64 = lex.slice().parse()?;
        let Some(Ok(token)) = lex.next() else {
            bail!("Expecting to parse a unit")
        };
        let bps = match token {
            ThroughputToken::Bps => number,
            ThroughputToken::Kbps => number * K,
            ThroughputToken::Mbps => number * M,
            ThroughputToken::Gbps => number * G,
            ThroughputToken::Value => bail!("Expecting to parse a unit (bps, kbps, ...)"),
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a throughput"
        );

        Ok(Self::new(bps))
    }
}

impl TryFrom<String> for Throughput {
    type Error = anyhow::Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Throughput> for String {
    fn from(value: Throughput) -> Self {
        value.to_string()
    }
}
