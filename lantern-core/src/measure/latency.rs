use std::{fmt, str::FromStr, time::Duration};

/// The round trip time between the browser and a server.
///
/// The simulator derives every network cost from it: DNS lookups, TCP
/// and TLS handshakes, the request itself and every congestion window
/// of the download.
///
/// # Default [`Latency`]
///
/// ```
/// # use lantern_core::measure::Latency;
/// assert_eq!(
///     Latency::default().to_string(),
///     "150ms"
/// )
/// ```
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Latency(u64);

impl Latency {
    /// The `0` latency. I.e. no latency.
    ///
    pub const ZERO: Self = Self::new(Duration::ZERO);

    /// create a new latency with the given [`Duration`].
    ///
    /// # truncation
    ///
    /// The latency is precise up to the micro seconds. Constructing a
    /// [`Latency`] from a [`Duration`] that contains nano seconds
    /// precision value will truncate the nano seconds part.
    ///
    /// ```
    /// # use lantern_core::measure::Latency;
    /// # use std::time::Duration;
    /// let latency = Latency::new(Duration::from_nanos(987_654_321));
    /// assert_eq!(
    ///     latency.into_duration(),
    ///     Duration::from_micros(987_654),
    /// );
    /// ```
    ///
    #[inline(always)]
    pub const fn new(duration: Duration) -> Self {
        Self(duration.as_micros() as u64)
    }

    #[inline(always)]
    pub const fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// get the inner duration
    ///
    #[inline(always)]
    pub fn into_duration(self) -> Duration {
        Duration::from_micros(self.0)
    }

    /// The latency in (fractional) milliseconds.
    #[inline]
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }
}

impl From<Latency> for Duration {
    fn from(value: Latency) -> Self {
        value.into_duration()
    }
}
impl From<Duration> for Latency {
    fn from(value: Duration) -> Self {
        Self::new(value)
    }
}

impl Default for Latency {
    fn default() -> Self {
        crate::defaults::DEFAULT_RTT
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dur = crate::time::Duration::new(self.into_duration());
        dur.fmt(f)
    }
}

impl FromStr for Latency {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let duration = crate::time::Duration::from_str(s)?;

        Ok(Self::new(duration.into_duration()))
    }
}

impl TryFrom<String> for Latency {
    type Error = anyhow::Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Latency> for String {
    fn from(value: Latency) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default() {
        assert_eq!(Latency::default(), crate::defaults::DEFAULT_RTT);
    }

    #[test]
    fn truncate() {
        assert_eq!(
            Latency::new(Duration::from_nanos(9_876_543_210)).into_duration(),
            Duration::from_micros(9_876_543),
        )
    }

    #[test]
    fn display() {
        assert_eq!(Latency::from_millis(150).to_string(), "150ms");
        assert_eq!(Latency::from_millis(1_542).to_string(), "1.542s");
    }

    #[test]
    fn parse() {
        assert_eq!(Latency::from_millis(150), "150ms".parse().unwrap());
        assert_eq!(Latency::from_millis(1_542), "1s 542ms".parse().unwrap());
        assert_eq!(Latency::new(Duration::from_micros(40)), "40us".parse().unwrap());
    }

    #[test]
    fn millis_f64() {
        assert_eq!(Latency::from_millis(40).as_millis_f64(), 40.0);
        assert_eq!(Latency::new(Duration::from_micros(1_500)).as_millis_f64(), 1.5);
    }

    #[test]
    fn parse_invalid_strings() {
        assert!("150".parse::<Latency>().is_err());
        assert!("abc".parse::<Latency>().is_err());
        assert!("".parse::<Latency>().is_err());
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&Latency::from_millis(40)).unwrap();
        assert_eq!(json, "\"40ms\"");
        let back: Latency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Latency::from_millis(40));
    }
}
